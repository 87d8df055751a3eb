//! The synchronous poll → process → dispatch loop.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::measurement::{Datapoint, Record, SinkSet, Timestamp};
use crate::rate::RateConverter;

use super::error::{DispatchError, PollError, ProcessError};
use super::throttle::CycleGate;
use super::{Collector, Processor, Sink};

/// Time source of the loop, injectable for tests.
pub type Clock = Box<dyn Fn() -> Timestamp>;

struct CollectorSlot {
    name: String,
    collector: Box<dyn Collector>,
    gate: Option<CycleGate>,
    enabled: bool,
}

struct ProcessorSlot {
    name: String,
    processor: Box<dyn Processor>,
    enabled: bool,
}

struct SinkSlot {
    name: String,
    sink: Box<dyn Sink>,
    enabled: bool,
}

/// Drives the measurement pipeline: polls the collectors on a fixed cadence,
/// converts and processes the datapoints, and dispatches per-sink batches.
///
/// Single-threaded and synchronous. The harvester owns the rate cache, so
/// two harvesters never share counter state.
pub struct Harvester {
    interval: Duration,
    collectors: Vec<CollectorSlot>,
    processors: Vec<ProcessorSlot>,
    sinks: Vec<SinkSlot>,
    rate: RateConverter,
    dry_run: bool,
    clock: Clock,
    /// Wall-clock deadline (unix seconds) of the next cycle; `None` until
    /// the first cycle runs.
    target: Option<f64>,
}

impl Harvester {
    pub fn new(interval: Duration, rate: RateConverter) -> Self {
        Self {
            interval,
            collectors: Vec::new(),
            processors: Vec::new(),
            sinks: Vec::new(),
            rate,
            dry_run: false,
            clock: Box::new(Timestamp::now),
            target: None,
        }
    }

    pub fn add_collector(&mut self, name: impl Into<String>, collector: Box<dyn Collector>) {
        self.add_collector_gated(name, collector, None);
    }

    /// Adds a collector behind an optional [`CycleGate`], to bound the cost
    /// of expensive collectors without a strict every-Nth-cycle counter.
    pub fn add_collector_gated(&mut self, name: impl Into<String>, collector: Box<dyn Collector>, gate: Option<CycleGate>) {
        self.collectors.push(CollectorSlot {
            name: name.into(),
            collector,
            gate,
            enabled: true,
        });
    }

    /// Appends a processor to the chain; processors run in insertion order.
    pub fn add_processor(&mut self, name: impl Into<String>, processor: Box<dyn Processor>) {
        self.processors.push(ProcessorSlot {
            name: name.into(),
            processor,
            enabled: true,
        });
    }

    pub fn add_sink(&mut self, name: impl Into<String>, sink: Box<dyn Sink>) {
        self.sinks.push(SinkSlot {
            name: name.into(),
            sink,
            enabled: true,
        });
    }

    /// In dry-run mode the full pipeline runs but nothing is dispatched.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Replaces the wall clock, so tests can script the cadence.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    /// Runs the pipeline forever.
    pub fn run(&mut self) {
        loop {
            let sleep = self.run_cycle();
            std::thread::sleep(sleep);
        }
    }

    /// Executes one poll/process/dispatch cycle and returns how long to
    /// sleep before the next one.
    ///
    /// The cycle deadline advances by a whole number of intervals each time:
    /// if processing overran one or more intervals, the sleep collapses to
    /// zero and the cadence realigns without accumulating drift.
    pub fn run_cycle(&mut self) -> Duration {
        let data = self.poll();

        let now = (self.clock)();
        log::debug!("processing {} datapoints", data.len());
        let batches = self.process(data, now);

        log::debug!("dispatching data to {} sink(s)", batches.len());
        if !self.dry_run {
            self.dispatch(batches);
        }

        let now_secs = now.as_unix_secs_f64();
        let interval = self.interval.as_secs_f64();
        let target = self.target.get_or_insert(now_secs);
        while *target <= now_secs {
            *target += interval;
        }
        let sleep = (*target - (self.clock)().as_unix_secs_f64()).max(0.0);
        log::debug!("sleep: {sleep}s");
        Duration::from_secs_f64(sleep)
    }

    fn poll(&mut self) -> Vec<Datapoint> {
        let mut data = Vec::new();
        for slot in &mut self.collectors {
            if !slot.enabled {
                continue;
            }
            if let Some(gate) = &mut slot.gate {
                if !gate.check() {
                    log::debug!("collector {} is throttled this cycle", slot.name);
                    continue;
                }
            }
            log::debug!("polling collector {}", slot.name);
            match slot.collector.read() {
                Ok(batch) => data.extend(batch),
                Err(PollError::CanRetry(e)) => {
                    log::error!("failed to poll collector {} (will retry): {e:#}", slot.name);
                }
                Err(PollError::Fatal(e)) => {
                    log::error!("fatal error in collector {}, disabling it: {e:?}", slot.name);
                    slot.enabled = false;
                }
            }
        }
        data
    }

    fn process(&mut self, data: Vec<Datapoint>, now: Timestamp) -> BTreeMap<String, Vec<Record>> {
        let all_sinks: SinkSet = self
            .sinks
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.name.clone())
            .collect();
        let mut batches: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        'points: for dp in &data {
            let Some(mut record) = self.rate.convert(dp, now) else {
                continue;
            };
            let mut sinks = all_sinks.clone();
            for slot in &mut self.processors {
                if !slot.enabled {
                    continue;
                }
                match slot.processor.process(record, &mut sinks) {
                    Ok(Some(r)) => record = r,
                    Ok(None) => continue 'points,
                    Err(ProcessError::UnexpectedInput(e)) => {
                        log::error!("processor {} rejected a datapoint, discarding it: {e:#}", slot.name);
                        continue 'points;
                    }
                    Err(ProcessError::Fatal(e)) => {
                        log::error!("fatal error in processor {}, disabling it: {e:?}", slot.name);
                        slot.enabled = false;
                        continue 'points;
                    }
                }
            }
            for sink in sinks {
                batches.entry(sink).or_default().push(record.clone());
            }
        }
        batches
    }

    fn dispatch(&mut self, batches: BTreeMap<String, Vec<Record>>) {
        for (name, batch) in &batches {
            let Some(slot) = self.sinks.iter_mut().find(|s| s.enabled && s.name == *name) else {
                continue;
            };
            log::debug!("sending {} datapoints to sink {}", batch.len(), name);
            match slot.sink.dispatch(batch) {
                Ok(()) => {}
                Err(DispatchError::CanRetry(e)) => {
                    log::error!("failed to dispatch data to sink {name} (will retry): {e:#}");
                }
                Err(DispatchError::Fatal(e)) => {
                    log::error!("fatal error in sink {name}, disabling it: {e:?}");
                    slot.enabled = false;
                }
            }
        }
    }
}
