//! Counter-to-rate conversion.
//!
//! Counters are raw monotonic values; what the sinks want is a per-second
//! rate. The [`RateConverter`] keeps the last seen `(value, time)` pair for
//! every counter name and emits the derivative on each subsequent sighting.
//!
//! The converter is a plain owned object: the scheduling loop creates one and
//! passes datapoints through it, so independent pipelines (and tests) get
//! independent caches.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::measurement::{Datapoint, MetricKind, Record, Timestamp};

struct CacheEntry {
    value: f64,
    /// Unix seconds of the last update.
    ts: f64,
}

/// Stateful counter→rate converter with idle-entry eviction.
pub struct RateConverter {
    cache: FxHashMap<String, CacheEntry>,
    /// Entries untouched for longer than this are purged.
    timeout: f64,
    /// The purge scan runs at most once per `timeout / check_count`.
    sweep_step: f64,
    next_sweep: f64,
}

impl RateConverter {
    pub fn new(timeout: Duration, check_count: u32) -> Self {
        let timeout = timeout.as_secs_f64();
        Self {
            cache: FxHashMap::default(),
            timeout,
            sweep_step: timeout / f64::from(check_count.max(1)),
            next_sweep: 0.0,
        }
    }

    /// Converts one raw datapoint into a dispatchable record.
    ///
    /// Gauges pass through unchanged. For counters, the first sighting of a
    /// name only seeds the cache; later sightings emit the rate since the
    /// previous value. `None` means the sample produced no output this cycle:
    /// a fresh counter, a double poll at an identical timestamp, or a
    /// negative delta (counter reset or overflow — the sample is dropped, no
    /// wrapped value is reconstructed).
    pub fn convert(&mut self, dp: &Datapoint, now: Timestamp) -> Option<Record> {
        let ts = dp.timestamp.unwrap_or(now);
        let secs = ts.as_unix_secs_f64();
        if secs > self.next_sweep {
            self.sweep(secs);
            self.next_sweep = secs + self.sweep_step;
        }
        let value = match dp.kind {
            MetricKind::Gauge => dp.value,
            MetricKind::Counter => {
                let Some(entry) = self.cache.get_mut(&dp.name) else {
                    log::debug!("initializing rate bucket for new counter: {}", dp.name);
                    self.cache.insert(
                        dp.name.clone(),
                        CacheEntry {
                            value: dp.value,
                            ts: secs,
                        },
                    );
                    return None;
                };
                if secs == entry.ts {
                    log::warn!("double poll of counter {:?} at an identical timestamp", dp.name);
                    return None;
                }
                let rate = (dp.value - entry.value) / (secs - entry.ts);
                let previous = entry.value;
                entry.value = dp.value;
                entry.ts = secs;
                if rate < 0.0 {
                    log::debug!(
                        "counter went backwards (reset or overflow): {}, {previous} -> {}",
                        dp.name,
                        dp.value
                    );
                    return None;
                }
                rate
            }
        };
        Some(Record {
            name: dp.name.clone(),
            value,
            timestamp: ts,
        })
    }

    /// Number of live cache entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn sweep(&mut self, now: f64) {
        let oldest = now - self.timeout;
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.ts >= oldest);
        log::debug!("rate cache cleanup: {} buckets purged", before - self.cache.len());
    }
}
