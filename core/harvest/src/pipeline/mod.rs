//! The polling pipeline: capability contracts and the scheduling loop.
//!
//! Collectors, processors and sinks are trait objects implemented by
//! separate crates; the [`runtime::Harvester`] drives them. Every contract
//! method is synchronous and expected to complete in bounded time — failure
//! isolation (not timeouts) is what keeps a misbehaving element from taking
//! the pipeline down.

pub mod error;
pub mod registry;
pub mod runtime;
pub mod throttle;

use crate::measurement::{Datapoint, Record, SinkSet};
use error::{DispatchError, PollError, ProcessError};

/// Produces raw measurements.
///
/// Each call returns one finite batch of datapoints; errors are caught and
/// logged by the loop, and the collector is polled again next cycle (unless
/// the error was [`PollError::Fatal`]).
pub trait Collector {
    fn read(&mut self) -> Result<Vec<Datapoint>, PollError>;
}

/// Rewrites records on their way to the sinks.
///
/// A processor may alter the record, drop it by returning `Ok(None)`, and/or
/// narrow the set of sinks the record will be delivered to. Processors run
/// in registration order.
pub trait Processor {
    fn process(&mut self, record: Record, sinks: &mut SinkSet) -> Result<Option<Record>, ProcessError>;
}

/// Delivers batches of processed records to a destination.
///
/// Reconnect/retry policy is internal to the sink; the loop only isolates
/// failures.
pub trait Sink {
    fn dispatch(&mut self, batch: &[Record]) -> Result<(), DispatchError>;
}
