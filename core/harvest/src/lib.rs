//! HARVEST: host telemetry, collected and shipped.
//!
//! Harvest polls a set of measurement sources on a fixed cadence and forwards
//! normalized datapoints to one or more destinations over simple line
//! protocols. This crate is the customizable core; it does not measure
//! anything by itself.
//!
//! The polling pipeline has three steps, repeated every cycle:
//! 1. Read raw [`Datapoint`](measurement::Datapoint)s from every enabled
//!    [`Collector`](pipeline::Collector).
//! 2. Convert counters to rates with the [`RateConverter`](rate::RateConverter),
//!    then run the result through the chain of [`Processor`](pipeline::Processor)s.
//! 3. Group the surviving records per destination and hand each batch to its
//!    [`Sink`](pipeline::Sink).
//!
//! The concrete collectors, processors and sinks live in separate crates and
//! are wired in by the agent through the
//! [`ElementRegistry`](pipeline::registry::ElementRegistry).
//!
//! The whole pipeline is synchronous and single-threaded: a failing element
//! is logged and isolated, never awaited. See [`pipeline::runtime::Harvester`].

pub mod measurement;
pub mod pipeline;
pub mod rate;
