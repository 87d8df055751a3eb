//! Datapoints, records and timestamps.
//!
//! A [`Datapoint`] is what a collector produces: a named raw measurement that
//! may still be a monotonic counter. A [`Record`] is what leaves the pipeline
//! towards the sinks: name, final value, timestamp. The conversion between
//! the two is the job of [`crate::rate::RateConverter`].

use core::fmt;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How a raw measurement value must be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing raw value; reported as a per-second rate.
    Counter,
    /// An absolute value, reported as-is.
    Gauge,
}

/// Error returned when parsing an unknown metric kind.
///
/// The [`MetricKind`] enum cannot hold an invalid kind, so a bad spelling
/// coming from a config file or an external data source is rejected here,
/// at the parsing boundary.
#[derive(Debug, thiserror::Error)]
#[error("unknown metric kind {0:?}, expected \"counter\" or \"gauge\"")]
pub struct MetricKindError(pub String);

impl FromStr for MetricKind {
    type Err = MetricKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            other => Err(MetricKindError(other.to_owned())),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Counter => f.write_str("counter"),
            MetricKind::Gauge => f.write_str("gauge"),
        }
    }
}

/// A measurement of a clock.
///
/// This opaque type is currently a wrapper around [`SystemTime`]: the cadence
/// of the pipeline and the downstream wire protocols are defined in terms of
/// wall-clock unix time.
#[derive(Clone, Copy, PartialEq)]
pub struct Timestamp(SystemTime);

impl Timestamp {
    /// Returns a `Timestamp` representing the current system time.
    pub fn now() -> Self {
        Self(SystemTime::now())
    }

    /// Builds a `Timestamp` from fractional unix seconds.
    pub fn from_unix_secs_f64(secs: f64) -> Self {
        Self(UNIX_EPOCH + Duration::from_secs_f64(secs))
    }

    /// The timestamp as fractional seconds since the unix epoch.
    pub fn as_unix_secs_f64(&self) -> f64 {
        self.0
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64()
    }

    /// The timestamp as whole seconds since the unix epoch.
    pub fn to_unix_secs(&self) -> u64 {
        self.0
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

impl From<SystemTime> for Timestamp {
    fn from(value: SystemTime) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single raw measurement, as produced by a collector.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    /// Hierarchical dotted metric name, e.g. `processes.forks`.
    pub name: String,
    /// How to interpret `value`.
    pub kind: MetricKind,
    /// The raw measured value.
    pub value: f64,
    /// When the value was measured. `None` means "whenever the pipeline
    /// processes it", which is what almost every collector wants.
    pub timestamp: Option<Timestamp>,
}

impl Datapoint {
    /// Creates a counter datapoint without an explicit timestamp.
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Counter,
            value,
            timestamp: None,
        }
    }

    /// Creates a gauge datapoint without an explicit timestamp.
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Gauge,
            value,
            timestamp: None,
        }
    }

    /// Attaches an explicit measurement time, and returns self for chaining.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A fully processed measurement, ready for dispatch to the sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub value: f64,
    pub timestamp: Timestamp,
}

/// The set of sink names a record is still destined for.
///
/// Starts out as "every enabled sink" for each record; processors may narrow
/// it down.
pub type SinkSet = BTreeSet<String>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    use super::{MetricKind, Timestamp};

    #[test]
    fn kind_parsing() {
        assert_eq!(MetricKind::from_str("counter").unwrap(), MetricKind::Counter);
        assert_eq!(MetricKind::from_str("gauge").unwrap(), MetricKind::Gauge);
        let err = MetricKind::from_str("histogram").unwrap_err();
        assert_eq!(err.0, "histogram");
    }

    #[test]
    fn unix_seconds_round_trip() {
        let ts = Timestamp::from_unix_secs_f64(1_700_000_000.25);
        assert_eq!(ts.to_unix_secs(), 1_700_000_000);
        let diff = (ts.as_unix_secs_f64() - 1_700_000_000.25).abs();
        assert!(diff < 1e-6, "lost too much precision: {diff}");
    }
}
