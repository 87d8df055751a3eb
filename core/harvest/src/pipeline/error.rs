use std::fmt;

/// Error which can occur during [`Collector::read`](super::Collector::read).
#[derive(Debug)]
pub enum PollError {
    /// Reading failed and the collector cannot recover; it is disabled.
    Fatal(anyhow::Error),
    /// The error is temporary, the collector is polled again next cycle.
    ///
    /// Use this when the collector talks to an external entity that can fail
    /// from time to time, and a later `read` can succeed.
    CanRetry(anyhow::Error),
}

/// Error which can occur during [`Processor::process`](super::Processor::process).
#[derive(Debug)]
pub enum ProcessError {
    /// The processor is broken and is disabled; the record is dropped.
    Fatal(anyhow::Error),
    /// This record cannot be processed and is dropped, but the processor
    /// itself is fine and keeps running.
    UnexpectedInput(anyhow::Error),
}

/// Error which can occur during [`Sink::dispatch`](super::Sink::dispatch).
#[derive(Debug)]
pub enum DispatchError {
    /// The sink cannot be used anymore; it is disabled.
    Fatal(anyhow::Error),
    /// The error is temporary, dispatching again next cycle may work.
    CanRetry(anyhow::Error),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Fatal(e) => write!(f, "fatal error in Collector::read: {e}"),
            PollError::CanRetry(e) => write!(f, "polling failed (but could work later): {e}"),
        }
    }
}
impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Fatal(e) => write!(f, "fatal error in Processor::process: {e}"),
            ProcessError::UnexpectedInput(e) => {
                write!(f, "unexpected record for processor, is the pipeline properly configured? {e}")
            }
        }
    }
}
impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Fatal(e) => write!(f, "fatal error in Sink::dispatch: {e}"),
            DispatchError::CanRetry(e) => write!(f, "dispatching failed (but could work later): {e}"),
        }
    }
}

// Allow to convert from anyhow::Error to pipeline errors

impl<T: Into<anyhow::Error>> From<T> for PollError {
    fn from(value: T) -> Self {
        Self::Fatal(value.into())
    }
}
impl<T: Into<anyhow::Error>> From<T> for ProcessError {
    fn from(value: T) -> Self {
        Self::Fatal(value.into())
    }
}
impl<T: Into<anyhow::Error>> From<T> for DispatchError {
    fn from(value: T) -> Self {
        Self::Fatal(value.into())
    }
}

/// Adds the convenient method `error.retry_poll()`.
pub trait PollRetry<T> {
    fn retry_poll(self) -> Result<T, PollError>;
}
impl<T, E: Into<anyhow::Error>> PollRetry<T> for Result<T, E> {
    /// Turns this error into [`PollError::CanRetry`].
    fn retry_poll(self) -> Result<T, PollError> {
        self.map_err(|e| PollError::CanRetry(e.into()))
    }
}

/// Adds the convenient method `error.retry_dispatch()`.
pub trait DispatchRetry<T> {
    fn retry_dispatch(self) -> Result<T, DispatchError>;
}
impl<T, E: Into<anyhow::Error>> DispatchRetry<T> for Result<T, E> {
    /// Turns this error into [`DispatchError::CanRetry`].
    fn retry_dispatch(self) -> Result<T, DispatchError> {
        self.map_err(|e| DispatchError::CanRetry(e.into()))
    }
}
