//! Sink that just dumps the data to the log. Useful for debugging.

use harvest::measurement::Record;
use harvest::pipeline::Sink;
use harvest::pipeline::error::DispatchError;

pub struct DumpSink;

impl DumpSink {
    /// Registry factory.
    pub fn from_config(_table: &toml::Table) -> anyhow::Result<Option<Box<dyn Sink>>> {
        Ok(Some(Box::new(DumpSink)))
    }
}

impl Sink for DumpSink {
    fn dispatch(&mut self, batch: &[Record]) -> Result<(), DispatchError> {
        log::info!("--- dump of {} datapoints", batch.len());
        for record in batch {
            log::info!("datapoint: {} {} {}", record.name, record.value, record.timestamp.to_unix_secs());
        }
        log::info!("--- dump end");
        Ok(())
    }
}
