//! Processor that adds the hostname as a prefix to every metric name.
//!
//! Dots in the hostname would open extra levels in the metric hierarchy, so
//! they are mangled to underscores: `web1.example.org` prefixes metrics with
//! `web1_example_org.`.

use anyhow::Context;
use serde::Deserialize;

use harvest::measurement::{Record, SinkSet};
use harvest::pipeline::Processor;
use harvest::pipeline::error::ProcessError;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Explicit prefix; defaults to the machine's hostname.
    pub hostname: Option<String>,
}

pub struct HostnamePrefix {
    prefix: String,
}

impl HostnamePrefix {
    /// Registry factory.
    pub fn from_config(table: &toml::Table) -> anyhow::Result<Option<Box<dyn Processor>>> {
        let config: Config = table.clone().try_into().context("invalid hostname-prefix config")?;
        let name = match config.hostname {
            Some(name) => name,
            None => hostname::get()
                .context("could not read the local hostname")?
                .to_string_lossy()
                .into_owned(),
        };
        Ok(Some(Box::new(Self::new(&name))))
    }

    pub fn new(hostname: &str) -> Self {
        let mut prefix = hostname.replace('.', "_");
        prefix.push('.');
        Self { prefix }
    }
}

impl Processor for HostnamePrefix {
    fn process(&mut self, record: Record, _sinks: &mut SinkSet) -> Result<Option<Record>, ProcessError> {
        Ok(Some(Record {
            name: format!("{}{}", self.prefix, record.name),
            ..record
        }))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use harvest::measurement::{Record, SinkSet, Timestamp};
    use harvest::pipeline::Processor;

    use super::HostnamePrefix;

    #[test]
    fn prefixes_and_mangles_dots() {
        let mut proc = HostnamePrefix::new("web1.example.org");
        let mut sinks: SinkSet = ["carbon".to_owned()].into();
        let record = Record {
            name: "memory.free".into(),
            value: 1.0,
            timestamp: Timestamp::from_unix_secs_f64(1_700_000_000.0),
        };
        let out = proc.process(record, &mut sinks).unwrap().unwrap();
        assert_eq!(out.name, "web1_example_org.memory.free");
        assert_eq!(sinks.len(), 1, "the sink set is left untouched");
    }

    #[test]
    fn explicit_hostname_from_config() {
        let table: toml::Table = toml::from_str("hostname = \"edge\"").unwrap();
        let mut proc = super::HostnamePrefix::from_config(&table).unwrap().unwrap();
        let mut sinks = SinkSet::new();
        let record = Record {
            name: "up".into(),
            value: 1.0,
            timestamp: Timestamp::from_unix_secs_f64(0.0),
        };
        assert_eq!(proc.process(record, &mut sinks).unwrap().unwrap().name, "edge.up");
    }
}
