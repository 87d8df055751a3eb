//! Static element registry.
//!
//! Maps element names to factories. The agent populates one registry at
//! startup from the statically linked element crates, then instantiates the
//! elements its configuration enables. There is no runtime discovery: an
//! element that is not registered here does not exist.
//!
//! A factory receives the element's own config table and may return
//! `Ok(None)` to signal "validly configured, but nothing to do" (e.g. a ping
//! collector with an empty host list).

use std::collections::BTreeMap;

use super::{Collector, Processor, Sink};

pub type CollectorFactory = fn(&toml::Table) -> anyhow::Result<Option<Box<dyn Collector>>>;
pub type ProcessorFactory = fn(&toml::Table) -> anyhow::Result<Option<Box<dyn Processor>>>;
pub type SinkFactory = fn(&toml::Table) -> anyhow::Result<Option<Box<dyn Sink>>>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate registration of {class} {name:?}")]
    Duplicate { class: &'static str, name: &'static str },
    #[error("no registered {class} is named {name:?}")]
    Unknown { class: &'static str, name: String },
}

/// The three name→factory maps, one per element class.
#[derive(Default)]
pub struct ElementRegistry {
    collectors: BTreeMap<&'static str, CollectorFactory>,
    processors: BTreeMap<&'static str, ProcessorFactory>,
    sinks: BTreeMap<&'static str, SinkFactory>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_collector(&mut self, name: &'static str, factory: CollectorFactory) -> Result<(), RegistryError> {
        if self.collectors.insert(name, factory).is_some() {
            return Err(RegistryError::Duplicate { class: "collector", name });
        }
        Ok(())
    }

    pub fn register_processor(&mut self, name: &'static str, factory: ProcessorFactory) -> Result<(), RegistryError> {
        if self.processors.insert(name, factory).is_some() {
            return Err(RegistryError::Duplicate { class: "processor", name });
        }
        Ok(())
    }

    pub fn register_sink(&mut self, name: &'static str, factory: SinkFactory) -> Result<(), RegistryError> {
        if self.sinks.insert(name, factory).is_some() {
            return Err(RegistryError::Duplicate { class: "sink", name });
        }
        Ok(())
    }

    pub fn build_collector(&self, name: &str, config: &toml::Table) -> anyhow::Result<Option<Box<dyn Collector>>> {
        let factory = self.collectors.get(name).ok_or_else(|| RegistryError::Unknown {
            class: "collector",
            name: name.to_owned(),
        })?;
        factory(config)
    }

    pub fn build_processor(&self, name: &str, config: &toml::Table) -> anyhow::Result<Option<Box<dyn Processor>>> {
        let factory = self.processors.get(name).ok_or_else(|| RegistryError::Unknown {
            class: "processor",
            name: name.to_owned(),
        })?;
        factory(config)
    }

    pub fn build_sink(&self, name: &str, config: &toml::Table) -> anyhow::Result<Option<Box<dyn Sink>>> {
        let factory = self.sinks.get(name).ok_or_else(|| RegistryError::Unknown {
            class: "sink",
            name: name.to_owned(),
        })?;
        factory(config)
    }
}
