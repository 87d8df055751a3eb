//! Configuration of the agent.
//!
//! One `[loop]` table for the pipeline itself, one `[debug]` table, and one
//! table per element instance under `[collectors.*]`, `[processors.*]` and
//! `[sinks.*]`. Element tables are kept opaque here and handed to the
//! element factories; the agent itself only reads their `enabled` key (and
//! the optional collector throttle keys). Table order is preserved, so the
//! processor chain runs in config-file order.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::cli::Cli;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    #[serde(rename = "loop")]
    pub main: LoopConfig,
    pub debug: DebugConfig,
    /// name → element config table
    pub collectors: toml::Table,
    pub processors: toml::Table,
    pub sinks: toml::Table,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Time between collection cycles.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Idle timeout of the counter rate cache.
    #[serde(with = "humantime_serde")]
    pub rate_timeout: Duration,
    /// The cache purge scan runs every `rate_timeout / rate_check_count`.
    pub rate_check_count: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            rate_timeout: Duration::from_secs(12 * 3600),
            rate_check_count: 4,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    /// Run the full pipeline but do not dispatch anything.
    pub dry_run: bool,
}

/// Loads the config file (defaults apply if it does not exist) and folds the
/// CLI overrides in.
pub fn load(args: &Cli) -> anyhow::Result<AgentConfig> {
    let mut config = read_file(&args.config)?;
    if let Some(interval) = args.interval.clone() {
        config.main.interval = interval.into();
    }
    if args.dry_run {
        config.debug.dry_run = true;
    }
    Ok(config)
}

fn read_file(path: &Path) -> anyhow::Result<AgentConfig> {
    if !path.exists() {
        log::warn!("config file {} not found, using defaults", path.display());
        return Ok(AgentConfig::default());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("could not parse {}", path.display()))
}

/// Whether an element instance should run, merging its config table with the
/// CLI enable/disable lists. A disable always wins; a non-empty enable list
/// turns everything else off; otherwise the table's `enabled` key decides,
/// defaulting to enabled.
pub fn element_enabled(name: &str, table: &toml::Table, enable: &[String], disable: &[String]) -> bool {
    if disable.iter().any(|n| n == name) {
        return false;
    }
    if !enable.is_empty() {
        return enable.iter().any(|n| n == name);
    }
    table.get("enabled").and_then(toml::Value::as_bool).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::{AgentConfig, element_enabled};

    #[test]
    fn full_config_parses() {
        let config: AgentConfig = toml::from_str(indoc! {r#"
            [loop]
            interval = "30s"
            rate_timeout = "1h"
            rate_check_count = 6

            [debug]
            dry_run = true

            [collectors.ping]
            interval = "5s"
            [collectors.ping.hosts.ipv4]
            gw = "192.168.0.1"

            [processors.hostname_prefix]

            [sinks.carbon]
            host = "graphite:2003"
            [sinks.dump]
            enabled = false
        "#})
        .unwrap();
        assert_eq!(config.main.interval.as_secs(), 30);
        assert_eq!(config.main.rate_timeout.as_secs(), 3600);
        assert_eq!(config.main.rate_check_count, 6);
        assert!(config.debug.dry_run);
        assert_eq!(config.collectors.len(), 1);
        assert_eq!(config.processors.len(), 1);
        assert_eq!(config.sinks.len(), 2);
    }

    #[test]
    fn empty_config_gets_defaults() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert_eq!(config.main.interval.as_secs(), 60);
        assert_eq!(config.main.rate_timeout.as_secs(), 12 * 3600);
        assert!(!config.debug.dry_run);
        assert!(config.collectors.is_empty());
    }

    #[test]
    fn enablement_merging() {
        let on: toml::Table = toml::from_str("enabled = true").unwrap();
        let off: toml::Table = toml::from_str("enabled = false").unwrap();
        let unset = toml::Table::new();
        let none: &[String] = &[];
        let ping = &["ping".to_owned()][..];

        // Config decides when the CLI says nothing.
        assert!(element_enabled("ping", &on, none, none));
        assert!(element_enabled("ping", &unset, none, none));
        assert!(!element_enabled("ping", &off, none, none));

        // An enable list turns everything else off, even config-enabled.
        assert!(element_enabled("ping", &off, ping, none));
        assert!(!element_enabled("sysstat", &on, ping, none));

        // Disable overrides everything, including enable.
        assert!(!element_enabled("ping", &on, ping, ping));
    }
}
