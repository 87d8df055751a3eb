//! `harvestd` entry point.
//!
//! Startup phases: parse the CLI, load the config, register the statically
//! linked elements, instantiate whatever the config enables, then hand the
//! pipeline to the harvester loop.

mod cli;
mod config;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use harvest::pipeline::registry::ElementRegistry;
use harvest::pipeline::runtime::Harvester;
use harvest::pipeline::throttle::CycleGate;
use harvest::rate::RateConverter;

use crate::config::AgentConfig;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_logger(args.debug);
    log::info!("starting harvestd v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load(&args).context("could not load configuration")?;
    let registry = register_elements().context("element registration failed")?;
    let mut harvester = build_harvester(&args, &config, &registry).context("startup failure")?;

    match args.cycles {
        None => harvester.run(),
        Some(n) => {
            let mut sleep = Duration::ZERO;
            for i in 0..n {
                if i > 0 {
                    std::thread::sleep(sleep);
                }
                sleep = harvester.run_cycle();
            }
        }
    }
    Ok(())
}

fn init_logger(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

/// All the elements this build of the agent knows about. The configuration
/// refers to them by these names.
fn register_elements() -> anyhow::Result<ElementRegistry> {
    let mut registry = ElementRegistry::new();
    registry.register_collector("ping", plugin_ping::PingerCollector::from_config)?;
    registry.register_processor("hostname_prefix", plugin_hostname_prefix::HostnamePrefix::from_config)?;
    registry.register_sink("carbon", plugin_carbon::CarbonSink::from_config)?;
    registry.register_sink("dump", plugin_dump::DumpSink::from_config)?;
    Ok(registry)
}

/// Instantiates the enabled elements and assembles the pipeline.
fn build_harvester(args: &cli::Cli, config: &AgentConfig, registry: &ElementRegistry) -> anyhow::Result<Harvester> {
    let rate = RateConverter::new(config.main.rate_timeout, config.main.rate_check_count);
    let mut harvester = Harvester::new(config.main.interval, rate);
    harvester.set_dry_run(config.debug.dry_run);
    if config.debug.dry_run {
        log::info!("dry-run mode: nothing will actually be dispatched");
    }

    for (name, table) in element_tables(&config.collectors, "collectors")? {
        if !config::element_enabled(name, table, &args.collector_enable, &args.collector_disable) {
            log::debug!("collector {name} is disabled");
            continue;
        }
        match registry
            .build_collector(name, table)
            .with_context(|| format!("could not set up collector {name}"))?
        {
            Some(collector) => harvester.add_collector_gated(name, collector, throttle_gate(table)),
            None => log::info!("collector {name} has nothing to do, skipping it"),
        }
    }

    for (name, table) in element_tables(&config.processors, "processors")? {
        if !config::element_enabled(name, table, &args.processor_enable, &args.processor_disable) {
            log::debug!("processor {name} is disabled");
            continue;
        }
        match registry
            .build_processor(name, table)
            .with_context(|| format!("could not set up processor {name}"))?
        {
            Some(processor) => harvester.add_processor(name, processor),
            None => log::info!("processor {name} has nothing to do, skipping it"),
        }
    }

    for (name, table) in element_tables(&config.sinks, "sinks")? {
        if !config::element_enabled(name, table, &args.sink_enable, &args.sink_disable) {
            log::debug!("sink {name} is disabled");
            continue;
        }
        match registry
            .build_sink(name, table)
            .with_context(|| format!("could not set up sink {name}"))?
        {
            Some(sink) => harvester.add_sink(name, sink),
            None => log::info!("sink {name} has nothing to do, skipping it"),
        }
    }

    Ok(harvester)
}

/// Each entry under `[collectors]`/`[processors]`/`[sinks]` must itself be a
/// table.
fn element_tables<'a>(
    section: &'a toml::Table,
    what: &'static str,
) -> anyhow::Result<Vec<(&'a str, &'a toml::Table)>> {
    section
        .iter()
        .map(|(name, value)| {
            let table = value
                .as_table()
                .with_context(|| format!("[{what}.{name}] must be a table"))?;
            Ok((name.as_str(), table))
        })
        .collect()
}

/// Optional per-collector throttling: `throttle_cycles = N` makes the
/// collector run roughly every N cycles (probabilistically, so restarts do
/// not phase-align); `throttle_sampling` thins out the dice rolls.
fn throttle_gate(table: &toml::Table) -> Option<CycleGate> {
    let cycles = table.get("throttle_cycles").and_then(toml::Value::as_integer)?;
    let sampling = table
        .get("throttle_sampling")
        .and_then(toml::Value::as_integer)
        .unwrap_or(3);
    Some(CycleGate::new(cycles as u32, sampling as u32))
}
