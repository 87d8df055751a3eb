//! Command-line interface of `harvestd`.
//!
//! Flat option surface: everything of substance lives in the config file,
//! the CLI only points at it and toggles elements on and off for one run.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "harvestd", version, about = "Collect and dispatch host metrics to configured sinks.")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "harvestd.toml")]
    pub config: PathBuf,

    /// Interval between datapoint collections, e.g. "30s" (overrides the
    /// config file).
    #[arg(short, long)]
    pub interval: Option<humantime::Duration>,

    /// Enable only the specified metric collectors, can be given multiple
    /// times.
    #[arg(short = 'e', long = "collector-enable", value_name = "NAME")]
    pub collector_enable: Vec<String>,

    /// Explicitly disable specified metric collectors, can be given multiple
    /// times. Overrides --collector-enable.
    #[arg(short = 'd', long = "collector-disable", value_name = "NAME")]
    pub collector_disable: Vec<String>,

    /// Enable only the specified datapoint processors.
    #[arg(short = 'p', long = "processor-enable", value_name = "NAME")]
    pub processor_enable: Vec<String>,

    /// Explicitly disable specified datapoint processors. Overrides
    /// --processor-enable.
    #[arg(short = 'z', long = "processor-disable", value_name = "NAME")]
    pub processor_disable: Vec<String>,

    /// Enable only the specified datapoint sinks.
    #[arg(short = 's', long = "sink-enable", value_name = "NAME")]
    pub sink_enable: Vec<String>,

    /// Explicitly disable specified datapoint sinks. Overrides --sink-enable.
    #[arg(short = 'x', long = "sink-disable", value_name = "NAME")]
    pub sink_disable: Vec<String>,

    /// Do not actually send data.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Run this many cycles and exit, instead of running forever. Handy for
    /// smoke-testing a configuration.
    #[arg(long, value_name = "N")]
    pub cycles: Option<u64>,

    /// Verbose operation mode.
    #[arg(long)]
    pub debug: bool,
}
