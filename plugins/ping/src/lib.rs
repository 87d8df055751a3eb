//! Continuous liveness/RTT measurement for a configured set of hosts.
//!
//! The wire-level work happens in a separate long-lived process, the
//! `harvest-pingd` prober (see [`prober`]); what the agent's pipeline sees is
//! [`PingerCollector`], a regular collector that supervises the prober:
//! spawns it (and respawns it if it dies), asks it for a stats snapshot each
//! poll cycle, and turns the snapshot lines into datapoints.
//!
//! Per configured host alias, each cycle emits
//! `network.ping.<alias>.ping` (RTT gauge, seconds) and
//! `network.ping.<alias>.droprate` (cumulative loss counter).

pub mod packet;
pub mod prober;

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::Deserialize;

use harvest::measurement::Datapoint;
use harvest::pipeline::Collector;
use harvest::pipeline::error::{PollError, PollRetry};

#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time between echo batches, inside the prober.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Weight of a new RTT sample in the moving average.
    pub ewma_factor: f64,
    pub resolve: ResolveConfig,
    /// Path of the prober binary; defaults to `harvest-pingd` next to the
    /// agent executable, falling back to `$PATH`.
    pub pinger_bin: Option<PathBuf>,
    pub hosts: Hosts,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// A host silent for this long is individually re-resolved.
    #[serde(with = "humantime_serde")]
    pub no_reply: Duration,
    /// The whole host set is re-resolved this often.
    #[serde(with = "humantime_serde")]
    pub time: Duration,
    /// Resolution failure count at which prober warnings escalate, and past
    /// which steady-state failures become fatal to the prober.
    pub max_retries: u32,
}

/// Host aliases by address family: `alias = "hostname-or-address"`.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct Hosts {
    pub ipv4: BTreeMap<String, String>,
    pub ipv6: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            ewma_factor: 0.25,
            resolve: ResolveConfig::default(),
            pinger_bin: None,
            hosts: Hosts::default(),
        }
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            no_reply: Duration::from_secs(600),
            time: Duration::from_secs(3600),
            max_retries: 5,
        }
    }
}

/// Supervises one `harvest-pingd` prober process and exposes its
/// measurements as a collector.
pub struct PingerCollector {
    config: Config,
    /// Tagged host spec (`v4:...`/`v6:...`) → configured alias.
    specs: BTreeMap<String, String>,
    child: Child,
    requests: ChildStdin,
    replies: BufReader<ChildStdout>,
}

impl PingerCollector {
    /// Registry factory. Returns `Ok(None)` when no hosts are configured.
    pub fn from_config(table: &toml::Table) -> anyhow::Result<Option<Box<dyn Collector>>> {
        let config: Config = table.clone().try_into().context("invalid ping collector config")?;
        let specs: BTreeMap<String, String> = config
            .hosts
            .ipv4
            .iter()
            .map(|(alias, host)| (format!("v4:{host}"), alias.clone()))
            .chain(
                config
                    .hosts
                    .ipv6
                    .iter()
                    .map(|(alias, host)| (format!("v6:{host}"), alias.clone())),
            )
            .collect();
        if specs.is_empty() {
            log::info!("no hosts to ping specified, disabling the ping collector");
            return Ok(None);
        }
        let (child, requests, replies) = spawn_pinger(&config, &specs)?;
        Ok(Some(Box::new(PingerCollector {
            config,
            specs,
            child,
            requests,
            replies,
        })))
    }
}

impl Collector for PingerCollector {
    fn read(&mut self) -> Result<Vec<Datapoint>, PollError> {
        if let Some(status) = self.child.try_wait().retry_poll()? {
            log::warn!("pinger subprocess has failed ({status}), restarting it");
            let (child, requests, replies) = spawn_pinger(&self.config, &self.specs).map_err(PollError::CanRetry)?;
            self.child = child;
            self.requests = requests;
            self.replies = replies;
            // The fresh prober has nothing to report yet.
            return Ok(Vec::new());
        }

        writeln!(self.requests, "dump").retry_poll()?;
        let mut points = Vec::new();
        loop {
            let mut line = String::new();
            if self.replies.read_line(&mut line).retry_poll()? == 0 {
                return Err(PollError::CanRetry(anyhow!("pinger closed its stdout mid-dump")));
            }
            let line = line.trim();
            if line.is_empty() {
                break; // dump terminator
            }
            let Some(stats) = DumpLine::parse(line) else {
                log::warn!("unparseable stats line from the pinger: {line:?}");
                continue;
            };
            let Some(alias) = self.specs.get(stats.spec) else {
                log::debug!("stats line for an unknown host spec: {:?}", stats.spec);
                continue;
            };
            points.push(Datapoint::gauge(format!("network.ping.{alias}.ping"), stats.rtt));
            points.push(Datapoint::counter(
                format!("network.ping.{alias}.droprate"),
                stats.lost as f64,
            ));
        }
        Ok(points)
    }
}

/// One line of the dump protocol:
/// `<host_spec> <secs_since_reply> <rtt> <lost>`.
struct DumpLine<'a> {
    spec: &'a str,
    #[allow(dead_code)]
    since_reply: f64,
    rtt: f64,
    lost: u64,
}

impl<'a> DumpLine<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let spec = fields.next()?;
        let since_reply: f64 = fields.next()?.parse().ok()?;
        let rtt: f64 = fields.next()?.parse().ok()?;
        let lost: u64 = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(DumpLine {
            spec,
            since_reply,
            rtt,
            lost,
        })
    }
}

/// Spawns the prober with its full configuration as argv and waits for its
/// readiness line.
fn spawn_pinger(config: &Config, specs: &BTreeMap<String, String>) -> anyhow::Result<(Child, ChildStdin, BufReader<ChildStdout>)> {
    let bin = config.pinger_bin.clone().unwrap_or_else(default_pinger_bin);
    let mut cmd = Command::new(bin);
    cmd.arg(config.interval.as_secs_f64().to_string())
        .arg(config.resolve.no_reply.as_secs_f64().to_string())
        .arg(config.resolve.time.as_secs_f64().to_string())
        .arg(config.ewma_factor.to_string())
        .arg(std::process::id().to_string())
        .arg(config.resolve.max_retries.to_string())
        .args(specs.keys())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped());
    log::debug!("starting pinger subprocess: {cmd:?}");
    let mut child = cmd.spawn().context("could not spawn the pinger subprocess")?;
    let requests = child.stdin.take().context("pinger stdin is piped")?;
    let mut replies = BufReader::new(child.stdout.take().context("pinger stdout is piped")?);
    // The prober prints one blank line once its host set is resolved.
    let mut ready = String::new();
    replies
        .read_line(&mut ready)
        .context("waiting for pinger readiness")?;
    Ok((child, requests, replies))
}

fn default_pinger_bin() -> PathBuf {
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("harvest-pingd")));
    match sibling {
        Some(path) if path.exists() => path,
        _ => PathBuf::from("harvest-pingd"),
    }
}
