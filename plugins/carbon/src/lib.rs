//! Simple blocking, non-buffering sender for the carbon linereceiver
//! interface: `<metric.name> <value> <unix_timestamp>\n` over TCP.
//!
//! Reconnection policy lives entirely inside the sink: a failed dispatch
//! logs, reconnects (walking every resolved address of the endpoint) and
//! resends the formatted batch once. The pipeline only sees an error when
//! the reconnect budget is exhausted.

use std::fmt::Write as _;
use std::io::Write;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use harvest::measurement::Record;
use harvest::pipeline::Sink;
use harvest::pipeline::error::{DispatchError, DispatchRetry};

/// Default carbon linereceiver port.
pub const DEFAULT_PORT: u16 = 2003;

#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// `host` or `host:port` of the carbon endpoint.
    pub host: String,
    /// Connection attempts per connect/reconnect; `None` retries forever.
    pub max_reconnects: Option<u32>,
    /// Pause between connection attempts.
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: format!("127.0.0.1:{DEFAULT_PORT}"),
            max_reconnects: None,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

pub struct CarbonSink {
    host: String,
    port: u16,
    max_reconnects: Option<u32>,
    reconnect_delay: Duration,
    sock: TcpStream,
}

impl CarbonSink {
    /// Registry factory; connects eagerly so a dead endpoint fails startup
    /// (within the configured reconnect budget).
    pub fn from_config(table: &toml::Table) -> anyhow::Result<Option<Box<dyn Sink>>> {
        let config: Config = table.clone().try_into().context("invalid carbon sink config")?;
        let (host, port) = split_host_port(&config.host)?;
        let sock = connect(&host, port, config.max_reconnects, config.reconnect_delay)?;
        Ok(Some(Box::new(CarbonSink {
            host,
            port,
            max_reconnects: config.max_reconnects,
            reconnect_delay: config.reconnect_delay,
            sock,
        })))
    }

    fn reconnect(&mut self) -> anyhow::Result<()> {
        self.sock = connect(&self.host, self.port, self.max_reconnects, self.reconnect_delay)?;
        Ok(())
    }
}

impl Sink for CarbonSink {
    fn dispatch(&mut self, batch: &[Record]) -> Result<(), DispatchError> {
        let packet = format_batch(batch);
        if let Err(e) = self.sock.write_all(packet.as_bytes()) {
            log::error!("failed to send data to the carbon server: {e}");
            self.reconnect().map_err(DispatchError::CanRetry)?;
            // The batch that hit the dead connection gets one resend.
            self.sock.write_all(packet.as_bytes()).retry_dispatch()?;
        }
        Ok(())
    }
}

/// Formats a batch in the carbon plaintext protocol, one line per record,
/// timestamps as whole seconds.
fn format_batch(batch: &[Record]) -> String {
    let mut packet = String::new();
    for record in batch {
        let _ = writeln!(packet, "{} {} {}", record.name, record.value, record.timestamp.to_unix_secs());
    }
    packet
}

/// Splits `host[:port]`, defaulting to the carbon port. Bare IPv6 addresses
/// pass through unharmed; bracketed ones (`[::1]:2003`) carry a port.
fn split_host_port(endpoint: &str) -> anyhow::Result<(String, u16)> {
    anyhow::ensure!(!endpoint.is_empty(), "empty carbon endpoint");
    if let Some((host, port)) = endpoint.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            if !host.is_empty() && !host.contains(':') {
                return Ok((host.to_owned(), port));
            }
            if let Some(v6) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                return Ok((v6.to_owned(), port));
            }
        }
    }
    Ok((endpoint.to_owned(), DEFAULT_PORT))
}

/// Connects to the endpoint, trying every resolved address per attempt, with
/// a bounded (or unbounded) number of attempts and a pause between them.
fn connect(host: &str, port: u16, max_reconnects: Option<u32>, delay: Duration) -> anyhow::Result<TcpStream> {
    let mut remaining = max_reconnects;
    loop {
        // `TcpStream::connect` on a (host, port) pair walks all of the
        // resolved addresses before giving up.
        match TcpStream::connect((host, port)) {
            Ok(sock) => {
                log::debug!("connected to carbon at {host}:{port}");
                return Ok(sock);
            }
            Err(e) => {
                if let Some(left) = remaining.as_mut() {
                    if *left == 0 {
                        return Err(e).with_context(|| format!("could not connect to carbon at {host}:{port}"));
                    }
                    *left -= 1;
                }
                log::info!("failed to connect to {host}:{port}: {e}");
                thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use harvest::measurement::{Record, Timestamp};

    use super::{format_batch, split_host_port};

    #[test]
    fn endpoint_splitting() {
        assert_eq!(split_host_port("graphite").unwrap(), ("graphite".into(), 2003));
        assert_eq!(split_host_port("graphite:2004").unwrap(), ("graphite".into(), 2004));
        // Bare IPv6 addresses are hosts, not host:port pairs.
        assert_eq!(split_host_port("::1").unwrap(), ("::1".into(), 2003));
        assert_eq!(split_host_port("[::1]:2004").unwrap(), ("::1".into(), 2004));
        assert!(split_host_port("").is_err());
    }

    #[test]
    fn batch_formatting() {
        let batch = [
            Record {
                name: "host.memory.free".into(),
                value: 1024.0,
                timestamp: Timestamp::from_unix_secs_f64(1_700_000_000.9),
            },
            Record {
                name: "host.processes.forks".into(),
                value: 5.5,
                timestamp: Timestamp::from_unix_secs_f64(1_700_000_000.0),
            },
        ];
        assert_eq!(
            format_batch(&batch),
            "host.memory.free 1024 1700000000\nhost.processes.forks 5.5 1700000000\n"
        );
    }

    mod with_listener {
        use std::io::{BufRead, BufReader};
        use std::net::TcpListener;

        use harvest::measurement::{Record, Timestamp};
        use harvest::pipeline::Sink;

        use crate::CarbonSink;

        #[test]
        fn dispatch_reaches_the_wire() {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let server = std::thread::spawn(move || {
                let (sock, _) = listener.accept().unwrap();
                let mut lines = BufReader::new(sock);
                let mut line = String::new();
                lines.read_line(&mut line).unwrap();
                line
            });

            let config: toml::Table = toml::from_str(&format!(
                "host = \"127.0.0.1:{}\"\nmax_reconnects = 1\n",
                addr.port()
            ))
            .unwrap();
            let mut sink = CarbonSink::from_config(&config).unwrap().expect("always constructed");
            sink.dispatch(&[Record {
                name: "net.ping.gw.ping".into(),
                value: 0.25,
                timestamp: Timestamp::from_unix_secs_f64(1_700_000_000.0),
            }])
            .unwrap();

            assert_eq!(server.join().unwrap(), "net.ping.gw.ping 0.25 1700000000\n");
        }
    }
}
