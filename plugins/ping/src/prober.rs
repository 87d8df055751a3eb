//! The prober proper: resolves the host set, fires echo batches, accounts
//! replies and serves stats dumps on demand.
//!
//! Single-threaded and cooperative: one `poll(2)` call multiplexes the two
//! raw sockets and the dump-request channel (stdin), and is the only place
//! the prober ever blocks — bounded by the time to the next send batch.
//!
//! The prober runs as a child process of the agent. Its only teardown paths
//! are deliberate: the parent disappeared, the dump channel reached EOF, or
//! resolve/send failures crossed their thresholds (in which case exiting lets
//! the supervisor restart it with clean state).

use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6, ToSocketAddrs};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, ensure};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::signal::kill;
use nix::sys::socket::{
    AddressFamily, MsgFlags, SockFlag, SockProtocol, SockType, SockaddrIn, SockaddrIn6, SockaddrStorage, recvfrom,
    sendto, socket,
};
use nix::unistd::Pid;
use rand::Rng;

use crate::packet::{self, EchoPayload, SeqGen};

/// Ping id of the throwaway link-test probe; never assigned to a host.
const TRIAL_PING_ID: u16 = 0xffff;

/// `sent`/`recv` are reset together once `sent` exceeds this, to avoid
/// unbounded growth.
const COUNTER_RESET_LIMIT: u64 = 1 << 30;

/// Send attempts per host per batch before the prober gives up and exits.
const SEND_RETRIES: u32 = 30;

/// Startup retry backoff is `max(interval / WARN_DELAY_DIV, WARN_DELAY_MIN)`.
const WARN_DELAY_DIV: u32 = 5;
const WARN_DELAY_MIN: Duration = Duration::from_secs(5);

/// Startup parameters, passed as argv by the supervising collector:
/// `interval no_reply_window full_resolve_period ewma_factor parent_pid
/// warn_tries host_spec...`, durations in (fractional) seconds.
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Time between send batches.
    pub interval: Duration,
    /// A host silent for this long is individually re-resolved.
    pub resolve_no_reply: Duration,
    /// The whole host set is re-resolved this often.
    pub resolve_fixed: Duration,
    /// Weight of a new RTT sample in the moving average.
    pub ewma_factor: f64,
    /// Pid to watch for liveness; 0 disables the check.
    pub parent_pid: i32,
    /// Failure count at which warnings escalate (startup) or the prober
    /// exits (steady-state re-resolution).
    pub warn_tries: u32,
    pub host_specs: Vec<String>,
}

impl ProberConfig {
    pub fn from_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        fn next_arg(args: &mut impl Iterator<Item = String>, what: &str) -> anyhow::Result<String> {
            args.next().with_context(|| format!("missing argument: {what}"))
        }
        fn secs(arg: &str, what: &str) -> anyhow::Result<Duration> {
            let secs: f64 = arg.parse().with_context(|| format!("bad {what}: {arg:?}"))?;
            ensure!(secs.is_finite() && secs >= 0.0, "bad {what}: {arg:?}");
            Ok(Duration::from_secs_f64(secs))
        }
        let interval = secs(&next_arg(&mut args, "interval")?, "interval")?;
        let resolve_no_reply = secs(&next_arg(&mut args, "no-reply window")?, "no-reply window")?;
        let resolve_fixed = secs(&next_arg(&mut args, "full-resolve period")?, "full-resolve period")?;
        let ewma_arg = next_arg(&mut args, "ewma factor")?;
        let ewma_factor: f64 = ewma_arg.parse().with_context(|| format!("bad ewma factor: {ewma_arg:?}"))?;
        let pid_arg = next_arg(&mut args, "parent pid")?;
        let parent_pid: i32 = pid_arg.parse().with_context(|| format!("bad parent pid: {pid_arg:?}"))?;
        let tries_arg = next_arg(&mut args, "warn tries")?;
        let warn_tries: u32 = tries_arg.parse().with_context(|| format!("bad warn tries: {tries_arg:?}"))?;
        let host_specs: Vec<String> = args.collect();
        ensure!(!host_specs.is_empty(), "no host specs given");
        Ok(Self {
            interval,
            resolve_no_reply,
            resolve_fixed,
            ewma_factor,
            parent_pid,
            warn_tries,
            host_specs,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Any,
    V4,
    V6,
}

fn split_spec(spec: &str) -> (Family, &str) {
    if let Some(host) = spec.strip_prefix("v4:") {
        (Family::V4, host)
    } else if let Some(host) = spec.strip_prefix("v6:") {
        (Family::V6, host)
    } else {
        (Family::Any, spec)
    }
}

/// Resolves a host spec to one address, chosen at random among the
/// candidates of the requested family. Specs may carry a `v4:`/`v6:` tag
/// that narrows the candidate set.
pub fn resolve_spec(spec: &str) -> io::Result<IpAddr> {
    let (family, host) = split_spec(spec);
    let addrs: Vec<IpAddr> = (host, 0u16)
        .to_socket_addrs()?
        .map(|sa| sa.ip())
        .filter(|ip| match family {
            Family::Any => true,
            Family::V4 => ip.is_ipv4(),
            Family::V6 => ip.is_ipv6(),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no usable address for host spec {spec:?}"),
        ));
    }
    Ok(addrs[rand::rng().random_range(0..addrs.len())])
}

/// Escalate-then-suppress policy for repeated resolve/link failures: the
/// first `tries` failures warn, the last of them also announces that further
/// warnings are muted, and everything after that is quiet until a success.
/// Retries themselves never stop.
#[derive(Debug)]
pub struct WarnGate {
    tries: u32,
    failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnAction {
    /// Log at warning level.
    Warn,
    /// Log at warning level, once, that further warnings are muted.
    Escalate,
    /// Log quietly.
    Quiet,
}

impl WarnGate {
    pub fn new(tries: u32) -> Self {
        Self {
            tries: tries.max(1),
            failures: 0,
        }
    }

    pub fn failure(&mut self) -> WarnAction {
        self.failures += 1;
        if self.failures < self.tries {
            WarnAction::Warn
        } else if self.failures == self.tries {
            WarnAction::Escalate
        } else {
            WarnAction::Quiet
        }
    }

    /// Clears the failure streak. Returns the streak length if warnings had
    /// been muted, so the caller can announce the recovery.
    pub fn success(&mut self) -> Option<u32> {
        let failures = std::mem::take(&mut self.failures);
        (failures >= self.tries).then_some(failures)
    }
}

/// Whether reply RTT samples are folded into the EWMA.
///
/// Producing a stats dump flips the gate to `Draining`, so that the delay of
/// dump processing cannot taint the estimate for that cycle; the next send
/// batch returns it to `Sampling`. Replies received while draining still
/// count for liveness and loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RttGate {
    Sampling,
    Draining,
}

/// Accounting state of one probed host.
#[derive(Debug)]
pub struct Host {
    pub spec: String,
    pub addr: IpAddr,
    /// Identifier carried by this host's echo requests, collision-free
    /// within one prober instance.
    pub ping_id: u16,
    /// Unix seconds of the last valid reply; 0.0 until the first one.
    pub last_reply: f64,
    /// EWMA of the round-trip time, in seconds.
    pub rtt: f64,
    pub sent: u64,
    pub recv: u64,
    /// Consecutive re-resolution failures in steady state.
    pub resolve_fails: u32,
}

impl Host {
    fn new(spec: String, addr: IpAddr, ping_id: u16) -> Self {
        Self {
            spec,
            addr,
            ping_id,
            last_reply: 0.0,
            rtt: 0.0,
            sent: 0,
            recv: 0,
            resolve_fails: 0,
        }
    }

    /// Packets apparently lost, with an allowance for one legitimately still
    /// in flight.
    pub fn outstanding_loss(&self) -> u64 {
        self.sent.saturating_sub(self.recv).saturating_sub(1)
    }

    /// Accounts one valid reply. The RTT sample is folded into the EWMA only
    /// while the gate is [`RttGate::Sampling`].
    pub fn observe_reply(&mut self, now: f64, sample: f64, gate: RttGate, ewma_factor: f64) {
        self.last_reply = now;
        self.recv += 1;
        if gate == RttGate::Sampling {
            self.rtt += ewma_factor * (sample - self.rtt);
        }
    }
}

pub struct Prober {
    cfg: ProberConfig,
    sock_v4: OwnedFd,
    sock_v6: OwnedFd,
    hosts: Vec<Host>,
    gate: RttGate,
    seqs: SeqGen,
    /// Indexes into `hosts` whose re-resolution failed and is retried on
    /// later cycles.
    resolve_retry: BTreeSet<usize>,
    resolve_fixed_deadline: f64,
    /// Unix seconds of the last send batch; 0.0 before the first.
    last_send: f64,
}

impl Prober {
    /// Opens the raw sockets and resolves the whole host set, retrying
    /// indefinitely (with backoff) on resolution or link failures.
    pub fn new(cfg: ProberConfig) -> anyhow::Result<Self> {
        ensure!(!cfg.host_specs.is_empty(), "no host specs to probe");
        let sock_v4 = socket(AddressFamily::Inet, SockType::Raw, SockFlag::SOCK_NONBLOCK, SockProtocol::Icmp)
            .context("could not open the raw ICMPv4 socket (needs CAP_NET_RAW)")?;
        let sock_v6 = socket(
            AddressFamily::Inet6,
            SockType::Raw,
            SockFlag::SOCK_NONBLOCK,
            SockProtocol::IcmpV6,
        )
        .context("could not open the raw ICMPv6 socket")?;
        let resolve_fixed_deadline = unix_secs_f64() + cfg.resolve_fixed.as_secs_f64();
        let mut prober = Self {
            cfg,
            sock_v4,
            sock_v6,
            hosts: Vec::new(),
            gate: RttGate::Sampling,
            seqs: SeqGen::new(),
            resolve_retry: BTreeSet::new(),
            resolve_fixed_deadline,
            last_send: 0.0,
        };
        prober.init_hosts();
        Ok(prober)
    }

    /// Runs the prober until a deliberate exit condition. `Ok(())` is the
    /// normal way out (parent death, dump-channel EOF, failure thresholds);
    /// hard I/O errors bubble up as `Err`.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        // Readiness: one blank line once the host set is resolved.
        stdout.write_all(b"\n")?;
        stdout.flush()?;

        loop {
            // Block until the next send deadline, draining replies and
            // serving dump requests as they come in.
            loop {
                let timeout = self.poll_timeout();
                let (v4_ready, v6_ready, dump_ready) = {
                    let mut fds = [
                        PollFd::new(self.sock_v4.as_fd(), PollFlags::POLLIN),
                        PollFd::new(self.sock_v6.as_fd(), PollFlags::POLLIN),
                        PollFd::new(stdin.as_fd(), PollFlags::POLLIN),
                    ];
                    match poll(&mut fds, timeout) {
                        Err(Errno::EINTR) => continue,
                        Err(e) => return Err(e).context("poll failed"),
                        Ok(0) => break, // send deadline reached
                        Ok(_) => {
                            let readable = |fd: &PollFd| {
                                fd.revents()
                                    .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))
                            };
                            (readable(&fds[0]), readable(&fds[1]), readable(&fds[2]))
                        }
                    }
                };
                if v4_ready || v6_ready {
                    self.drain_replies();
                }
                if dump_ready && !self.serve_dump(&stdin, &mut stdout)? {
                    log::info!("dump channel closed, exiting");
                    return Ok(());
                }
            }

            if !self.retry_resolves() {
                return Ok(());
            }
            self.full_reresolve_if_due();
            if !self.parent_alive() {
                log::info!("parent process is gone, exiting");
                return Ok(());
            }
            if !self.send_batch() {
                return Ok(());
            }
        }
    }

    /// How long the multiplexer may block: until the next send deadline.
    fn poll_timeout(&self) -> PollTimeout {
        let wait = (self.last_send + self.cfg.interval.as_secs_f64() - unix_secs_f64()).max(0.0);
        let ms = (wait * 1000.0).ceil() as u128;
        PollTimeout::from(u16::try_from(ms).unwrap_or(u16::MAX))
    }

    fn drain_replies(&mut self) {
        loop {
            let mut progress = false;
            for v6 in [false, true] {
                let fd = if v6 {
                    self.sock_v6.as_raw_fd()
                } else {
                    self.sock_v4.as_raw_fd()
                };
                let mut buf = [0u8; 2048];
                match recvfrom::<SockaddrStorage>(fd, &mut buf) {
                    Ok((n, _src)) => {
                        progress = true;
                        self.handle_reply(v6, &buf[..n]);
                    }
                    Err(Errno::EAGAIN) => {}
                    Err(e) => log::debug!("recv error on the ICMP{} socket: {e}", if v6 { "v6" } else { "v4" }),
                }
            }
            if !progress {
                return;
            }
        }
    }

    fn handle_reply(&mut self, v6: bool, datagram: &[u8]) {
        // Anything that does not look like one of our replies is discarded
        // silently: raw ICMP sockets see all of the machine's ICMP traffic.
        let Some(msg) = packet::icmp_message(v6, datagram) else { return };
        let Some(reply) = packet::parse_reply(v6, msg) else { return };
        if self.last_send == 0.0 {
            return;
        }
        let Some(host) = self.hosts.iter_mut().find(|h| h.ping_id == reply.ident) else {
            return;
        };
        let now = unix_secs_f64();
        let sample = now - (f64::from(reply.send_secs) + f64::from(reply.send_micros) / 1e6);
        host.observe_reply(now, sample, self.gate, self.cfg.ewma_factor);
    }

    /// Answers one dump request with the per-host stats lines and a blank
    /// terminator. Returns `Ok(false)` on EOF (the supervisor is gone).
    fn serve_dump(&mut self, stdin: &io::Stdin, stdout: &mut io::Stdout) -> anyhow::Result<bool> {
        let mut request = String::new();
        if stdin.lock().read_line(&mut request).context("reading dump request")? == 0 {
            return Ok(false);
        }
        self.gate = RttGate::Draining;
        let now = unix_secs_f64();
        let mut out = stdout.lock();
        for host in &mut self.hosts {
            writeln!(
                out,
                "{} {:.10} {:.10} {:010}",
                host.spec,
                now - host.last_reply,
                host.rtt,
                host.outstanding_loss()
            )
            .context("writing dump")?;
            if host.sent > COUNTER_RESET_LIMIT {
                host.sent = 0;
                host.recv = 0;
            }
        }
        out.write_all(b"\n").context("writing dump terminator")?;
        out.flush().context("flushing dump")?;
        Ok(true)
    }

    /// Retries queued re-resolutions. Returns false when a host crossed the
    /// failure threshold and the prober should exit.
    fn retry_resolves(&mut self) -> bool {
        let queued: Vec<usize> = self.resolve_retry.iter().copied().collect();
        for idx in queued {
            let host = &mut self.hosts[idx];
            match resolve_spec(&host.spec) {
                Ok(addr) => {
                    host.addr = addr;
                    host.resolve_fails = 0;
                    self.resolve_retry.remove(&idx);
                }
                Err(e) => {
                    log::warn!("failed to resolve host spec {}: {e}", host.spec);
                    host.resolve_fails += 1;
                    if host.resolve_fails >= self.cfg.warn_tries {
                        log::error!(
                            "failed to resolve host spec {} after {} attempts, exiting so the supervisor restarts with clean state",
                            host.spec,
                            host.resolve_fails
                        );
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Re-resolves the whole host set on its fixed deadline, to track DNS
    /// and address changes. Failures go to the retry queue.
    fn full_reresolve_if_due(&mut self) {
        let now = unix_secs_f64();
        if now <= self.resolve_fixed_deadline {
            return;
        }
        for idx in 0..self.hosts.len() {
            match resolve_spec(&self.hosts[idx].spec) {
                Ok(addr) => self.hosts[idx].addr = addr,
                Err(_) => {
                    self.resolve_retry.insert(idx);
                }
            }
        }
        self.resolve_fixed_deadline = now + self.cfg.resolve_fixed.as_secs_f64();
    }

    fn parent_alive(&self) -> bool {
        self.cfg.parent_pid == 0 || process_alive(self.cfg.parent_pid)
    }

    /// Sends one echo request per host, all sharing one sequence number.
    /// Returns false when the send retries for a host are exhausted and the
    /// prober should exit.
    fn send_batch(&mut self) -> bool {
        let reply_deadline = unix_secs_f64() - self.cfg.resolve_no_reply.as_secs_f64();
        self.gate = RttGate::Sampling;
        let seq = self.seqs.next_seq();
        for idx in 0..self.hosts.len() {
            // A host that has been silent past the window is re-resolved on
            // the spot; failures go to the retry queue.
            if self.hosts[idx].last_reply < reply_deadline {
                match resolve_spec(&self.hosts[idx].spec) {
                    Ok(addr) => self.hosts[idx].addr = addr,
                    Err(_) => {
                        self.resolve_retry.insert(idx);
                    }
                }
            }
            let (addr, ping_id) = (self.hosts[idx].addr, self.hosts[idx].ping_id);
            let mut attempts = SEND_RETRIES;
            loop {
                match self.send_echo(addr, ping_id, seq) {
                    Ok(()) => break,
                    Err(e) => {
                        attempts -= 1;
                        if attempts == 0 {
                            log::error!(
                                "failed sending pings to host spec {} ({e}), exiting so the supervisor restarts with clean state",
                                self.hosts[idx].spec
                            );
                            return false;
                        }
                    }
                }
            }
            self.hosts[idx].sent += 1;
        }
        self.last_send = unix_secs_f64();
        true
    }

    fn init_hosts(&mut self) {
        let backoff = (self.cfg.interval / WARN_DELAY_DIV).max(WARN_DELAY_MIN);
        let specs = self.cfg.host_specs.clone();
        for spec in specs {
            let ping_id = self.fresh_ping_id();
            let mut warnings = WarnGate::new(self.cfg.warn_tries);
            let addr = loop {
                match resolve_spec(&spec).and_then(|addr| self.test_link(addr).map(|()| addr)) {
                    Ok(addr) => {
                        if let Some(n) = warnings.success() {
                            log::warn!("was able to resolve/send to host spec {spec} (attempts: {n})");
                        }
                        break addr;
                    }
                    Err(e) => {
                        match warnings.failure() {
                            WarnAction::Warn => log::warn!("unable to resolve/send to host spec {spec}: {e}"),
                            WarnAction::Escalate => {
                                log::warn!("(still) unable to resolve/send to host spec {spec}: {e}");
                                log::warn!("muting resolve/link warnings for {spec} until the next success");
                            }
                            WarnAction::Quiet => log::info!("unable to resolve/send to host spec {spec}: {e}"),
                        }
                        thread::sleep(backoff);
                    }
                }
            };
            self.hosts.push(Host::new(spec, addr, ping_id));
        }
    }

    /// Draws a random 16-bit ping id not used by any tracked host.
    fn fresh_ping_id(&self) -> u16 {
        let mut rng = rand::rng();
        loop {
            let id = rng.random_range(0..TRIAL_PING_ID);
            if self.hosts.iter().all(|h| h.ping_id != id) {
                return id;
            }
        }
    }

    /// Checks that the link is usable at all by firing one throwaway echo;
    /// a failed trial send means the link is down.
    fn test_link(&self, addr: IpAddr) -> io::Result<()> {
        self.send_echo(addr, TRIAL_PING_ID, 1).map_err(io::Error::from)
    }

    fn send_echo(&self, addr: IpAddr, ident: u16, seq: u16) -> nix::Result<()> {
        let (send_secs, send_micros) = wire_timestamp();
        let payload = EchoPayload {
            ident,
            seq,
            send_secs,
            send_micros,
        };
        match addr {
            IpAddr::V4(ip) => {
                let pkt = packet::encode_request(false, &payload);
                let dst = SockaddrIn::from(SocketAddrV4::new(ip, 0));
                sendto(self.sock_v4.as_raw_fd(), &pkt, &dst, MsgFlags::empty())?;
            }
            IpAddr::V6(ip) => {
                let pkt = packet::encode_request(true, &payload);
                let dst = SockaddrIn6::from(SocketAddrV6::new(ip, 0, 0, 0));
                sendto(self.sock_v6.as_raw_fd(), &pkt, &dst, MsgFlags::empty())?;
            }
        }
        Ok(())
    }
}

/// Signal-0 existence probe. EPERM still means "alive".
fn process_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

fn unix_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

/// The send timestamp embedded in outgoing packets: whole unix seconds
/// (truncated to 32 bits) and the microsecond remainder.
fn wire_timestamp() -> (u32, u32) {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    (since_epoch.as_secs() as u32, since_epoch.subsec_micros())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use super::{Family, Host, ProberConfig, RttGate, WarnAction, WarnGate, process_alive, resolve_spec, split_spec};

    #[test]
    fn spec_family_tags() {
        assert_eq!(split_spec("v4:example.com"), (Family::V4, "example.com"));
        assert_eq!(split_spec("v6:example.com"), (Family::V6, "example.com"));
        assert_eq!(split_spec("example.com"), (Family::Any, "example.com"));
    }

    #[test]
    fn literal_addresses_resolve_by_family() {
        assert_eq!(
            resolve_spec("v4:127.0.0.1").unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(resolve_spec("v6:::1").unwrap(), IpAddr::V6(Ipv6Addr::LOCALHOST));
        // A family tag excludes addresses of the other family.
        assert!(resolve_spec("v6:127.0.0.1").is_err());
    }

    #[test]
    fn warnings_escalate_then_mute_until_success() {
        let mut gate = WarnGate::new(3);
        assert_eq!(gate.failure(), WarnAction::Warn);
        assert_eq!(gate.failure(), WarnAction::Warn);
        assert_eq!(gate.failure(), WarnAction::Escalate);
        assert_eq!(gate.failure(), WarnAction::Quiet);
        assert_eq!(gate.failure(), WarnAction::Quiet);
        // Recovery after muting is worth announcing.
        assert_eq!(gate.success(), Some(5));
        // The streak restarts from scratch.
        assert_eq!(gate.failure(), WarnAction::Warn);
        assert_eq!(gate.success(), None);
    }

    fn host() -> Host {
        Host::new("v4:gw".into(), IpAddr::V4(Ipv4Addr::LOCALHOST), 7)
    }

    #[test]
    fn loss_allows_one_packet_in_flight() {
        let mut h = host();
        assert_eq!(h.outstanding_loss(), 0);
        h.sent = 1;
        assert_eq!(h.outstanding_loss(), 0, "a single unanswered packet may be in flight");
        h.sent = 10;
        h.recv = 4;
        assert_eq!(h.outstanding_loss(), 5);
        h.recv = 12; // duplicates can push recv past sent
        assert_eq!(h.outstanding_loss(), 0);
    }

    #[test]
    fn silent_host_loss_approaches_sent_minus_one() {
        let mut h = host();
        for _ in 0..100 {
            h.sent += 1;
        }
        assert_eq!(h.outstanding_loss(), 99);
    }

    #[test]
    fn replies_fold_the_ewma_only_while_sampling() {
        let mut h = host();
        h.observe_reply(1000.0, 0.5, RttGate::Sampling, 0.25);
        assert_eq!(h.rtt, 0.125);
        assert_eq!(h.recv, 1);
        assert_eq!(h.last_reply, 1000.0);

        // Draining: liveness and loss still count, the estimate does not move.
        h.observe_reply(1001.0, 9.0, RttGate::Draining, 0.25);
        assert_eq!(h.rtt, 0.125);
        assert_eq!(h.recv, 2);
        assert_eq!(h.last_reply, 1001.0);

        h.observe_reply(1002.0, 0.625, RttGate::Sampling, 0.25);
        assert_eq!(h.rtt, 0.25);
    }

    #[test]
    fn args_parse_in_supervisor_order() {
        let cfg = ProberConfig::from_args(
            ["5", "300", "900", "0.25", "4242", "5", "v4:gw", "v6:dns"]
                .into_iter()
                .map(String::from),
        )
        .unwrap();
        assert_eq!(cfg.interval.as_secs(), 5);
        assert_eq!(cfg.resolve_no_reply.as_secs(), 300);
        assert_eq!(cfg.resolve_fixed.as_secs(), 900);
        assert_eq!(cfg.ewma_factor, 0.25);
        assert_eq!(cfg.parent_pid, 4242);
        assert_eq!(cfg.warn_tries, 5);
        assert_eq!(cfg.host_specs, vec!["v4:gw".to_owned(), "v6:dns".to_owned()]);
    }

    #[test]
    fn process_liveness_probe() {
        assert!(process_alive(std::process::id() as i32));
        // A child that has been reaped is gone for the signal-0 probe.
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        assert!(!process_alive(pid));
    }

    #[test]
    fn args_without_hosts_are_rejected() {
        let err = ProberConfig::from_args(["5", "300", "900", "0.25", "1", "5"].into_iter().map(String::from))
            .unwrap_err();
        assert!(err.to_string().contains("no host specs"));
    }
}
