//! `harvest-pingd`: the standalone ICMP prober.
//!
//! Not meant to be launched by hand — the agent's ping collector spawns it
//! with positional startup parameters and pulls stats snapshots through the
//! stdin/stdout dump protocol. Needs CAP_NET_RAW (or root) for the raw
//! sockets.

use anyhow::Context;

use plugin_ping::prober::{Prober, ProberConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = ProberConfig::from_args(std::env::args().skip(1)).context(
        "usage: harvest-pingd <interval> <no-reply-window> <full-resolve-period> \
         <ewma-factor> <parent-pid> <warn-tries> <host-spec>...",
    )?;
    let mut prober = Prober::new(cfg).context("prober startup failed")?;
    prober.run()
}
