//! linkq agent
//!
//! Field daemon running next to an ath10k station interface.
//!
//! - Polls station and firmware counters every poll interval
//! - Scores the smoothed retry ratio and classifies link metrics
//! - Or, with `--source iwinfo`, forwards the driver's link quality (0-100 %)
//! - Streams one small UDP datagram per tick to a collector
//! - Waits out missing interfaces / debugfs and resumes cleanly
//! - Restarts a link's monitor task if it ever dies, leaving other links alone
//! - In `--simulate` mode, generates a synthetic link for local dev

mod source;
mod udp;

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tokio::task::{self, JoinSet};
use tracing_subscriber::EnvFilter;

use linkq_core::config::LinkConfig;
use linkq_core::{
    LinkMonitor, LinkqConfig, PayloadFormat, SampleSource, SendMode, SendStats, SourceKind,
    report,
};

use crate::source::{AgentSource, Ath10kSource, IwinfoSource, SimulatedSource};
use crate::udp::UdpSender;

const DEFAULT_IFACE: &str = "phy1-sta0";
const DEFAULT_PEER_MAC: &str = "98:03:cf:cf:a4:28";
const DEFAULT_DEBUGFS: &str = "/sys/kernel/debug/ieee80211/phy1/ath10k";
const DEFAULT_TARGET_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 10));

/// Wireless link health monitor with UDP telemetry.
#[derive(Parser, Debug)]
#[command(name = "linkq-agent", about = "Link health monitor + UDP forwarder")]
struct Cli {
    /// TOML config file. CLI flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// UDP collector address (used when the config defines no links).
    #[arg(long, default_value = "192.168.0.1")]
    udp_ip: IpAddr,

    /// UDP collector port (used when the config defines no links).
    #[arg(long, default_value_t = 12345)]
    udp_port: u16,

    /// Sample source for the link: `ath10k` or `iwinfo`.
    #[arg(long)]
    source: Option<SourceKind>,

    /// Force the WLAN interface (skip auto-detection).
    #[arg(long)]
    iface: Option<String>,

    /// Detect the interface carrying this IPv4 address.
    #[arg(long)]
    target_ip: Option<IpAddr>,

    /// MAC address of the associated peer.
    #[arg(long)]
    peer_mac: Option<String>,

    /// ath10k debugfs directory containing `fw_stats`.
    #[arg(long)]
    debugfs: Option<PathBuf>,

    /// Poll interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Only send telemetry when the window is ready or the link is degraded.
    #[arg(long, default_value_t = false)]
    gated: bool,

    /// Datagram layout: `pair` (peer_rssi,score), `score-only` or `quality`.
    #[arg(long)]
    payload: Option<PayloadFormat>,

    /// iwinfo link quality that maps to 0 %.
    #[arg(long)]
    min_quality: Option<u32>,

    /// iwinfo link quality that maps to 100 % (default: driver denominator).
    #[arg(long)]
    max_quality: Option<u32>,

    /// Per-counter diagnostic rows and debug logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Use a synthetic link instead of the radio.
    #[arg(long, default_value_t = false)]
    simulate: bool,

    /// Seed for `--simulate`.
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LinkqConfig> {
    let Some(path) = path else {
        return Ok(LinkqConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    LinkqConfig::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Apply CLI overrides on top of the file config.
fn merge_cli(mut cfg: LinkqConfig, cli: &Cli) -> anyhow::Result<LinkqConfig> {
    let m = &mut cfg.monitor;
    if let Some(ms) = cli.interval_ms {
        anyhow::ensure!(ms > 0, "--interval-ms must be greater than zero");
        m.poll_interval = Duration::from_millis(ms);
    }
    if cli.gated {
        m.send_mode = SendMode::Gated;
    }
    if let Some(payload) = cli.payload {
        m.payload = payload;
    }
    m.verbose |= cli.verbose;

    if cfg.links.is_empty() {
        cfg.links
            .push(LinkConfig::new(0, SocketAddr::new(cli.udp_ip, cli.udp_port)));
    }
    if let Some(first) = cfg.links.first_mut() {
        if let Some(kind) = cli.source {
            first.source = kind;
        }
        if let Some(min) = cli.min_quality {
            first.min_quality = min;
        }
        if cli.max_quality.is_some() {
            first.max_quality = cli.max_quality;
        }
        if cli.iface.is_some() {
            first.interface = cli.iface.clone();
        }
        if cli.target_ip.is_some() {
            first.target_ip = cli.target_ip;
        }
        if let Some(mac) = &cli.peer_mac {
            first.peer_mac = Some(mac.to_ascii_lowercase());
        }
        if cli.debugfs.is_some() {
            first.debugfs = cli.debugfs.clone();
        }
    }

    // Simulated links carry every reading, whatever source they name.
    if cli.simulate {
        for link in &cfg.links {
            link.validate()?;
        }
    } else {
        cfg.validate()?;
    }
    Ok(cfg)
}

fn build_source(link: &LinkConfig, cli: &Cli) -> AgentSource {
    if cli.simulate {
        return AgentSource::Simulated(SimulatedSource::new(
            cli.seed.map(|s| s.wrapping_add(link.id as u64)),
        ));
    }
    if link.source == SourceKind::Iwinfo {
        let target_ip = match (&link.interface, link.target_ip) {
            (None, None) => Some(DEFAULT_TARGET_IP),
            (_, ip) => ip,
        };
        return AgentSource::Iwinfo(IwinfoSource::new(
            link.interface.clone(),
            target_ip,
            link.min_quality,
            link.max_quality,
        ));
    }
    let iface = match (&link.interface, link.target_ip) {
        (Some(iface), _) => Some(iface.clone()),
        (None, Some(_)) => None,
        (None, None) => Some(DEFAULT_IFACE.to_string()),
    };
    AgentSource::Ath10k(Ath10kSource::new(
        iface,
        link.target_ip,
        link.peer_mac
            .clone()
            .unwrap_or_else(|| DEFAULT_PEER_MAC.to_string()),
        link.debugfs
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEBUGFS)),
    ))
}

/// Wait out `delay` before a (re)started monitor begins. Returns `false` if
/// shutdown was requested in the meantime.
async fn start_after(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if delay.is_zero() {
        return !*shutdown.borrow();
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => !*shutdown.borrow(),
        _ = shutdown.changed() => false,
    }
}

/// Monitor tasks and the link each one serves.
struct Monitors {
    tasks: JoinSet<SendStats>,
    links: HashMap<task::Id, usize>,
    shutdown: watch::Receiver<bool>,
}

impl Monitors {
    fn new(shutdown: watch::Receiver<bool>) -> Self {
        Monitors {
            tasks: JoinSet::new(),
            links: HashMap::new(),
            shutdown,
        }
    }

    fn spawn(
        &mut self,
        cfg: &LinkqConfig,
        link: &LinkConfig,
        cli: &Cli,
        delay: Duration,
    ) -> anyhow::Result<()> {
        let sender = UdpSender::new(link.dest)
            .with_context(|| format!("opening UDP socket for {}", link.dest))?;
        let source = build_source(link, cli);
        tracing::info!(
            link = link.id,
            source = %source.describe(),
            dest = %sender.dest(),
            "monitor configured"
        );
        let monitor = LinkMonitor::new(cfg.monitor.clone(), source, sender);
        let mut shutdown = self.shutdown.clone();
        let handle = self.tasks.spawn(async move {
            if start_after(delay, &mut shutdown).await {
                monitor.run(shutdown).await
            } else {
                SendStats::default()
            }
        });
        self.links.insert(handle.id(), link.id);
        Ok(())
    }

    /// Wait for a task to end on its own; returns the link it served.
    async fn next_exit(&mut self) -> Option<usize> {
        loop {
            let joined = self.tasks.join_next_with_id().await?;
            let id = match &joined {
                Ok((id, _)) => *id,
                Err(e) => e.id(),
            };
            let Some(link) = self.links.remove(&id) else {
                continue;
            };
            match joined {
                Ok((_, stats)) => tracing::warn!(
                    link,
                    sent = stats.sent,
                    "monitor returned before shutdown"
                ),
                Err(e) => tracing::error!(link, error = %e, "monitor task failed"),
            }
            return Some(link);
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
                    _ = term.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "SIGTERM handler unavailable"),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received SIGINT, shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let cfg = merge_cli(load_config(cli.config.as_deref())?, &cli)?;

    tracing::info!(
        links = cfg.links.len(),
        poll_ms = cfg.monitor.poll_interval.as_millis() as u64,
        window = cfg.monitor.window_size,
        send_mode = ?cfg.monitor.send_mode,
        simulate = cli.simulate,
        "linkq-agent starting"
    );
    tracing::info!("{}", report::header(cfg.monitor.verbose));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut monitors = Monitors::new(shutdown_rx);
    for link in &cfg.links {
        monitors.spawn(&cfg, link, &cli, Duration::ZERO)?;
    }

    let signal = shutdown_signal();
    tokio::pin!(signal);
    loop {
        tokio::select! {
            _ = &mut signal => break,
            Some(link_id) = monitors.next_exit() => {
                let Some(link) = cfg.links.iter().find(|l| l.id == link_id) else {
                    continue;
                };
                tracing::info!(
                    link = link_id,
                    delay_ms = cfg.monitor.retry_interval.as_millis() as u64,
                    "restarting monitor"
                );
                if let Err(e) = monitors.spawn(&cfg, link, &cli, cfg.monitor.retry_interval) {
                    tracing::error!(link = link_id, "monitor not restarted: {e:#}");
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    while let Some(result) = monitors.tasks.join_next().await {
        match result {
            Ok(stats) => tracing::debug!(sent = stats.sent, failed = stats.failed, "monitor joined"),
            Err(e) => tracing::error!("monitor task failed: {e}"),
        }
    }

    tracing::info!("linkq-agent stopped");
    Ok(())
}
