//! TOML configuration.
//!
//! Files deserialize into the `*Input` structs, where every field is
//! optional, and [`LinkqConfigInput::resolve`] turns them into validated
//! settings with defaults filled in. CLI overrides are applied on the
//! resolved [`LinkqConfig`] and re-checked with [`LinkqConfig::validate`].

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::classify::{MetricThresholds, Polarity, Thresholds};
use crate::score::ScoreEngine;
use crate::telemetry::PayloadFormat;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(String),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
    #[error("window_size must be at least 2, got {0}")]
    WindowTooSmall(usize),
    #[error("{metric} thresholds out of order for {polarity:?}: warn={warn}, crit={crit}")]
    ThresholdOrder {
        metric: &'static str,
        polarity: Polarity,
        warn: f64,
        crit: f64,
    },
    #[error("link {0}: missing destination")]
    MissingDestination(usize),
    #[error("link {link}: invalid destination {value:?}")]
    InvalidDestination { link: usize, value: String },
    #[error("link {link}: invalid target_ip {value:?}")]
    InvalidTargetIp { link: usize, value: String },
    #[error("link {link}: max_quality {max} must be greater than min_quality {min}")]
    QualityRange { link: usize, min: u32, max: u32 },
    #[error("link {0}: quality payload needs source = \"iwinfo\"")]
    QualityWithoutIwinfo(usize),
}

/// When an ACTIVE tick transmits telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// Every successful poll sends one datagram.
    #[default]
    EveryTick,
    /// Only ticks with a ready window or in fast mode send.
    Gated,
}

/// Which tool a link's samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// `iw station get` counters plus ath10k debugfs `fw_stats`.
    #[default]
    Ath10k,
    /// `iwinfo <iface> info` link quality.
    Iwinfo,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ath10k" => Ok(SourceKind::Ath10k),
            "iwinfo" => Ok(SourceKind::Iwinfo),
            other => Err(format!("unknown source {other:?} (expected ath10k or iwinfo)")),
        }
    }
}

// ─── Raw TOML input ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkqConfigInput {
    pub version: u32,
    pub monitor: MonitorConfigInput,
    pub score: ScoreConfigInput,
    pub thresholds: ThresholdsInput,
    pub links: Vec<LinkConfigInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorConfigInput {
    pub poll_interval_ms: Option<u64>,
    pub retry_interval_ms: Option<u64>,
    pub recovery_backoff_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub window_size: Option<usize>,
    pub send_mode: Option<SendMode>,
    pub payload: Option<PayloadFormat>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoreConfigInput {
    pub clamp_pct: Option<f64>,
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThresholdsInput {
    pub retry: Option<ThresholdInput>,
    pub failure: Option<ThresholdInput>,
    pub ack_signal: Option<ThresholdInput>,
    pub signal_avg: Option<ThresholdInput>,
    pub peer_rssi: Option<ThresholdInput>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ThresholdInput {
    pub warn: Option<f64>,
    pub crit: Option<f64>,
    pub polarity: Option<Polarity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkConfigInput {
    pub interface: Option<String>,
    pub peer_mac: Option<String>,
    pub debugfs: Option<String>,
    pub target_ip: Option<String>,
    pub dest: Option<String>,
    pub source: Option<SourceKind>,
    pub min_quality: Option<u32>,
    pub max_quality: Option<u32>,
}

// ─── Resolved config ────────────────────────────────────────────────────────

/// Immutable per-monitor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub retry_interval: Duration,
    pub recovery_backoff: Duration,
    pub read_timeout: Duration,
    pub window_size: usize,
    pub send_mode: SendMode,
    pub payload: PayloadFormat,
    pub verbose: bool,
    pub score: ScoreEngine,
    pub thresholds: MetricThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            retry_interval: Duration::from_secs(3),
            recovery_backoff: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
            window_size: 3,
            send_mode: SendMode::EveryTick,
            payload: PayloadFormat::Pair,
            verbose: false,
            score: ScoreEngine::default(),
            thresholds: MetricThresholds::default(),
        }
    }
}

/// One monitored link and where its telemetry goes.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub id: usize,
    pub interface: Option<String>,
    pub peer_mac: Option<String>,
    pub debugfs: Option<PathBuf>,
    pub target_ip: Option<IpAddr>,
    pub dest: SocketAddr,
    pub source: SourceKind,
    /// Raw link quality that maps to 0 %.
    pub min_quality: u32,
    /// Raw link quality that maps to 100 %; `None` uses the driver's
    /// reported denominator.
    pub max_quality: Option<u32>,
}

impl LinkConfig {
    /// Link with defaults for everything but the destination.
    pub fn new(id: usize, dest: SocketAddr) -> Self {
        LinkConfig {
            id,
            interface: None,
            peer_mac: None,
            debugfs: None,
            target_ip: None,
            dest,
            source: SourceKind::default(),
            min_quality: 0,
            max_quality: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_quality {
            Some(max) if max <= self.min_quality => Err(ConfigError::QualityRange {
                link: self.id,
                min: self.min_quality,
                max,
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkqConfig {
    pub version: u32,
    pub monitor: MonitorConfig,
    pub links: Vec<LinkConfig>,
}

impl Default for LinkqConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            monitor: MonitorConfig::default(),
            links: Vec::new(),
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn millis(value: Option<u64>, default: Duration, name: &'static str) -> Result<Duration, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::ZeroValue(name)),
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => Ok(default),
    }
}

fn resolve_thresholds(
    input: Option<ThresholdInput>,
    default: Thresholds,
    metric: &'static str,
) -> Result<Thresholds, ConfigError> {
    let input = input.unwrap_or_default();
    let t = Thresholds {
        warn: input.warn.unwrap_or(default.warn),
        crit: input.crit.unwrap_or(default.crit),
        polarity: input.polarity.unwrap_or(default.polarity),
    };
    if !t.is_ordered() {
        return Err(ConfigError::ThresholdOrder {
            metric,
            polarity: t.polarity,
            warn: t.warn,
            crit: t.crit,
        });
    }
    Ok(t)
}

impl LinkqConfigInput {
    pub fn resolve(self) -> Result<LinkqConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let defaults = MonitorConfig::default();
        let m = self.monitor;

        let window_size = m.window_size.unwrap_or(defaults.window_size);
        if window_size < 2 {
            return Err(ConfigError::WindowTooSmall(window_size));
        }

        let score = ScoreEngine::new(
            self.score.clamp_pct.unwrap_or(defaults.score.clamp_pct),
            self.score.scale.unwrap_or(defaults.score.scale),
        );
        if score.clamp_pct.is_nan() || score.clamp_pct <= 0.0 {
            return Err(ConfigError::ZeroValue("score.clamp_pct"));
        }
        if score.scale.is_nan() || score.scale <= 0.0 {
            return Err(ConfigError::ZeroValue("score.scale"));
        }

        let d = defaults.thresholds;
        let th = self.thresholds;
        let thresholds = MetricThresholds {
            retry: resolve_thresholds(th.retry, d.retry, "retry")?,
            failure: resolve_thresholds(th.failure, d.failure, "failure")?,
            ack_signal: resolve_thresholds(th.ack_signal, d.ack_signal, "ack_signal")?,
            signal_avg: resolve_thresholds(th.signal_avg, d.signal_avg, "signal_avg")?,
            peer_rssi: resolve_thresholds(th.peer_rssi, d.peer_rssi, "peer_rssi")?,
        };

        let monitor = MonitorConfig {
            poll_interval: millis(m.poll_interval_ms, defaults.poll_interval, "poll_interval_ms")?,
            retry_interval: millis(
                m.retry_interval_ms,
                defaults.retry_interval,
                "retry_interval_ms",
            )?,
            recovery_backoff: millis(
                m.recovery_backoff_ms,
                defaults.recovery_backoff,
                "recovery_backoff_ms",
            )?,
            read_timeout: millis(m.read_timeout_ms, defaults.read_timeout, "read_timeout_ms")?,
            window_size,
            send_mode: m.send_mode.unwrap_or(defaults.send_mode),
            payload: m.payload.unwrap_or(defaults.payload),
            verbose: m.verbose.unwrap_or(defaults.verbose),
            score,
            thresholds,
        };

        let mut links = Vec::with_capacity(self.links.len());
        for (id, link) in self.links.into_iter().enumerate() {
            let dest_str = non_empty(link.dest).ok_or(ConfigError::MissingDestination(id))?;
            let dest = dest_str
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidDestination {
                    link: id,
                    value: dest_str.clone(),
                })?;
            let target_ip = match non_empty(link.target_ip) {
                Some(ip) => Some(ip.parse::<IpAddr>().map_err(|_| {
                    ConfigError::InvalidTargetIp {
                        link: id,
                        value: ip.clone(),
                    }
                })?),
                None => None,
            };
            links.push(LinkConfig {
                id,
                interface: non_empty(link.interface),
                peer_mac: non_empty(link.peer_mac).map(|m| m.to_ascii_lowercase()),
                debugfs: non_empty(link.debugfs).map(PathBuf::from),
                target_ip,
                dest,
                source: link.source.unwrap_or_default(),
                min_quality: link.min_quality.unwrap_or(0),
                max_quality: link.max_quality,
            });
        }

        let cfg = LinkqConfig {
            version,
            monitor,
            links,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

impl LinkqConfig {
    /// Per-link checks plus the payload/source pairing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for link in &self.links {
            link.validate()?;
            if self.monitor.payload == PayloadFormat::Quality && link.source != SourceKind::Iwinfo {
                return Err(ConfigError::QualityWithoutIwinfo(link.id));
            }
        }
        Ok(())
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(LinkqConfig::default());
        }
        let parsed: LinkqConfigInput =
            toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?;
        parsed.resolve()
    }
}
