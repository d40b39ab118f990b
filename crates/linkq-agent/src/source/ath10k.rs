//! ath10k station + firmware stats source.
//!
//! Station counters and signal come from `iw dev <iface> station get <mac>`;
//! MPDU/PPDU counters and the peer RSSI come from the driver's debugfs
//! `fw_stats` dump. Both must be readable for a sample to be produced.

use std::path::PathBuf;

use linkq_core::{LinkCounters, RawSample, SampleSource, SignalReadings, SourceError};

use super::detect::{self, IfaceResolver};

/// Station-table values from `iw ... station get`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationStats {
    pub tx_retries: u64,
    pub tx_failed: u64,
    pub ack_signal_dbm: f64,
    pub signal_avg_dbm: f64,
}

/// Counters and peer RSSI from debugfs `fw_stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FirmwareStats {
    pub mpdu_queued: u64,
    pub mpdu_sw_requeued: u64,
    pub mpdu_success_retry: u64,
    pub mpdu_success_multitry: u64,
    pub mpdu_fail_retry: u64,
    pub ppdu_noack: u64,
    pub pdev_requeued: u64,
    pub pdev_excessive_retries: u64,
    pub pdev_no_ack: u64,
    pub peer_rssi: Option<f64>,
}

/// Parse a number at the start of `s`, ignoring trailing units.
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

fn last_token_u64(line: &str) -> Option<u64> {
    line.split_whitespace().last()?.parse().ok()
}

/// Parse `iw dev <iface> station get <mac>` output. All four fields are
/// required.
pub fn parse_station(output: &str) -> Result<StationStats, SourceError> {
    let mut retries = None;
    let mut failed = None;
    let mut ack = None;
    let mut sig = None;

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("tx retries:") {
            retries = leading_number(rest).map(|v| v as u64);
        } else if let Some(rest) = line.strip_prefix("tx failed:") {
            failed = leading_number(rest).map(|v| v as u64);
        } else if let Some(rest) = line.strip_prefix("last ack signal:") {
            ack = leading_number(rest);
        } else if let Some(rest) = line.strip_prefix("signal avg:") {
            sig = leading_number(rest);
        }
    }

    match (retries, failed, ack, sig) {
        (Some(tx_retries), Some(tx_failed), Some(ack_signal_dbm), Some(signal_avg_dbm)) => {
            Ok(StationStats {
                tx_retries,
                tx_failed,
                ack_signal_dbm,
                signal_avg_dbm,
            })
        }
        _ => Err(SourceError::Parse(
            "station dump missing tx retries/tx failed/ack signal/signal avg".into(),
        )),
    }
}

/// Parse the ath10k `fw_stats` dump. Missing counters read as zero.
pub fn parse_fw_stats(dump: &str, peer_mac: &str) -> FirmwareStats {
    let mut fw = FirmwareStats::default();
    let mut in_peer = false;

    for line in dump.lines() {
        let low = line.to_ascii_lowercase();

        if low.contains("peer mac address") {
            in_peer = low.contains(peer_mac);
            continue;
        }
        if in_peer && low.contains("peer rssi") {
            fw.peer_rssi = last_token_u64(line).map(|v| v as f64);
            in_peer = false;
            continue;
        }

        let Some(value) = last_token_u64(line) else {
            continue;
        };
        if low.contains("mpdu queued") {
            fw.mpdu_queued = value;
        } else if low.contains("mpdu sw requeued") {
            fw.mpdu_sw_requeued = value;
        } else if low.contains("mpdu success retry") {
            fw.mpdu_success_retry = value;
        } else if low.contains("mpdu success multitry") {
            fw.mpdu_success_multitry = value;
        } else if low.contains("mpdu fail retry") {
            fw.mpdu_fail_retry = value;
        } else if low.contains("ppdu noack") {
            fw.ppdu_noack = value;
        } else if low.contains("mpdus requeued") {
            fw.pdev_requeued = value;
        } else if low.contains("excessive retries") {
            fw.pdev_excessive_retries = value;
        } else if low.contains("mpdus receive no ack") {
            fw.pdev_no_ack = value;
        }
    }
    fw
}

pub fn build_sample(sta: &StationStats, fw: &FirmwareStats) -> RawSample {
    RawSample::new(
        LinkCounters {
            tx_retries: sta.tx_retries,
            tx_failed: sta.tx_failed,
            mpdu_queued: fw.mpdu_queued,
            mpdu_sw_requeued: fw.mpdu_sw_requeued,
            mpdu_success_retry: fw.mpdu_success_retry,
            mpdu_success_multitry: fw.mpdu_success_multitry,
            mpdu_fail_retry: fw.mpdu_fail_retry,
            ppdu_noack: fw.ppdu_noack,
            pdev_requeued: fw.pdev_requeued,
            pdev_excessive_retries: fw.pdev_excessive_retries,
            pdev_no_ack: fw.pdev_no_ack,
        },
        SignalReadings {
            ack_signal_dbm: Some(sta.ack_signal_dbm),
            signal_avg_dbm: Some(sta.signal_avg_dbm),
            peer_rssi: fw.peer_rssi,
            link_quality_pct: None,
        },
    )
}

/// Live source for an ath10k station interface.
#[derive(Debug, Clone)]
pub struct Ath10kSource {
    iface: IfaceResolver,
    peer_mac: String,
    fw_stats: PathBuf,
}

impl Ath10kSource {
    pub fn new(
        forced_iface: Option<String>,
        target_ip: Option<std::net::IpAddr>,
        peer_mac: String,
        debugfs: PathBuf,
    ) -> Self {
        Ath10kSource {
            iface: IfaceResolver::new(forced_iface, target_ip),
            peer_mac: peer_mac.to_ascii_lowercase(),
            fw_stats: debugfs.join("fw_stats"),
        }
    }
}

impl SampleSource for Ath10kSource {
    async fn read(&mut self) -> Result<RawSample, SourceError> {
        let iface = self
            .iface
            .current()
            .ok_or_else(|| SourceError::Unavailable("no interface".into()))?
            .to_string();

        let out = detect::run(&["iw", "dev", &iface, "station", "get", &self.peer_mac])
            .await
            .ok_or_else(|| SourceError::Unavailable(format!("iw station get on {iface}")))?;
        let sta = parse_station(&out)?;

        let dump = tokio::fs::read_to_string(&self.fw_stats)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", self.fw_stats.display())))?;
        let fw = parse_fw_stats(&dump, &self.peer_mac);

        Ok(build_sample(&sta, &fw))
    }

    async fn is_associated(&mut self) -> bool {
        self.iface.is_associated().await
    }

    fn describe(&self) -> String {
        match self.iface.describe() {
            Some(iface) => format!("{iface}/{}", self.peer_mac),
            None => self.peer_mac.clone(),
        }
    }
}
