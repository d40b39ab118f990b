//! Console diagnostic rows.
//!
//! Purely cosmetic: one line per reported tick with the window deltas (in
//! verbose mode) and the classified metrics colored green / yellow / red.
//! A missing reading prints `n/a` in its severity color, so a reading that
//! vanished mid-acquisition shows up yellow.

use console::{StyledObject, style};

use crate::classify::{LinkAssessment, Severity};
use crate::sample::{COUNTER_LABELS, LinkCounters, SignalReadings};

/// Everything derived from one ACTIVE tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickMetrics {
    /// Window deltas; zero placeholders until the window is ready.
    pub window: LinkCounters,
    pub window_ready: bool,
    /// Instantaneous retry ratio since the previous poll.
    pub instant_retry_ratio: f64,
    /// Smoothed retry ratio.
    pub retry_ratio: f64,
    /// Windowed failure ratio; 0.0 until the window is ready.
    pub failure_ratio: f64,
    pub signal: SignalReadings,
    pub assessment: LinkAssessment,
    pub score: u32,
}

impl TickMetrics {
    /// Whether a diagnostic row should be printed for this tick.
    pub fn is_reportable(&self) -> bool {
        self.window_ready || self.assessment.is_fast()
    }
}

fn paint<D>(value: D, severity: Severity) -> StyledObject<D> {
    match severity {
        Severity::Healthy => style(value).green(),
        Severity::Warning => style(value).yellow(),
        Severity::Critical => style(value).red(),
    }
}

fn pct(ratio: f64, precision: usize, severity: Severity) -> String {
    let text = format!("{:.*}%", precision, ratio * 100.0);
    format!("{:>7}", paint(text, severity))
}

fn dbm(value: Option<f64>, severity: Severity) -> String {
    match value {
        Some(v) => format!("{}", paint(format!("{v:4.0}dBm"), severity)),
        None => format!("    {}", paint("n/a", severity)),
    }
}

fn rssi(value: Option<f64>, severity: Severity) -> String {
    match value {
        Some(v) => format!("{}", paint(format!("{v:5.0}"), severity)),
        None => format!("  {}", paint("n/a", severity)),
    }
}

fn quality(value: Option<u32>) -> String {
    match value {
        Some(q) => format!("{q:>5}%"),
        None => "   n/a".to_string(),
    }
}

/// Column header matching [`format_row`].
pub fn header(verbose: bool) -> String {
    let mut out = format!("{:<8} ", "TIME");
    if verbose {
        for (i, label) in COUNTER_LABELS.iter().enumerate() {
            out.push_str(&format!("{label:>6} "));
            // group separators after STA and vdev columns
            if i == 1 || i == 7 {
                out.push_str("  ");
            }
        }
        out.push_str("  ");
    }
    out.push_str("    RT%     FL%     ACK  SIGAVG  PRSSI    LQ");
    out
}

/// Row body without the timestamp.
pub fn format_row(m: &TickMetrics, verbose: bool) -> String {
    let a = &m.assessment;
    let mut out = String::new();
    if verbose {
        for (i, d) in m.window.as_array().iter().enumerate() {
            out.push_str(&format!("{d:6} "));
            if i == 1 || i == 7 {
                out.push_str("  ");
            }
        }
        out.push_str("  ");
    }
    out.push_str(&format!(
        "{} {} {} {} {} {}",
        pct(m.retry_ratio, 1, a.retry),
        pct(m.failure_ratio, 3, a.failure),
        dbm(m.signal.ack_signal_dbm, a.ack_signal),
        dbm(m.signal.signal_avg_dbm, a.signal_avg),
        rssi(m.signal.peer_rssi, a.peer_rssi),
        quality(m.signal.link_quality_pct),
    ));
    out
}

/// Timestamped diagnostic row.
pub fn render_row(m: &TickMetrics, verbose: bool) -> String {
    format!(
        "{:<8} {}",
        chrono::Local::now().format("%H:%M:%S"),
        format_row(m, verbose)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> TickMetrics {
        TickMetrics {
            window: LinkCounters {
                tx_retries: 12,
                mpdu_queued: 340,
                ..Default::default()
            },
            window_ready: true,
            instant_retry_ratio: 0.03,
            retry_ratio: 0.035,
            failure_ratio: 0.0125,
            signal: SignalReadings {
                ack_signal_dbm: Some(-55.0),
                signal_avg_dbm: Some(-71.0),
                peer_rssi: None,
                link_quality_pct: Some(64),
            },
            assessment: LinkAssessment {
                retry: Severity::Healthy,
                failure: Severity::Healthy,
                ack_signal: Severity::Healthy,
                signal_avg: Severity::Warning,
                peer_rssi: Severity::Critical,
            },
            score: 74,
        }
    }

    #[test]
    fn compact_row_shows_metrics() {
        let row = format_row(&metrics(), false);
        assert!(row.contains("3.5%"), "{row}");
        assert!(row.contains("1.250%"), "{row}");
        assert!(row.contains("-55dBm"), "{row}");
        assert!(row.contains("-71dBm"), "{row}");
        assert!(row.contains("n/a"), "{row}");
        assert!(row.contains("64%"), "{row}");
        assert!(!row.contains("340"), "{row}");
    }

    #[test]
    fn verbose_row_includes_window_deltas() {
        let row = format_row(&metrics(), true);
        assert!(row.contains("    12 "), "{row}");
        assert!(row.contains("   340 "), "{row}");
    }

    #[test]
    fn header_lists_counter_columns_when_verbose() {
        assert!(header(true).contains("FW-NA"));
        assert!(!header(false).contains("FW-NA"));
        assert!(header(false).contains("RT%"));
    }

    #[test]
    fn reportable_when_ready_or_fast() {
        let mut m = metrics();
        assert!(m.is_reportable());
        m.window_ready = false;
        assert!(!m.is_reportable());
        m.assessment.retry = Severity::Warning;
        assert!(m.is_reportable());
    }
}
