//! # Severity Classification
//!
//! Maps a continuous metric to healthy / warning / critical using two
//! thresholds. Whether a larger value is worse (retry and failure ratios) or
//! better (signal strength) is carried by [`Polarity`], so the classifier
//! itself holds no metric-specific constants.

use serde::Deserialize;

/// Three-level severity, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Healthy,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Healthy => "healthy",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Warning or worse.
    pub fn is_degraded(&self) -> bool {
        *self >= Severity::Warning
    }
}

/// Direction in which a metric gets worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsWorse,
    LowerIsWorse,
}

/// Classify `value` against a warning and a critical threshold.
///
/// Values exactly on a threshold fall into the worse category.
pub fn classify(value: f64, warn: f64, crit: f64, polarity: Polarity) -> Severity {
    match polarity {
        Polarity::HigherIsWorse => {
            if value >= crit {
                Severity::Critical
            } else if value >= warn {
                Severity::Warning
            } else {
                Severity::Healthy
            }
        }
        Polarity::LowerIsWorse => {
            if value <= crit {
                Severity::Critical
            } else if value <= warn {
                Severity::Warning
            } else {
                Severity::Healthy
            }
        }
    }
}

/// Warning/critical thresholds for a single metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warn: f64,
    pub crit: f64,
    pub polarity: Polarity,
}

impl Thresholds {
    pub const fn higher_is_worse(warn: f64, crit: f64) -> Self {
        Thresholds {
            warn,
            crit,
            polarity: Polarity::HigherIsWorse,
        }
    }

    pub const fn lower_is_worse(warn: f64, crit: f64) -> Self {
        Thresholds {
            warn,
            crit,
            polarity: Polarity::LowerIsWorse,
        }
    }

    pub fn classify(&self, value: f64) -> Severity {
        classify(value, self.warn, self.crit, self.polarity)
    }

    /// Warning must sit on the healthy side of critical.
    pub fn is_ordered(&self) -> bool {
        if !(self.warn.is_finite() && self.crit.is_finite()) {
            return false;
        }
        match self.polarity {
            Polarity::HigherIsWorse => self.warn <= self.crit,
            Polarity::LowerIsWorse => self.warn >= self.crit,
        }
    }
}

/// Thresholds for every metric the monitor classifies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricThresholds {
    /// Smoothed retry ratio (0.0–1.0).
    pub retry: Thresholds,
    /// Windowed failure ratio (0.0–1.0).
    pub failure: Thresholds,
    /// Last ACK signal in dBm.
    pub ack_signal: Thresholds,
    /// Average signal in dBm.
    pub signal_avg: Thresholds,
    /// Firmware peer RSSI.
    pub peer_rssi: Thresholds,
}

impl Default for MetricThresholds {
    fn default() -> Self {
        MetricThresholds {
            retry: Thresholds::higher_is_worse(0.20, 0.50),
            failure: Thresholds::higher_is_worse(0.02, 0.05),
            ack_signal: Thresholds::lower_is_worse(-60.0, -80.0),
            signal_avg: Thresholds::lower_is_worse(-60.0, -80.0),
            peer_rssi: Thresholds::lower_is_worse(60.0, 40.0),
        }
    }
}

/// Per-tick severities for all classified metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAssessment {
    pub retry: Severity,
    pub failure: Severity,
    pub ack_signal: Severity,
    pub signal_avg: Severity,
    pub peer_rssi: Severity,
}

impl LinkAssessment {
    pub fn worst(&self) -> Severity {
        [
            self.retry,
            self.failure,
            self.ack_signal,
            self.signal_avg,
            self.peer_rssi,
        ]
        .into_iter()
        .max()
        .unwrap_or(Severity::Healthy)
    }

    /// Fast mode: the transmit-side ratios are at warning or worse.
    pub fn is_fast(&self) -> bool {
        self.retry.is_degraded() || self.failure.is_degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_is_worse_bands() {
        let t = Thresholds::higher_is_worse(0.20, 0.50);
        assert_eq!(t.classify(0.10), Severity::Healthy);
        assert_eq!(t.classify(0.30), Severity::Warning);
        assert_eq!(t.classify(0.60), Severity::Critical);
    }

    #[test]
    fn boundaries_count_as_worse() {
        assert_eq!(
            classify(0.20, 0.20, 0.50, Polarity::HigherIsWorse),
            Severity::Warning
        );
        assert_eq!(
            classify(0.50, 0.20, 0.50, Polarity::HigherIsWorse),
            Severity::Critical
        );
        assert_eq!(
            classify(-60.0, -60.0, -80.0, Polarity::LowerIsWorse),
            Severity::Warning
        );
        assert_eq!(
            classify(-80.0, -60.0, -80.0, Polarity::LowerIsWorse),
            Severity::Critical
        );
    }

    #[test]
    fn lower_is_worse_bands() {
        let t = Thresholds::lower_is_worse(-60.0, -80.0);
        assert_eq!(t.classify(-45.0), Severity::Healthy);
        assert_eq!(t.classify(-70.0), Severity::Warning);
        assert_eq!(t.classify(-90.0), Severity::Critical);
    }

    #[test]
    fn ordering_check_respects_polarity() {
        assert!(Thresholds::higher_is_worse(0.2, 0.5).is_ordered());
        assert!(!Thresholds::higher_is_worse(0.5, 0.2).is_ordered());
        assert!(Thresholds::lower_is_worse(60.0, 40.0).is_ordered());
        assert!(!Thresholds::lower_is_worse(40.0, 60.0).is_ordered());
        assert!(!Thresholds::lower_is_worse(f64::NAN, 40.0).is_ordered());
    }

    #[test]
    fn default_thresholds_are_ordered() {
        let t = MetricThresholds::default();
        for th in [t.retry, t.failure, t.ack_signal, t.signal_avg, t.peer_rssi] {
            assert!(th.is_ordered(), "{th:?}");
        }
    }

    #[test]
    fn assessment_worst_and_fast() {
        let a = LinkAssessment {
            retry: Severity::Healthy,
            failure: Severity::Healthy,
            ack_signal: Severity::Critical,
            signal_avg: Severity::Warning,
            peer_rssi: Severity::Healthy,
        };
        assert_eq!(a.worst(), Severity::Critical);
        assert!(!a.is_fast());

        let b = LinkAssessment {
            failure: Severity::Warning,
            ..a
        };
        assert!(b.is_fast());
    }
}
