//! Telemetry payload and the best-effort sink seam.
//!
//! Payloads are plain ASCII, one unacknowledged datagram per send. The
//! monitor encodes them with its configured [`PayloadFormat`]; sinks only
//! ever see the finished wire string.

use std::str::FromStr;

use serde::Deserialize;

/// Wire layout of a telemetry datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// `"{peer_rssi},{score}"`.
    #[default]
    Pair,
    /// `"{score}"`.
    ScoreOnly,
    /// `"{link_quality_pct}"`.
    Quality,
}

impl FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pair" => Ok(PayloadFormat::Pair),
            "score_only" | "score" => Ok(PayloadFormat::ScoreOnly),
            "quality" => Ok(PayloadFormat::Quality),
            other => Err(format!(
                "unknown payload format {other:?} (expected pair, score-only or quality)"
            )),
        }
    }
}

/// One tick's telemetry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    pub score: u32,
    pub secondary: Option<i64>,
    pub quality: Option<u32>,
}

impl Payload {
    pub fn new(score: u32, secondary: Option<i64>) -> Self {
        Payload {
            score,
            secondary,
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: Option<u32>) -> Self {
        self.quality = quality;
        self
    }

    /// Encode for the wire in the given format. A missing secondary or
    /// quality value is sent as 0.
    pub fn encode(&self, format: PayloadFormat) -> String {
        match format {
            PayloadFormat::Pair => format!("{},{}", self.secondary.unwrap_or(0), self.score),
            PayloadFormat::ScoreOnly => self.score.to_string(),
            PayloadFormat::Quality => self.quality.unwrap_or(0).to_string(),
        }
    }
}

/// Counters exposing what the best-effort sender swallowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub sent: u64,
    pub failed: u64,
}

/// Fire-and-forget telemetry transmitter.
///
/// `send` must not block and must not surface transport errors; failures
/// only show up in [`SendStats::failed`].
pub trait TelemetrySink: Send {
    fn send(&mut self, wire: &str);

    fn stats(&self) -> SendStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_encoding() {
        let p = Payload::new(72, Some(58));
        assert_eq!(p.encode(PayloadFormat::Pair), "58,72");
    }

    #[test]
    fn pair_without_secondary_uses_zero() {
        let p = Payload::new(80, None);
        assert_eq!(p.encode(PayloadFormat::Pair), "0,80");
    }

    #[test]
    fn score_only_encoding() {
        let p = Payload::new(3, Some(61));
        assert_eq!(p.encode(PayloadFormat::ScoreOnly), "3");
    }

    #[test]
    fn quality_encoding_is_bare_percentage() {
        let p = Payload::new(40, Some(61)).with_quality(Some(79));
        assert_eq!(p.encode(PayloadFormat::Quality), "79");
        assert_eq!(Payload::new(40, None).encode(PayloadFormat::Quality), "0");
    }

    #[test]
    fn format_from_cli_string() {
        assert_eq!("score-only".parse(), Ok(PayloadFormat::ScoreOnly));
        assert_eq!("Quality".parse(), Ok(PayloadFormat::Quality));
        assert_eq!("pair".parse(), Ok(PayloadFormat::Pair));
        assert!("csv".parse::<PayloadFormat>().is_err());
    }
}
