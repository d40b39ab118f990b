//! Driver link-quality source via `iwinfo <iface> info`.
//!
//! Works on any radio libiwinfo understands. The `Link Quality: x/y` field is
//! remapped linearly onto 0..=100 between a configurable floor and ceiling;
//! without a ceiling the driver's own denominator is used. No retry counters
//! are available here, so samples carry zero counters and the quality and
//! signal readings only.

use std::net::IpAddr;

use linkq_core::{LinkCounters, RawSample, SampleSource, SignalReadings, SourceError};

use super::detect::{self, IfaceResolver};

/// Ceiling used when neither the caller nor the driver provides one.
pub const DEFAULT_MAX_QUALITY: u32 = 70;

/// Parse `Link Quality: raw/denom` and remap `raw` so that `qmin` → 0 % and
/// `qmax` → 100 %, clamped. `qmax = None` falls back to `denom`, then to
/// [`DEFAULT_MAX_QUALITY`]. Returns `None` when the field is missing or
/// reads `unknown`.
pub fn parse_quality(output: &str, qmin: u32, qmax: Option<u32>) -> Option<u32> {
    let field = output.split_once("Link Quality:")?.1.lines().next()?.trim_start();
    let (raw, rest) = field.split_once('/')?;
    let raw: i64 = raw.trim_end().parse().ok()?;
    let denom: i64 = rest
        .split(|c: char| !c.is_ascii_digit())
        .next()?
        .parse()
        .ok()?;

    let qmin = i64::from(qmin);
    let qmax = match qmax {
        Some(max) => i64::from(max),
        None if denom != 0 => denom,
        None => i64::from(DEFAULT_MAX_QUALITY),
    };
    let span = (qmax - qmin).max(1);
    let pct = ((raw - qmin) as f64 * 100.0 / span as f64).round();
    Some(pct.clamp(0.0, 100.0) as u32)
}

/// `Signal: -55 dBm`, or `None` for `unknown`.
pub fn parse_signal(output: &str) -> Option<f64> {
    let rest = output.split_once("Signal:")?.1;
    rest.split_whitespace().next()?.parse().ok()
}

/// Live source reading `iwinfo <iface> info`.
#[derive(Debug, Clone)]
pub struct IwinfoSource {
    iface: IfaceResolver,
    min_quality: u32,
    max_quality: Option<u32>,
}

impl IwinfoSource {
    pub fn new(
        forced_iface: Option<String>,
        target_ip: Option<IpAddr>,
        min_quality: u32,
        max_quality: Option<u32>,
    ) -> Self {
        IwinfoSource {
            iface: IfaceResolver::new(forced_iface, target_ip),
            min_quality,
            max_quality,
        }
    }
}

impl SampleSource for IwinfoSource {
    async fn read(&mut self) -> Result<RawSample, SourceError> {
        let iface = self
            .iface
            .current()
            .ok_or_else(|| SourceError::Unavailable("no interface".into()))?
            .to_string();

        let out = detect::run(&["iwinfo", &iface, "info"])
            .await
            .ok_or_else(|| SourceError::Unavailable(format!("iwinfo on {iface}")))?;
        let quality = parse_quality(&out, self.min_quality, self.max_quality)
            .ok_or_else(|| SourceError::Unavailable(format!("no link quality on {iface}")))?;

        Ok(RawSample::new(
            LinkCounters::default(),
            SignalReadings {
                signal_avg_dbm: parse_signal(&out),
                link_quality_pct: Some(quality),
                ..Default::default()
            },
        ))
    }

    async fn is_associated(&mut self) -> bool {
        self.iface.is_associated().await
    }

    fn describe(&self) -> String {
        match self.iface.describe() {
            Some(iface) => format!("iwinfo:{iface}"),
            None => "iwinfo".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"phy1-sta0 ESSID: "aalink"
          Access Point: 98:03:CF:CF:A4:28
          Mode: Client  Channel: 149 (5.745 GHz)  HT Mode: VHT80
          Tx-Power: 20 dBm  Link Quality: 55/70
          Signal: -55 dBm  Noise: -95 dBm
          Bit Rate: 866.7 MBit/s
          Encryption: WPA2 PSK (CCMP)
"#;

    #[test]
    fn quality_uses_driver_denominator_by_default() {
        // 55 / 70 = 78.6 %
        assert_eq!(parse_quality(INFO, 0, None), Some(79));
        let info = INFO.replace("55/70", "50/100");
        assert_eq!(parse_quality(&info, 0, None), Some(50));
    }

    #[test]
    fn quality_remaps_between_floor_and_ceiling() {
        // (55 - 20) / (60 - 20) = 87.5 %
        assert_eq!(parse_quality(INFO, 20, Some(60)), Some(88));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(parse_quality(INFO, 0, Some(40)), Some(100));
        assert_eq!(parse_quality(INFO, 60, Some(70)), Some(0));
    }

    #[test]
    fn degenerate_range_does_not_divide_by_zero() {
        assert_eq!(parse_quality(INFO, 55, Some(55)), Some(0));
        assert_eq!(parse_quality(INFO, 54, Some(54)), Some(100));
    }

    #[test]
    fn zero_denominator_falls_back_to_default_ceiling() {
        let info = INFO.replace("55/70", "35/0");
        assert_eq!(parse_quality(&info, 0, None), Some(50));
    }

    #[test]
    fn unknown_quality_is_none() {
        let info = INFO.replace("55/70", "unknown");
        assert_eq!(parse_quality(&info, 0, None), None);
        assert_eq!(parse_quality("wlan0 ESSID: unknown", 0, None), None);
        // the bit-rate line's slash must not be mistaken for the quality field
        assert_eq!(parse_quality("Link Quality: n\nBit Rate: 1/2", 0, None), None);
    }

    #[test]
    fn parses_signal() {
        assert_eq!(parse_signal(INFO), Some(-55.0));
        assert_eq!(parse_signal("Signal: unknown  Noise: unknown"), None);
    }

    #[tokio::test]
    async fn unresolved_interface_is_unavailable() {
        let mut src = IwinfoSource::new(None, None, 0, None);
        assert!(!src.is_associated().await);
        assert!(matches!(src.read().await, Err(SourceError::Unavailable(_))));
        assert_eq!(src.describe(), "iwinfo");
    }
}
