//! # Health Score
//!
//! Converts the smoothed retry ratio into a single bounded number for the
//! collector:
//!
//! $$\text{score} = (\text{clamp} - \min(100 \cdot r, \text{clamp})) \cdot \text{scale}$$
//!
//! With the defaults (clamp 50 %, scale 1.6) a clean link scores 80 and a
//! link retrying half its frames or more scores 0.

/// Affine retry-ratio → score mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEngine {
    /// Retry percentage at and above which the score bottoms out.
    pub clamp_pct: f64,
    /// Score points per percentage point below the clamp.
    pub scale: f64,
}

impl Default for ScoreEngine {
    fn default() -> Self {
        ScoreEngine {
            clamp_pct: 50.0,
            scale: 1.6,
        }
    }
}

impl ScoreEngine {
    pub fn new(clamp_pct: f64, scale: f64) -> Self {
        ScoreEngine { clamp_pct, scale }
    }

    /// Score for a ratio of 0.0.
    pub fn max_score(&self) -> f64 {
        self.clamp_pct * self.scale
    }

    /// Health score in `[0, max_score]` for a smoothed retry ratio (0.0–1.0).
    pub fn score(&self, smoothed_retry_ratio: f64) -> f64 {
        if smoothed_retry_ratio.is_nan() {
            return 0.0;
        }
        let pct = (smoothed_retry_ratio * 100.0).clamp(0.0, self.clamp_pct);
        ((self.clamp_pct - pct) * self.scale).clamp(0.0, self.max_score())
    }

    /// Integer score for the wire.
    pub fn score_u32(&self, smoothed_retry_ratio: f64) -> u32 {
        self.score(smoothed_retry_ratio).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ratio_is_max_score() {
        let s = ScoreEngine::default();
        assert!((s.score(0.0) - 80.0).abs() < 1e-9);
        assert_eq!(s.score_u32(0.0), 80);
    }

    #[test]
    fn clamp_point_and_beyond_is_zero() {
        let s = ScoreEngine::default();
        assert_eq!(s.score(0.5), 0.0);
        assert_eq!(s.score(0.9), 0.0);
        assert_eq!(s.score(3.0), 0.0);
    }

    #[test]
    fn midpoint() {
        let s = ScoreEngine::default();
        // 25 % retries → (50 - 25) * 1.6 = 40
        assert!((s.score(0.25) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic_non_increasing_and_bounded() {
        let s = ScoreEngine::default();
        let mut prev = f64::INFINITY;
        for i in 0..=200 {
            let r = i as f64 / 200.0;
            let v = s.score(r);
            assert!(v <= prev, "score rose at ratio {r}");
            assert!((0.0..=s.max_score()).contains(&v));
            prev = v;
        }
    }

    #[test]
    fn negative_and_nan_inputs_stay_in_range() {
        let s = ScoreEngine::default();
        assert!((s.score(-0.3) - 80.0).abs() < 1e-9);
        assert_eq!(s.score(f64::NAN), 0.0);
    }
}
