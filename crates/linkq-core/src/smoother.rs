//! # Retry Ratio Smoother
//!
//! Damps the per-poll retry ratio before it is scored and classified. A
//! single noisy poll moves the smoothed value by at most half its size once
//! three readings are held, and the history is dropped with the rest of the
//! poller state whenever the link is lost.

/// Short-horizon weighted average of an instantaneous ratio.
///
/// Keeps the last three inputs and weights the newest highest. The weights
/// degrade with the history length so the first reading after a reset is
/// reported as-is:
///
/// | history | weights (newest first) |
/// |---------|------------------------|
/// | 1       | 1.0                    |
/// | 2       | 0.6, 0.4               |
/// | 3       | 0.5, 0.25, 0.25        |
#[derive(Debug, Clone, Default)]
pub struct Smoother {
    // Oldest first.
    history: [f64; 3],
    len: usize,
}

const WEIGHTS_1: [f64; 1] = [1.0];
const WEIGHTS_2: [f64; 2] = [0.6, 0.4];
const WEIGHTS_3: [f64; 3] = [0.5, 0.25, 0.25];

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds an instantaneous ratio and returns the smoothed value.
    ///
    /// Non-finite inputs are recorded as 0.0.
    pub fn add(&mut self, ratio: f64) -> f64 {
        let ratio = if ratio.is_finite() { ratio } else { 0.0 };
        if self.len == self.history.len() {
            self.history.rotate_left(1);
            self.history[self.len - 1] = ratio;
        } else {
            self.history[self.len] = ratio;
            self.len += 1;
        }
        self.value()
    }

    /// Current smoothed value; 0.0 with no history.
    pub fn value(&self) -> f64 {
        let weights: &[f64] = match self.len {
            0 => return 0.0,
            1 => &WEIGHTS_1,
            2 => &WEIGHTS_2,
            _ => &WEIGHTS_3,
        };
        self.history[..self.len]
            .iter()
            .rev()
            .zip(weights)
            .map(|(v, w)| v * w)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.history = [0.0; 3];
    }
}
