//! Raw sample source seam.
//!
//! Everything OS-specific (running `iw`, reading debugfs, parsing text)
//! lives behind [`SampleSource`]. The monitor only sees structured samples
//! or a [`SourceError`].

use std::future::Future;

use thiserror::Error;

use crate::sample::RawSample;

/// Why a read produced no sample. Every variant is recoverable.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("read timed out")]
    Timeout,
    #[error("station not associated")]
    Disassociated,
    #[error("unparseable source output: {0}")]
    Parse(String),
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Provider of raw link samples.
pub trait SampleSource: Send {
    /// Read the current counters and signal readings.
    fn read(&mut self) -> impl Future<Output = Result<RawSample, SourceError>> + Send;

    /// Whether the expected peer/session is still present.
    fn is_associated(&mut self) -> impl Future<Output = bool> + Send;

    /// Human-readable identity for logs (interface, peer).
    fn describe(&self) -> String;
}
