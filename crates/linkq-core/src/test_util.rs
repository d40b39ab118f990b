//! In-memory source and sink for exercising [`crate::monitor::LinkMonitor`]
//! without radios or sockets.

use std::collections::VecDeque;
use std::time::Duration;

use crate::sample::RawSample;
use crate::source::{SampleSource, SourceError};
use crate::telemetry::{SendStats, TelemetrySink};

/// Replays a fixed script of read results, then reports unavailable forever.
#[derive(Debug)]
pub struct ScriptedSource {
    script: VecDeque<Result<RawSample, SourceError>>,
    associated: bool,
    read_delay: Option<Duration>,
    panic_at: Option<usize>,
    reads: usize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<RawSample, SourceError>>) -> Self {
        ScriptedSource {
            script: script.into(),
            associated: true,
            read_delay: None,
            panic_at: None,
            reads: 0,
        }
    }

    pub fn set_associated(&mut self, associated: bool) {
        self.associated = associated;
    }

    /// Make every read wait on the tokio clock first.
    pub fn set_read_delay(&mut self, delay: Duration) {
        self.read_delay = Some(delay);
    }

    /// Panic on the `read`-th call (1-based) instead of serving the script.
    pub fn panic_on_read(&mut self, read: usize) {
        self.panic_at = Some(read);
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl SampleSource for ScriptedSource {
    async fn read(&mut self) -> Result<RawSample, SourceError> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.reads += 1;
        if self.panic_at == Some(self.reads) {
            panic!("scripted read {} failed", self.reads);
        }
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Unavailable("script exhausted".into())))
    }

    async fn is_associated(&mut self) -> bool {
        self.associated
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Keeps every wire string it is handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Vec<String>,
    stats: SendStats,
    fail: bool,
}

impl RecordingSink {
    /// Simulate a transport that drops everything.
    pub fn failing() -> Self {
        RecordingSink {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl TelemetrySink for RecordingSink {
    fn send(&mut self, wire: &str) {
        if self.fail {
            self.stats.failed += 1;
            return;
        }
        self.sent.push(wire.to_string());
        self.stats.sent += 1;
    }

    fn stats(&self) -> SendStats {
        self.stats
    }
}
