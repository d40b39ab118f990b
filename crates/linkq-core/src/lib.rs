//! Wireless link health pipeline.
//!
//! Polls cumulative link counters, turns them into a smoothed retry ratio
//! and a bounded health score, classifies every metric against configured
//! thresholds and hands one telemetry value per tick to a best-effort sink.
//! [`monitor::LinkMonitor`] wraps the pipeline in a seek / poll / recover
//! state machine that survives the data source vanishing indefinitely.

pub mod classify;
pub mod config;
pub mod monitor;
pub mod report;
pub mod sample;
pub mod score;
pub mod smoother;
pub mod source;
pub mod telemetry;
pub mod window;

pub mod test_util;

pub use classify::{LinkAssessment, MetricThresholds, Polarity, Severity, Thresholds, classify};
pub use config::{LinkConfig, LinkqConfig, MonitorConfig, SendMode, SourceKind};
pub use monitor::{LinkMonitor, LinkState, PollerState, StepOutcome, StepReport};
pub use sample::{LinkCounters, RawSample, SignalReadings};
pub use score::ScoreEngine;
pub use smoother::Smoother;
pub use source::{SampleSource, SourceError};
pub use telemetry::{Payload, PayloadFormat, SendStats, TelemetrySink};
pub use window::{WindowAggregator, WindowSnapshot};
