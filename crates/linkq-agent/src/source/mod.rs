//! Concrete sample sources for the agent.

pub mod ath10k;
pub mod detect;
pub mod iwinfo;
pub mod simulated;

use linkq_core::{RawSample, SampleSource, SourceError};

pub use ath10k::Ath10kSource;
pub use iwinfo::IwinfoSource;
pub use simulated::SimulatedSource;

/// Source selected at startup.
pub enum AgentSource {
    Ath10k(Ath10kSource),
    Iwinfo(IwinfoSource),
    Simulated(SimulatedSource),
}

impl SampleSource for AgentSource {
    async fn read(&mut self) -> Result<RawSample, SourceError> {
        match self {
            AgentSource::Ath10k(s) => s.read().await,
            AgentSource::Iwinfo(s) => s.read().await,
            AgentSource::Simulated(s) => s.read().await,
        }
    }

    async fn is_associated(&mut self) -> bool {
        match self {
            AgentSource::Ath10k(s) => s.is_associated().await,
            AgentSource::Iwinfo(s) => s.is_associated().await,
            AgentSource::Simulated(s) => s.is_associated().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            AgentSource::Ath10k(s) => s.describe(),
            AgentSource::Iwinfo(s) => s.describe(),
            AgentSource::Simulated(s) => s.describe(),
        }
    }
}
