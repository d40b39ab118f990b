//! Synthetic link for running the agent without an ath10k radio.
//!
//! Counters grow at ~100 frames per poll with a retry rate that drifts
//! between clean and congested, and the link occasionally drops out for a
//! few polls so the recovery path gets exercised too.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use linkq_core::{LinkCounters, RawSample, SampleSource, SignalReadings, SourceError};

pub struct SimulatedSource {
    rng: StdRng,
    counters: LinkCounters,
    retry_rate: f64,
    signal_dbm: f64,
    outage_left: u32,
}

impl SimulatedSource {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        SimulatedSource {
            rng,
            counters: LinkCounters::default(),
            retry_rate: 0.05,
            signal_dbm: -55.0,
            outage_left: 0,
        }
    }

    fn advance(&mut self) -> RawSample {
        let rng = &mut self.rng;
        self.retry_rate = (self.retry_rate + rng.random_range(-0.03..0.03)).clamp(0.0, 0.8);
        self.signal_dbm = (self.signal_dbm + rng.random_range(-1.5..1.5)).clamp(-90.0, -35.0);

        let queued: u64 = rng.random_range(80..120);
        let retries = (queued as f64 * self.retry_rate).round() as u64;
        let failed = if rng.random_bool(self.retry_rate / 4.0) { 1 } else { 0 };

        let c = &mut self.counters;
        c.mpdu_queued += queued;
        c.tx_retries += retries;
        c.tx_failed += failed;
        c.mpdu_fail_retry += failed;
        c.mpdu_success_retry += retries / 2;
        c.mpdu_success_multitry += retries / 4;
        c.mpdu_sw_requeued += rng.random_range(0..2);
        c.ppdu_noack += retries / 3;
        c.pdev_requeued += rng.random_range(0..2);
        c.pdev_excessive_retries += failed;
        c.pdev_no_ack += retries / 3;

        RawSample::new(
            self.counters,
            SignalReadings {
                ack_signal_dbm: Some(self.signal_dbm + 2.0),
                signal_avg_dbm: Some(self.signal_dbm),
                peer_rssi: Some((self.signal_dbm + 110.0).max(0.0)),
                // -90 dBm → 0 %, -20 dBm → 100 %
                link_quality_pct: Some(
                    ((self.signal_dbm + 90.0) / 0.7).round().clamp(0.0, 100.0) as u32,
                ),
            },
        )
    }
}

impl SampleSource for SimulatedSource {
    async fn read(&mut self) -> Result<RawSample, SourceError> {
        if self.outage_left > 0 {
            self.outage_left -= 1;
            return Err(SourceError::Unavailable("simulated outage".into()));
        }
        if self.rng.random_bool(0.002) {
            self.outage_left = self.rng.random_range(3..15);
            // Re-association resets the firmware counters.
            self.counters = LinkCounters::default();
            return Err(SourceError::Unavailable("simulated outage".into()));
        }
        Ok(self.advance())
    }

    async fn is_associated(&mut self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }
}
