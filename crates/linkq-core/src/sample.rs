//! # Raw Link Samples
//!
//! One poll's worth of link data: cumulative counters that only grow while
//! the station stays associated, plus point-in-time signal readings.

/// Number of monotonic counters carried by a [`LinkCounters`].
pub const COUNTER_COUNT: usize = 11;

/// Display labels for each counter, in [`LinkCounters::as_array`] order.
pub const COUNTER_LABELS: [&str; COUNTER_COUNT] = [
    "STA-R", "STA-F", "Q", "SW-RQ", "1-RT", ">1-RT", "FAIL", "NA", "FW-RQ", "FW-EX", "FW-NA",
];

/// Cumulative link counters since association.
///
/// Station counters come from the kernel's station table; the `mpdu_*` and
/// `ppdu_*` counters from the per-vdev firmware stats and the `pdev_*`
/// counters from the per-radio firmware stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkCounters {
    /// Station `tx retries`.
    pub tx_retries: u64,
    /// Station `tx failed`.
    pub tx_failed: u64,
    /// MPDUs queued for transmission.
    pub mpdu_queued: u64,
    /// MPDUs requeued by the software queue.
    pub mpdu_sw_requeued: u64,
    /// MPDUs delivered after exactly one retry.
    pub mpdu_success_retry: u64,
    /// MPDUs delivered after more than one retry.
    pub mpdu_success_multitry: u64,
    /// MPDUs dropped after exhausting retries.
    pub mpdu_fail_retry: u64,
    /// PPDUs that never got an ACK.
    pub ppdu_noack: u64,
    /// Radio-wide requeued MPDUs.
    pub pdev_requeued: u64,
    /// Radio-wide excessive retries.
    pub pdev_excessive_retries: u64,
    /// Radio-wide MPDUs without ACK.
    pub pdev_no_ack: u64,
}

impl LinkCounters {
    pub fn as_array(&self) -> [u64; COUNTER_COUNT] {
        [
            self.tx_retries,
            self.tx_failed,
            self.mpdu_queued,
            self.mpdu_sw_requeued,
            self.mpdu_success_retry,
            self.mpdu_success_multitry,
            self.mpdu_fail_retry,
            self.ppdu_noack,
            self.pdev_requeued,
            self.pdev_excessive_retries,
            self.pdev_no_ack,
        ]
    }

    pub fn from_array(v: [u64; COUNTER_COUNT]) -> Self {
        LinkCounters {
            tx_retries: v[0],
            tx_failed: v[1],
            mpdu_queued: v[2],
            mpdu_sw_requeued: v[3],
            mpdu_success_retry: v[4],
            mpdu_success_multitry: v[5],
            mpdu_fail_retry: v[6],
            ppdu_noack: v[7],
            pdev_requeued: v[8],
            pdev_excessive_retries: v[9],
            pdev_no_ack: v[10],
        }
    }

    /// True if any counter in `self` is lower than in `earlier`, i.e. the
    /// session was reset between the two snapshots.
    pub fn rolled_back_from(&self, earlier: &LinkCounters) -> bool {
        self.as_array()
            .iter()
            .zip(earlier.as_array().iter())
            .any(|(now, then)| now < then)
    }

    /// Field-wise `self - earlier`. Callers must have ruled out rollback.
    pub fn delta_since(&self, earlier: &LinkCounters) -> LinkCounters {
        let now = self.as_array();
        let then = earlier.as_array();
        let mut out = [0u64; COUNTER_COUNT];
        for i in 0..COUNTER_COUNT {
            out[i] = now[i].saturating_sub(then[i]);
        }
        LinkCounters::from_array(out)
    }
}

/// Instantaneous signal readings. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalReadings {
    /// `last ack signal` in dBm.
    pub ack_signal_dbm: Option<f64>,
    /// `signal avg` in dBm.
    pub signal_avg_dbm: Option<f64>,
    /// Firmware-reported peer RSSI (dimensionless, higher is better).
    pub peer_rssi: Option<f64>,
    /// Driver link quality remapped to 0..=100.
    pub link_quality_pct: Option<u32>,
}

/// One raw sample read from a [`crate::source::SampleSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    pub counters: LinkCounters,
    pub signal: SignalReadings,
}

impl RawSample {
    pub fn new(counters: LinkCounters, signal: SignalReadings) -> Self {
        RawSample { counters, signal }
    }
}
