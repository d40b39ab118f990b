//! # Sliding Counter Window
//!
//! Fixed-capacity ring buffer of counter snapshots. Once full, every push
//! yields the multi-poll delta between the newest and oldest entries.
//!
//! Counters are cumulative, so a push that is lower than a retained entry
//! means the station re-associated and the firmware reset its stats. That
//! is reported as [`WindowSnapshot::Rollback`] and the sample is not stored;
//! the caller is expected to drop all derived state.

use std::collections::VecDeque;

use crate::sample::LinkCounters;

/// Result of pushing one sample into a [`WindowAggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSnapshot {
    /// Window not yet full; deltas are placeholders.
    NotReady,
    /// Window full; newest − oldest for every counter.
    Ready(LinkCounters),
    /// A counter went backwards. Nothing was stored.
    Rollback,
}

impl WindowSnapshot {
    pub fn is_ready(&self) -> bool {
        matches!(self, WindowSnapshot::Ready(_))
    }

    /// Window deltas, or all-zero placeholders when not ready.
    pub fn deltas(&self) -> LinkCounters {
        match self {
            WindowSnapshot::Ready(d) => *d,
            _ => LinkCounters::default(),
        }
    }
}

/// Ring buffer of the last `capacity` counter snapshots.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    entries: VecDeque<LinkCounters>,
    capacity: usize,
}

impl WindowAggregator {
    /// Creates an empty window. A capacity below 2 is raised to 2, since a
    /// delta needs two endpoints.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        WindowAggregator {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, counters: LinkCounters) -> WindowSnapshot {
        if self.entries.iter().any(|e| counters.rolled_back_from(e)) {
            return WindowSnapshot::Rollback;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(counters);

        if !self.is_full() {
            return WindowSnapshot::NotReady;
        }
        match (self.entries.front(), self.entries.back()) {
            (Some(oldest), Some(newest)) => WindowSnapshot::Ready(newest.delta_since(oldest)),
            _ => WindowSnapshot::NotReady,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
