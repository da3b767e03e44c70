//! Aegis Compaction Rolling Median
//!
//! Time-windowed median over a sample stream. Each new sample is inserted
//! into a [`MedianTracker`]; samples that fall out of the window are
//! deleted from it again, so the tracker always holds exactly the window.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::median::MedianTracker;
use aegis_common::config::MedianConfig;
use aegis_common::{Sample, Timestamp};
use std::collections::VecDeque;

// =============================================================================
// Rolling Median
// =============================================================================

/// Median of the samples within `window` of the newest one.
#[derive(Debug, Clone)]
pub struct RollingMedian {
    window: i64,
    tracker: MedianTracker,
    samples: VecDeque<Sample>,
}

impl RollingMedian {
    pub fn new(window: i64, capacity_hint: usize) -> Self {
        Self {
            window,
            tracker: MedianTracker::new(capacity_hint),
            samples: VecDeque::with_capacity(capacity_hint),
        }
    }

    pub fn from_config(window: i64, config: &MedianConfig) -> Self {
        Self::new(window, config.capacity_hint)
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    /// Samples currently inside the window.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn median(&self) -> f64 {
        self.tracker.median()
    }

    /// Add a sample and return the median of the window ending at it.
    /// Samples are expected in ascending timestamp order; the window keeps
    /// every sample with `timestamp >= sample.timestamp - window`.
    pub fn push(&mut self, sample: Sample) -> f64 {
        self.tracker.insert(sample.value);
        self.samples.push_back(sample);

        let window_start: Timestamp = sample.timestamp.saturating_sub(self.window);
        while let Some(oldest) = self.samples.front().copied() {
            if oldest.timestamp >= window_start {
                break;
            }
            self.samples.pop_front();
            self.tracker.delete(oldest.value);
        }

        self.tracker.median()
    }

    /// Rolling median for every sample of an ordered slice.
    pub fn apply(&mut self, samples: &[Sample]) -> Vec<Sample> {
        samples
            .iter()
            .map(|&s| Sample::new(s.timestamp, self.push(s)))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
