//! Aegis Compaction Downsampler
//!
//! Batch compaction of an ordered slice of samples into one sample per
//! bucket. Walks the input forwards, or backwards with a reverse-mode
//! aggregator, and drives the time-weighted average's bucket hooks the same
//! way the streaming rule does. Optionally reports buckets that received no
//! samples between the first and the last populated bucket.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::aggregation::Aggregator;
use crate::registry::AggregationType;
use crate::rule::bucket_start;
use aegis_common::config::RuleConfig;
use aegis_common::{AegisError, Result, Sample, Timestamp};

// =============================================================================
// Downsampler
// =============================================================================

/// Downsamples time series data to a lower resolution.
#[derive(Debug, Clone)]
pub struct Downsampler {
    aggregation: AggregationType,
    duration: i64,
    alignment: Timestamp,
    reverse: bool,
    empty_buckets: bool,
}

impl Downsampler {
    pub fn new(aggregation: AggregationType, duration: i64) -> Self {
        Self {
            aggregation,
            duration,
            alignment: 0,
            reverse: false,
            empty_buckets: false,
        }
    }

    pub fn with_alignment(mut self, alignment: Timestamp) -> Self {
        self.alignment = alignment;
        self
    }

    /// Walk the input from the newest sample to the oldest.
    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Emit buckets without samples using the aggregation's empty value.
    pub fn with_empty_buckets(mut self, empty_buckets: bool) -> Self {
        self.empty_buckets = empty_buckets;
        self
    }

    /// Apply rule-level settings from the configuration.
    pub fn with_config(self, config: &RuleConfig) -> Self {
        self.with_empty_buckets(config.report_empty_buckets)
    }

    /// Downsample samples given in ascending timestamp order. Output is in
    /// iteration order, so descending when reversed.
    pub fn downsample(&self, samples: &[Sample]) -> Result<Vec<Sample>> {
        if self.duration <= 0 {
            return Err(AegisError::InvalidRule(format!(
                "bucket duration must be positive, got {}",
                self.duration
            )));
        }
        if let Some(pair) = samples.windows(2).find(|w| w[1].timestamp < w[0].timestamp) {
            return Err(AegisError::OutOfOrder {
                timestamp: pair[1].timestamp,
                last: pair[0].timestamp,
            });
        }

        let ordered: Vec<Sample> = if self.reverse {
            samples.iter().rev().copied().collect()
        } else {
            samples.to_vec()
        };

        let mut result = Vec::new();
        let mut aggregator = Aggregator::new(self.aggregation, self.reverse);
        let mut current_bucket: Option<Timestamp> = None;
        let mut prev: Option<Sample> = None;

        for sample in ordered {
            let bucket = bucket_start(sample.timestamp, self.duration, self.alignment);

            match current_bucket {
                Some(open) if open == bucket => {}
                Some(open) => {
                    aggregator.add_next_bucket_first_sample(sample.value, sample.timestamp);
                    result.push(Sample::new(open, aggregator.finalize_or_empty()));
                    aggregator.reset();

                    if self.empty_buckets {
                        let mut gap = self.step(open);
                        while let Some(start) = gap.filter(|&g| self.precedes(g, bucket)) {
                            self.open_bucket(&mut aggregator, start, prev);
                            aggregator.add_next_bucket_first_sample(sample.value, sample.timestamp);
                            result.push(Sample::new(start, aggregator.finalize_or_empty()));
                            aggregator.reset();
                            gap = self.step(start);
                        }
                    }

                    self.open_bucket(&mut aggregator, bucket, prev);
                    current_bucket = Some(bucket);
                }
                None => {
                    self.open_bucket(&mut aggregator, bucket, prev);
                    current_bucket = Some(bucket);
                }
            }

            aggregator.append(sample.value, sample.timestamp);
            prev = Some(sample);
        }

        if let Some(open) = current_bucket {
            result.push(Sample::new(open, aggregator.finalize_or_empty()));
        }

        Ok(result)
    }

    /// Next bucket start in iteration order, `None` past the timestamp range.
    fn step(&self, bucket: Timestamp) -> Option<Timestamp> {
        if self.reverse {
            bucket.checked_sub(self.duration)
        } else {
            bucket.checked_add(self.duration)
        }
    }

    /// `gap` comes strictly before `bucket` in iteration order.
    fn precedes(&self, gap: Timestamp, bucket: Timestamp) -> bool {
        if self.reverse {
            gap > bucket
        } else {
            gap < bucket
        }
    }

    fn open_bucket(&self, aggregator: &mut Aggregator, bucket: Timestamp, prev: Option<Sample>) {
        if let Some(prev) = prev {
            aggregator.add_prev_bucket_last_sample(prev.value, prev.timestamp);
        }
        aggregator.add_bucket_params(bucket, bucket.saturating_add(self.duration));
    }
}

// =============================================================================
// Tests
// =============================================================================
