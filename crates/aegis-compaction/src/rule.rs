//! Aegis Compaction Rules
//!
//! Streaming driver that feeds raw samples into one aggregator and emits a
//! compacted sample every time a bucket closes. Buckets are half-open
//! `[start, start + duration)` intervals aligned to an arbitrary timestamp.
//! The time-weighted average gets its bucket edges and neighbouring samples
//! from the rule; every other aggregation only sees the values.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::aggregation::Aggregator;
use crate::codec::{Persist, StateReader, StateWriter};
use crate::registry::AggregationType;
use aegis_common::{AegisError, EncodingVersion, Result, Sample, Timestamp};

/// Start of the bucket containing `ts`.
pub fn bucket_start(ts: Timestamp, duration: i64, alignment: Timestamp) -> Timestamp {
    let offset = ts.wrapping_sub(alignment).rem_euclid(duration);
    ts.saturating_sub(offset)
}

// =============================================================================
// Compaction Rule
// =============================================================================

/// Compaction of one source series into fixed-width buckets.
#[derive(Debug, Clone)]
pub struct CompactionRule {
    aggregator: Aggregator,
    duration: i64,
    alignment: Timestamp,
    /// Start of the open bucket.
    open_bucket: Option<Timestamp>,
    last_sample: Option<Sample>,
}

impl CompactionRule {
    pub fn new(aggregation: AggregationType, duration: i64, alignment: Timestamp) -> Result<Self> {
        if duration <= 0 {
            return Err(AegisError::InvalidRule(format!(
                "bucket duration must be positive, got {}",
                duration
            )));
        }
        Ok(Self {
            aggregator: Aggregator::new(aggregation, false),
            duration,
            alignment,
            open_bucket: None,
            last_sample: None,
        })
    }

    pub fn aggregation(&self) -> AggregationType {
        self.aggregator.aggregation_type()
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn alignment(&self) -> Timestamp {
        self.alignment
    }

    /// Start of the bucket currently accumulating, if any.
    pub fn current_bucket(&self) -> Option<Timestamp> {
        self.open_bucket
    }

    pub fn last_sample(&self) -> Option<Sample> {
        self.last_sample
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Feed one sample. Timestamps must not decrease. Returns the bucket
    /// that this sample closed, stamped with the bucket start.
    pub fn push(&mut self, sample: Sample) -> Result<Option<Sample>> {
        if let Some(last) = self.last_sample {
            if sample.timestamp < last.timestamp {
                return Err(AegisError::OutOfOrder {
                    timestamp: sample.timestamp,
                    last: last.timestamp,
                });
            }
        }

        let start = bucket_start(sample.timestamp, self.duration, self.alignment);
        let closed = match self.open_bucket {
            Some(open) if open == start => None,
            Some(open) => {
                self.aggregator
                    .add_next_bucket_first_sample(sample.value, sample.timestamp);
                let value = self.aggregator.finalize_or_empty();
                self.aggregator.reset();
                tracing::trace!(
                    "Rule {} closed bucket {} with {} (next bucket {})",
                    self.aggregation(),
                    open,
                    value,
                    start
                );
                self.open(start);
                Some(Sample::new(open, value))
            }
            None => {
                self.open(start);
                None
            }
        };

        self.aggregator.append(sample.value, sample.timestamp);
        self.last_sample = Some(sample);
        Ok(closed)
    }

    /// Current result of the open bucket without closing it. The bucket
    /// keeps accumulating; it is emitted once, by the push that closes it.
    pub fn flush(&self) -> Option<Sample> {
        self.open_bucket
            .map(|open| Sample::new(open, self.aggregator.finalize_or_empty()))
    }

    fn open(&mut self, start: Timestamp) {
        if let Some(prev) = self.last_sample {
            self.aggregator
                .add_prev_bucket_last_sample(prev.value, prev.timestamp);
        }
        self.aggregator
            .add_bucket_params(start, start.saturating_add(self.duration));
        self.open_bucket = Some(start);
    }
}

// =============================================================================
// Persistence
// =============================================================================

impl Persist for CompactionRule {
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        writer.write_string_buffer(self.aggregation().as_str().as_bytes());
        writer.write_i64(self.duration);
        writer.write_i64(self.alignment);

        writer.write_bool(self.open_bucket.is_some());
        writer.write_i64(self.open_bucket.unwrap_or_default());

        writer.write_bool(self.last_sample.is_some());
        let last = self.last_sample.unwrap_or(Sample::new(0, 0.0));
        writer.write_i64(last.timestamp);
        writer.write_f64(last.value);

        self.aggregator.save(writer);
    }

    fn load<R: StateReader + ?Sized>(reader: &mut R, version: EncodingVersion) -> Result<Self> {
        let name = reader.read_string_buffer()?;
        let name = std::str::from_utf8(&name).map_err(|err| {
            AegisError::DeserializeFailed(format!("aggregation name is not utf-8: {}", err))
        })?;
        let aggregation: AggregationType = name.parse()?;

        let duration = reader.read_i64()?;
        if duration <= 0 {
            return Err(AegisError::DeserializeFailed(format!(
                "invalid bucket duration {}",
                duration
            )));
        }
        let alignment = reader.read_i64()?;

        let has_open = reader.read_bool()?;
        let open = reader.read_i64()?;

        let has_last = reader.read_bool()?;
        let last_ts = reader.read_i64()?;
        let last_value = reader.read_f64()?;

        let aggregator = Aggregator::load(aggregation, reader, version)?;

        Ok(Self {
            aggregator,
            duration,
            alignment,
            open_bucket: has_open.then_some(open),
            last_sample: has_last.then(|| Sample::new(last_ts, last_value)),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
