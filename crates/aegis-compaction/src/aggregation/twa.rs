//! Aegis Compaction Time-Weighted Average
//!
//! Trapezoidal integration of the piecewise-linear signal, clipped to the
//! bucket. The first sample of a bucket (other than the very first bucket
//! of a series) is anchored to the bucket start by interpolating from the
//! previous bucket's last sample; the tail is closed by interpolating
//! towards the next bucket's first sample.
//!
//! In reverse mode samples arrive in descending timestamp order and the
//! bucket edges are swapped, so "start" is the later edge. Widths are
//! absolute time differences, which keeps every formula symmetric.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::codec::{Persist, StateReader, StateWriter};
use aegis_common::{EncodingVersion, Result, Sample, Timestamp};

// =============================================================================
// Geometry
// =============================================================================

/// Value at `t` on the line through `(t1, v1)` and `(t2, v2)`.
#[inline]
fn interpolate(t1: Timestamp, v1: f64, t2: Timestamp, v2: f64, t: Timestamp) -> f64 {
    if t1 == t2 {
        return v2;
    }
    let span = t2 as f64 - t1 as f64;
    v1 + (v2 - v1) * ((t as f64 - t1 as f64) / span)
}

/// Signed area of the trapezoid between two points.
#[inline]
fn trapezoid(v1: f64, t1: Timestamp, v2: f64, t2: Timestamp) -> f64 {
    (v1 + v2) / 2.0 * t1.abs_diff(t2) as f64
}

// =============================================================================
// Time-Weighted Average
// =============================================================================

/// Time-weighted average state for one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWeightedAverage {
    /// Accumulated area.
    pub res: f64,
    pub prev_ts: Timestamp,
    pub prev_value: f64,
    pub bucket_start: Timestamp,
    pub bucket_end: Timestamp,
    /// Time extent actually integrated.
    pub first_ts: Timestamp,
    pub last_ts: Timestamp,
    /// No previous bucket exists to anchor the leading edge.
    pub is_first_bucket: bool,
    /// Samples appended to this bucket.
    pub iteration: u64,
    pub reverse: bool,
}

impl TimeWeightedAverage {
    pub fn new(reverse: bool) -> Self {
        Self {
            res: 0.0,
            prev_ts: 0,
            prev_value: 0.0,
            bucket_start: 0,
            bucket_end: 0,
            first_ts: 0,
            last_ts: 0,
            is_first_bucket: true,
            iteration: 0,
            reverse,
        }
    }

    /// Back to the post-create shape, keeping the iteration direction.
    pub fn reset(&mut self) {
        *self = Self::new(self.reverse);
    }

    /// Set the bucket edges, given in ascending order.
    pub fn add_bucket_params(&mut self, bucket_start: Timestamp, bucket_end: Timestamp) {
        if self.reverse {
            self.bucket_start = bucket_end;
            self.bucket_end = bucket_start;
        } else {
            self.bucket_start = bucket_start;
            self.bucket_end = bucket_end;
        }
    }

    /// Seed the last sample of the preceding bucket.
    pub fn add_prev_bucket_last_sample(&mut self, value: f64, ts: Timestamp) {
        self.prev_value = value;
        self.prev_ts = ts;
        self.is_first_bucket = false;
    }

    pub fn append(&mut self, value: f64, ts: Timestamp) {
        if self.iteration == 0 {
            if self.is_first_bucket {
                self.first_ts = ts;
            } else {
                let start = self.bucket_start;
                let start_value = interpolate(self.prev_ts, self.prev_value, ts, value, start);
                self.res += trapezoid(start_value, start, value, ts);
                self.first_ts = start;
            }
        } else {
            self.res += trapezoid(self.prev_value, self.prev_ts, value, ts);
        }

        self.prev_ts = ts;
        self.prev_value = value;
        self.last_ts = ts;
        self.iteration += 1;
    }

    /// Close the tail of the bucket with the following bucket's first sample.
    pub fn add_next_bucket_first_sample(&mut self, value: f64, ts: Timestamp) {
        let end = self.bucket_end;
        if self.iteration == 0 {
            if self.is_first_bucket {
                return;
            }
            // No samples inside: the whole bucket lies on the segment
            // between the neighbouring samples.
            let start = self.bucket_start;
            let start_value = interpolate(self.prev_ts, self.prev_value, ts, value, start);
            let end_value = interpolate(self.prev_ts, self.prev_value, ts, value, end);
            self.res += trapezoid(start_value, start, end_value, end);
            self.first_ts = start;
            self.last_ts = end;
            if start == end {
                self.prev_value = start_value;
            }
            return;
        }

        let end_value = interpolate(self.prev_ts, self.prev_value, ts, value, end);
        self.res += trapezoid(self.prev_value, self.prev_ts, end_value, end);
        self.last_ts = end;
    }

    /// Most recent sample seen, for chaining into the next bucket.
    pub fn last_sample(&self) -> Option<Sample> {
        if self.iteration == 0 && self.is_first_bucket {
            None
        } else {
            Some(Sample::new(self.prev_ts, self.prev_value))
        }
    }

    /// True if nothing was integrated into this bucket.
    pub fn is_empty(&self) -> bool {
        self.iteration == 0 && self.first_ts == self.last_ts
    }

    pub fn finalize(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        if self.first_ts == self.last_ts {
            return self.prev_value;
        }
        self.res / self.first_ts.abs_diff(self.last_ts) as f64
    }
}

impl Persist for TimeWeightedAverage {
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        writer.write_f64(self.res);
        writer.write_i64(self.prev_ts);
        writer.write_f64(self.prev_value);
        writer.write_i64(self.bucket_start);
        writer.write_i64(self.bucket_end);
        writer.write_i64(self.first_ts);
        writer.write_i64(self.last_ts);
        writer.write_bool(self.is_first_bucket);
        writer.write_u64(self.iteration);
        writer.write_bool(self.reverse);
    }

    fn load<R: StateReader + ?Sized>(reader: &mut R, _version: EncodingVersion) -> Result<Self> {
        Ok(Self {
            res: reader.read_f64()?,
            prev_ts: reader.read_i64()?,
            prev_value: reader.read_f64()?,
            bucket_start: reader.read_i64()?,
            bucket_end: reader.read_i64()?,
            first_ts: reader.read_i64()?,
            last_ts: reader.read_i64()?,
            is_first_bucket: reader.read_bool()?,
            iteration: reader.read_u64()?,
            reverse: reader.read_bool()?,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
