//! Aegis Compaction Variance
//!
//! Single-pass variance from the running sum and sum of squares, shared by
//! var.p, var.s, std.p and std.s.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::codec::{Persist, StateReader, StateWriter};
use aegis_common::{EncodingVersion, Result};

// =============================================================================
// Variance
// =============================================================================

/// Sum, sum of squares and count of the raw values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Variance {
    pub sum: f64,
    pub sum_sq: f64,
    pub cnt: u64,
}

impl Variance {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn append(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
        self.cnt += 1;
    }

    /// Population variance, `None` without samples.
    ///
    /// Computed as `(sum_sq - 2*sum*mean + mean^2*n) / n`; rounding can push
    /// a zero-spread result slightly negative, so it is clamped at zero.
    pub fn population(&self) -> Option<f64> {
        if self.cnt == 0 {
            return None;
        }
        let n = self.cnt as f64;
        let mean = self.sum / n;
        let res = self.sum_sq - 2.0 * self.sum * mean + mean * mean * n;
        Some((res / n).max(0.0))
    }

    /// Sample variance with Bessel's correction; zero for a single sample.
    pub fn sample(&self) -> Option<f64> {
        match self.cnt {
            0 => None,
            1 => Some(0.0),
            n => {
                let n = n as f64;
                self.population().map(|var| var * n / (n - 1.0))
            }
        }
    }
}

impl Persist for Variance {
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        writer.write_f64(self.sum);
        writer.write_f64(self.sum_sq);
        writer.write_u64(self.cnt);
    }

    fn load<R: StateReader + ?Sized>(reader: &mut R, _version: EncodingVersion) -> Result<Self> {
        Ok(Self {
            sum: reader.read_f64()?,
            sum_sq: reader.read_f64()?,
            cnt: reader.read_u64()?,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
