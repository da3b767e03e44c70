//! Aegis Compaction Running Average
//!
//! Overflow-safe running average. Values are summed while the sum stays
//! representable; once the next addition would overflow, the state turns
//! the sum into a mean and keeps a running mean from then on:
//!
//! `mean(n) = mean(n-1) * (n-1)/n + value/n`
//!
//! The switch is sticky until reset.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::codec::{Persist, StateReader, StateWriter};
use aegis_common::{AegisError, EncodingVersion, Result};

// =============================================================================
// Average
// =============================================================================

/// Running sum (or, after overflow, running mean) and sample count.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Average {
    pub val: f64,
    pub cnt: u64,
    pub is_overflow: bool,
}

/// True if `sum + value` exceeds the finite double range. Both operands
/// must share a sign for that to happen.
#[inline]
pub fn will_overflow(sum: f64, value: f64) -> bool {
    sum.is_finite()
        && value.is_finite()
        && sum.is_sign_negative() == value.is_sign_negative()
        && sum.abs() > f64::MAX - value.abs()
}

/// Fold `value` into a mean over `n - 1` samples. Each operand is divided
/// before subtracting so neither step can overflow.
#[inline]
fn running_mean(mean: f64, value: f64, n: u64) -> f64 {
    let n = n as f64;
    mean + (value / n - mean / n)
}

impl Average {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, value: f64) {
        self.cnt += 1;
        if !self.is_overflow {
            if !will_overflow(self.val, value) {
                self.val += value;
                return;
            }
            self.is_overflow = true;
            self.val /= (self.cnt - 1) as f64;
            tracing::debug!(
                "Running average switched to mean accumulation after {} samples",
                self.cnt - 1
            );
        }
        self.val = running_mean(self.val, value, self.cnt);
    }

    pub fn finalize(&self) -> Result<f64> {
        if self.cnt == 0 {
            return Err(AegisError::EmptyAggregate("avg"));
        }
        if self.is_overflow {
            Ok(self.val)
        } else {
            Ok(self.val / self.cnt as f64)
        }
    }
}

impl Persist for Average {
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        writer.write_f64(self.val);
        writer.write_f64(self.cnt as f64);
        writer.write_bool(self.is_overflow);
    }

    fn load<R: StateReader + ?Sized>(reader: &mut R, version: EncodingVersion) -> Result<Self> {
        let val = reader.read_f64()?;
        let raw_cnt = reader.read_f64()?;
        if !(raw_cnt.is_finite() && raw_cnt >= 0.0 && raw_cnt.fract() == 0.0) {
            return Err(AegisError::DeserializeFailed(format!(
                "invalid average count {}",
                raw_cnt
            )));
        }
        let is_overflow = if version >= EncodingVersion::AVG_OVERFLOW {
            reader.read_bool()?
        } else {
            false
        };
        Ok(Self {
            val,
            cnt: raw_cnt as u64,
            is_overflow,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode, StateEncoder};

    #[test]
    fn test_plain_average() {
        let mut avg = Average::new();
        for v in [10.0, 20.0, 30.0] {
            avg.append(v);
        }
        assert!(!avg.is_overflow);
        assert_eq!(avg.finalize().unwrap(), 20.0);
    }

    #[test]
    fn test_empty_is_error() {
        let err = Average::new().finalize().unwrap_err();
        assert!(err.is_empty_aggregate());
    }

    #[test]
    fn test_overflow_switches_to_mean() {
        let mut avg = Average::new();
        for _ in 0..1000 {
            avg.append(f64::MAX);
        }
        for _ in 0..1000 {
            avg.append(f64::MAX);
        }
        assert!(avg.is_overflow);
        let result = avg.finalize().unwrap();
        assert!(result.is_finite());
        assert!((result - f64::MAX).abs() / f64::MAX < 1e-12);
    }

    #[test]
    fn test_overflow_with_mixed_values() {
        let mut avg = Average::new();
        avg.append(f64::MAX);
        avg.append(f64::MAX);
        avg.append(0.0);
        avg.append(-f64::MAX);
        assert!(avg.is_overflow);
        let expected = f64::MAX / 4.0;
        let result = avg.finalize().unwrap();
        assert!((result - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_opposite_signs_do_not_overflow() {
        assert!(!will_overflow(f64::MAX, -f64::MAX));
        assert!(!will_overflow(0.0, f64::MAX));
        assert!(will_overflow(f64::MAX, f64::MAX));
        assert!(will_overflow(-f64::MAX, -1.0e300));
        assert!(!will_overflow(f64::INFINITY, 1.0));
    }

    #[test]
    fn test_reset_clears_overflow() {
        let mut avg = Average::new();
        avg.append(f64::MAX);
        avg.append(f64::MAX);
        assert!(avg.is_overflow);
        avg = Average::new();
        avg.append(2.0);
        assert!(!avg.is_overflow);
        assert_eq!(avg.finalize().unwrap(), 2.0);
    }

    #[test]
    fn test_legacy_layout_defaults_overflow() {
        let mut encoder = StateEncoder::new();
        encoder.write_f64(9.0);
        encoder.write_f64(3.0);
        let bytes = encoder.into_bytes();

        let avg: Average = decode(&bytes, EncodingVersion::ALIGNMENT_TS).expect("legacy avg");
        assert!(!avg.is_overflow);
        assert_eq!(avg.finalize().unwrap(), 3.0);

        // The current layout requires the flag.
        assert!(decode::<Average>(&bytes, EncodingVersion::LATEST).is_err());
    }

    #[test]
    fn test_round_trip_preserves_overflow() {
        let mut avg = Average::new();
        avg.append(f64::MAX);
        avg.append(f64::MAX);
        avg.append(1.0);
        let restored: Average = decode(&encode(&avg), EncodingVersion::LATEST).unwrap();
        assert_eq!(restored, avg);
    }

    #[test]
    fn test_rejects_corrupt_count() {
        let mut encoder = StateEncoder::new();
        encoder.write_f64(1.0);
        encoder.write_f64(-2.0);
        encoder.write_bool(false);
        let bytes = encoder.into_bytes();
        assert!(decode::<Average>(&bytes, EncodingVersion::LATEST).is_err());
    }
}
