//! Aegis Compaction Aggregation
//!
//! Per-bucket aggregator states. Each aggregation type maps to one variant
//! of [`Aggregator`], which wraps a small state struct and dispatches the
//! common contract: append, vector append, finalize, reset, clone, and
//! persistence. The time-weighted average additionally takes bucket-edge
//! hooks; on every other variant those hooks do nothing.
//!
//! Empty buckets: avg and the variance family report an error from
//! finalize; count and sum fold to zero; last keeps the value carried from
//! the previous bucket (its reset is a no-op); everything else is NaN.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

mod average;
mod simple;
mod twa;
mod variance;

pub use average::{will_overflow, Average};
pub use simple::{FirstValue, MinMax, SingleValue, DOUBLE_MOST_NEG};
pub use twa::TimeWeightedAverage;
pub use variance::Variance;

use crate::codec::{check_version, Persist, StateDecoder, StateEncoder, StateReader, StateWriter};
use crate::registry::AggregationType;
use aegis_common::{AegisError, EncodingVersion, Result, Sample, Timestamp};
use bytes::Bytes;

// =============================================================================
// Aggregator
// =============================================================================

/// Aggregation state for one compaction rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator {
    Min(MinMax),
    Max(MinMax),
    Range(MinMax),
    Sum(SingleValue),
    Count(SingleValue),
    Last(SingleValue),
    First(FirstValue),
    Avg(Average),
    VarP(Variance),
    VarS(Variance),
    StdP(Variance),
    StdS(Variance),
    Twa(TimeWeightedAverage),
}

impl Aggregator {
    /// Fresh state. `reverse` only matters for the time-weighted average.
    pub fn new(aggregation: AggregationType, reverse: bool) -> Self {
        match aggregation {
            AggregationType::Min => Aggregator::Min(MinMax::new()),
            AggregationType::Max => Aggregator::Max(MinMax::new()),
            AggregationType::Range => Aggregator::Range(MinMax::new()),
            AggregationType::Sum => Aggregator::Sum(SingleValue::new(0.0)),
            AggregationType::Count => Aggregator::Count(SingleValue::new(0.0)),
            AggregationType::Last => Aggregator::Last(SingleValue::new(f64::NAN)),
            AggregationType::First => Aggregator::First(FirstValue::new()),
            AggregationType::Avg => Aggregator::Avg(Average::new()),
            AggregationType::VarP => Aggregator::VarP(Variance::new()),
            AggregationType::VarS => Aggregator::VarS(Variance::new()),
            AggregationType::StdP => Aggregator::StdP(Variance::new()),
            AggregationType::StdS => Aggregator::StdS(Variance::new()),
            AggregationType::Twa => Aggregator::Twa(TimeWeightedAverage::new(reverse)),
        }
    }

    pub fn aggregation_type(&self) -> AggregationType {
        match self {
            Aggregator::Min(_) => AggregationType::Min,
            Aggregator::Max(_) => AggregationType::Max,
            Aggregator::Range(_) => AggregationType::Range,
            Aggregator::Sum(_) => AggregationType::Sum,
            Aggregator::Count(_) => AggregationType::Count,
            Aggregator::Last(_) => AggregationType::Last,
            Aggregator::First(_) => AggregationType::First,
            Aggregator::Avg(_) => AggregationType::Avg,
            Aggregator::VarP(_) => AggregationType::VarP,
            Aggregator::VarS(_) => AggregationType::VarS,
            Aggregator::StdP(_) => AggregationType::StdP,
            Aggregator::StdS(_) => AggregationType::StdS,
            Aggregator::Twa(_) => AggregationType::Twa,
        }
    }

    // -------------------------------------------------------------------------
    // Accumulation
    // -------------------------------------------------------------------------

    /// Fold one sample. Samples must follow the iteration direction the
    /// aggregator was created with; only the time-weighted average uses `ts`.
    pub fn append(&mut self, value: f64, ts: Timestamp) {
        match self {
            Aggregator::Min(mm) | Aggregator::Max(mm) | Aggregator::Range(mm) => {
                mm.append(value)
            }
            Aggregator::Sum(sv) => sv.value += value,
            Aggregator::Count(sv) => sv.value += 1.0,
            Aggregator::Last(sv) => sv.value = value,
            Aggregator::First(first) => first.append(value),
            Aggregator::Avg(avg) => avg.append(value),
            Aggregator::VarP(var)
            | Aggregator::VarS(var)
            | Aggregator::StdP(var)
            | Aggregator::StdS(var) => var.append(value),
            Aggregator::Twa(twa) => twa.append(value, ts),
        }
    }

    /// Fold a dense run of values, equivalent to appending each in order.
    /// The max side of min, max and range goes through the bound scan kernel.
    /// The time-weighted average needs timestamps and rejects this call.
    pub fn append_values(&mut self, values: &[f64]) -> Result<()> {
        match self {
            Aggregator::Min(mm) | Aggregator::Max(mm) | Aggregator::Range(mm) => {
                mm.append_values(values)
            }
            Aggregator::Count(sv) => sv.value += values.len() as f64,
            Aggregator::Last(sv) => {
                if let Some(&value) = values.last() {
                    sv.value = value;
                }
            }
            Aggregator::Twa(_) => {
                return Err(AegisError::UnsupportedOperation(
                    "vector append on twa requires timestamps".to_string(),
                ));
            }
            _ => {
                for &value in values {
                    self.append(value, 0);
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Results
    // -------------------------------------------------------------------------

    /// Aggregated result of the bucket. Pure read; calling it twice gives
    /// the same answer. Avg and the variance family return
    /// `EmptyAggregate` when no samples were appended.
    pub fn finalize(&self) -> Result<f64> {
        match self {
            Aggregator::Min(mm) => Ok(mm.min()),
            Aggregator::Max(mm) => Ok(mm.max()),
            Aggregator::Range(mm) => Ok(mm.range()),
            Aggregator::Sum(sv) | Aggregator::Count(sv) | Aggregator::Last(sv) => Ok(sv.value),
            Aggregator::First(first) => Ok(first.finalize()),
            Aggregator::Avg(avg) => avg.finalize(),
            Aggregator::VarP(var) => var.population().ok_or(AegisError::EmptyAggregate("var.p")),
            Aggregator::VarS(var) => var.sample().ok_or(AegisError::EmptyAggregate("var.s")),
            Aggregator::StdP(var) => var
                .population()
                .map(f64::sqrt)
                .ok_or(AegisError::EmptyAggregate("std.p")),
            Aggregator::StdS(var) => var
                .sample()
                .map(f64::sqrt)
                .ok_or(AegisError::EmptyAggregate("std.s")),
            Aggregator::Twa(twa) => Ok(twa.finalize()),
        }
    }

    /// Value reported for a bucket without samples.
    pub fn empty_value(&self) -> f64 {
        match self {
            Aggregator::Sum(_) | Aggregator::Count(_) => 0.0,
            Aggregator::Last(sv) => sv.value,
            _ => f64::NAN,
        }
    }

    /// Finalize, substituting the empty value for an empty aggregate.
    pub fn finalize_or_empty(&self) -> f64 {
        match self.finalize() {
            Ok(value) => value,
            Err(_) => self.empty_value(),
        }
    }

    /// Back to the post-create shape. Last keeps its value so the next
    /// bucket can report it when empty.
    pub fn reset(&mut self) {
        match self {
            Aggregator::Last(_) => {}
            Aggregator::Twa(twa) => twa.reset(),
            other => *other = Aggregator::new(other.aggregation_type(), false),
        }
    }

    // -------------------------------------------------------------------------
    // Bucket Hooks
    // -------------------------------------------------------------------------

    /// Set the bucket edges (ascending). Time-weighted average only.
    pub fn add_bucket_params(&mut self, bucket_start: Timestamp, bucket_end: Timestamp) {
        if let Aggregator::Twa(twa) = self {
            twa.add_bucket_params(bucket_start, bucket_end);
        }
    }

    /// Seed the preceding bucket's last sample. Time-weighted average only.
    pub fn add_prev_bucket_last_sample(&mut self, value: f64, ts: Timestamp) {
        if let Aggregator::Twa(twa) = self {
            twa.add_prev_bucket_last_sample(value, ts);
        }
    }

    /// Close the bucket tail with the following bucket's first sample.
    /// Time-weighted average only.
    pub fn add_next_bucket_first_sample(&mut self, value: f64, ts: Timestamp) {
        if let Aggregator::Twa(twa) = self {
            twa.add_next_bucket_first_sample(value, ts);
        }
    }

    /// Most recent sample seen by a time-weighted average.
    pub fn last_sample(&self) -> Option<Sample> {
        match self {
            Aggregator::Twa(twa) => twa.last_sample(),
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Write the state in the latest layout.
    pub fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        match self {
            Aggregator::Min(mm) | Aggregator::Max(mm) | Aggregator::Range(mm) => mm.save(writer),
            Aggregator::Sum(sv) | Aggregator::Count(sv) | Aggregator::Last(sv) => sv.save(writer),
            Aggregator::First(first) => first.save(writer),
            Aggregator::Avg(avg) => avg.save(writer),
            Aggregator::VarP(var)
            | Aggregator::VarS(var)
            | Aggregator::StdP(var)
            | Aggregator::StdS(var) => var.save(writer),
            Aggregator::Twa(twa) => twa.save(writer),
        }
    }

    /// Read a state of `aggregation` written with layout `version`.
    pub fn load<R: StateReader + ?Sized>(
        aggregation: AggregationType,
        reader: &mut R,
        version: EncodingVersion,
    ) -> Result<Self> {
        check_version(version)?;
        Ok(match aggregation {
            AggregationType::Min => Aggregator::Min(MinMax::load(reader, version)?),
            AggregationType::Max => Aggregator::Max(MinMax::load(reader, version)?),
            AggregationType::Range => Aggregator::Range(MinMax::load(reader, version)?),
            AggregationType::Sum => Aggregator::Sum(SingleValue::load(reader, version)?),
            AggregationType::Count => Aggregator::Count(SingleValue::load(reader, version)?),
            AggregationType::Last => Aggregator::Last(SingleValue::load(reader, version)?),
            AggregationType::First => Aggregator::First(FirstValue::load(reader, version)?),
            AggregationType::Avg => Aggregator::Avg(Average::load(reader, version)?),
            AggregationType::VarP => Aggregator::VarP(Variance::load(reader, version)?),
            AggregationType::VarS => Aggregator::VarS(Variance::load(reader, version)?),
            AggregationType::StdP => Aggregator::StdP(Variance::load(reader, version)?),
            AggregationType::StdS => Aggregator::StdS(Variance::load(reader, version)?),
            AggregationType::Twa => Aggregator::Twa(TimeWeightedAverage::load(reader, version)?),
        })
    }

    /// Encode the state in the latest layout.
    pub fn to_bytes(&self) -> Bytes {
        let mut encoder = StateEncoder::new();
        self.save(&mut encoder);
        encoder.into_bytes()
    }

    /// Decode a state of `aggregation` written with layout `version`.
    pub fn from_bytes(
        aggregation: AggregationType,
        data: &[u8],
        version: EncodingVersion,
    ) -> Result<Self> {
        let mut decoder = StateDecoder::new(data);
        Self::load(aggregation, &mut decoder, version).map_err(|err| {
            tracing::warn!("Failed to load {} aggregator ({}): {}", aggregation, version, err);
            err
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(aggregation: AggregationType, values: &[f64]) -> Aggregator {
        let mut agg = Aggregator::new(aggregation, false);
        for (i, &v) in values.iter().enumerate() {
            agg.append(v, i as Timestamp * 10);
        }
        agg
    }

    const VALUES: [f64; 6] = [4.0, -1.5, 9.0, 2.0, 2.0, 7.5];

    #[test]
    fn test_basic_results() {
        let expect = [
            (AggregationType::Min, -1.5),
            (AggregationType::Max, 9.0),
            (AggregationType::Range, 10.5),
            (AggregationType::Sum, 23.0),
            (AggregationType::Count, 6.0),
            (AggregationType::First, 4.0),
            (AggregationType::Last, 7.5),
        ];
        for (aggregation, expected) in expect {
            let agg = fold(aggregation, &VALUES);
            assert_eq!(agg.finalize().unwrap(), expected, "{aggregation}");
        }

        let avg = fold(AggregationType::Avg, &VALUES).finalize().unwrap();
        assert!((avg - 23.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_and_max_report_single_sample() {
        for aggregation in [AggregationType::Min, AggregationType::Max, AggregationType::Range] {
            let agg = fold(aggregation, &[0.0]);
            assert_eq!(agg.finalize().unwrap(), 0.0, "{aggregation}");

            let mut agg = Aggregator::new(aggregation, false);
            agg.append_values(&[0.0]).unwrap();
            assert_eq!(agg.finalize().unwrap(), 0.0, "{aggregation}");
        }

        // A lone sample away from zero pins both bounds.
        assert_eq!(fold(AggregationType::Min, &[-3.0]).finalize().unwrap(), -3.0);
        assert_eq!(fold(AggregationType::Max, &[-3.0]).finalize().unwrap(), -3.0);
        assert_eq!(fold(AggregationType::Max, &[5.0]).finalize().unwrap(), 5.0);
        assert_eq!(fold(AggregationType::Min, &[5.0]).finalize().unwrap(), 5.0);
    }

    #[test]
    fn test_variance_family_relationships() {
        let var_p = fold(AggregationType::VarP, &VALUES).finalize().unwrap();
        let var_s = fold(AggregationType::VarS, &VALUES).finalize().unwrap();
        let std_p = fold(AggregationType::StdP, &VALUES).finalize().unwrap();
        let std_s = fold(AggregationType::StdS, &VALUES).finalize().unwrap();

        let n = VALUES.len() as f64;
        assert!((var_s - var_p * n / (n - 1.0)).abs() < 1e-9);
        assert!((std_p - var_p.sqrt()).abs() < 1e-12);
        assert!((std_s - var_s.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_finalize_semantics() {
        for aggregation in AggregationType::ALL {
            let agg = Aggregator::new(aggregation, false);
            let result = agg.finalize();
            if aggregation.requires_samples() {
                assert!(result.unwrap_err().is_empty_aggregate(), "{aggregation}");
            } else {
                let value = result.expect("non-erroring aggregation");
                match aggregation {
                    AggregationType::Sum | AggregationType::Count => assert_eq!(value, 0.0),
                    _ => assert!(value.is_nan(), "{aggregation}"),
                }
            }
        }
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(Aggregator::new(AggregationType::Count, false).empty_value(), 0.0);
        assert_eq!(Aggregator::new(AggregationType::Sum, false).empty_value(), 0.0);
        assert!(Aggregator::new(AggregationType::Avg, false).finalize_or_empty().is_nan());
        assert!(Aggregator::new(AggregationType::Max, false).empty_value().is_nan());
    }

    #[test]
    fn test_last_survives_reset() {
        let mut agg = fold(AggregationType::Last, &[1.0, 2.0, 3.0]);
        agg.reset();
        assert_eq!(agg.finalize().unwrap(), 3.0);
        assert_eq!(agg.empty_value(), 3.0);
        agg.append(8.0, 100);
        assert_eq!(agg.finalize().unwrap(), 8.0);
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        for aggregation in AggregationType::ALL {
            if aggregation == AggregationType::Last {
                continue;
            }
            let reverse = aggregation == AggregationType::Twa;
            let mut agg = Aggregator::new(aggregation, reverse);
            agg.append(5.0, 10);
            agg.append(6.0, 5);
            agg.reset();
            // Byte comparison, since an untouched first holds NaN.
            let fresh = Aggregator::new(aggregation, reverse);
            assert_eq!(agg.to_bytes(), fresh.to_bytes(), "{aggregation}");
        }
    }

    #[test]
    fn test_clone_is_independent() {
        let mut agg = fold(AggregationType::Sum, &[1.0, 2.0]);
        let snapshot = agg.clone();
        agg.append(10.0, 0);
        assert_eq!(snapshot.finalize().unwrap(), 3.0);
        assert_eq!(agg.finalize().unwrap(), 13.0);
    }

    #[test]
    fn test_vector_append_matches_scalar() {
        let values: Vec<f64> = (0..203).map(|i| ((i * 37) % 101) as f64 - 50.0).collect();
        for aggregation in AggregationType::ALL {
            if aggregation == AggregationType::Twa {
                continue;
            }
            let scalar = fold(aggregation, &values);
            let mut vector = Aggregator::new(aggregation, false);
            vector.append_values(&values[..17]).unwrap();
            vector.append_values(&values[17..]).unwrap();

            let a = scalar.finalize().unwrap();
            let b = vector.finalize().unwrap();
            assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0), "{aggregation}: {a} vs {b}");
        }
    }

    #[test]
    fn test_vector_append_rejected_for_twa() {
        let mut agg = Aggregator::new(AggregationType::Twa, false);
        let err = agg.append_values(&[1.0, 2.0]).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_hooks_ignored_by_non_twa() {
        let mut agg = fold(AggregationType::Max, &[1.0, 3.0]);
        agg.add_bucket_params(0, 100);
        agg.add_prev_bucket_last_sample(50.0, -5);
        agg.add_next_bucket_first_sample(60.0, 105);
        assert_eq!(agg.finalize().unwrap(), 3.0);
        assert_eq!(agg.last_sample(), None);
    }

    #[test]
    fn test_round_trip_every_variant() {
        for aggregation in AggregationType::ALL {
            let agg = fold(aggregation, &VALUES);
            let bytes = agg.to_bytes();
            let restored = Aggregator::from_bytes(aggregation, &bytes, EncodingVersion::LATEST)
                .expect("round trip should load");
            assert_eq!(restored.finalize().unwrap(), agg.finalize().unwrap(), "{aggregation}");
        }
    }

    #[test]
    fn test_truncated_load_fails_for_every_variant() {
        for aggregation in AggregationType::ALL {
            let bytes = fold(aggregation, &VALUES).to_bytes();
            let result =
                Aggregator::from_bytes(aggregation, &bytes[..bytes.len() - 1], EncodingVersion::LATEST);
            assert!(result.unwrap_err().is_load_failure(), "{aggregation}");
        }
    }

    #[test]
    fn test_future_version_rejected() {
        let bytes = fold(AggregationType::Sum, &VALUES).to_bytes();
        let result = Aggregator::from_bytes(
            AggregationType::Sum,
            &bytes,
            EncodingVersion(EncodingVersion::LATEST.0 + 1),
        );
        assert!(matches!(result, Err(AegisError::UnsupportedEncodingVersion(_))));
    }
}
