//! Property-based tests for compaction invariants
//!
//! Invariants checked:
//! 1. Range equals max minus min; sum / count equals avg
//! 2. Variance is non-negative; sample and population variance agree
//! 3. Every scan kernel agrees with the scalar fold
//! 4. The streaming median equals the sorted median under inserts and deletes
//! 5. Persisted state finalizes to the same value after a round trip
//! 6. Vector append equals per-sample append

use aegis_common::{CompactionConfig, EncodingVersion, KernelPreference, Sample};
use aegis_compaction::kernels::max_scan_scalar;
use aegis_compaction::{
    arch_features, init_kernels, max_kernel, AggregationType, Aggregator, Downsampler, MaxKernel,
    MedianTracker,
};
use proptest::prelude::*;

fn fold(aggregation: AggregationType, values: &[f64]) -> Aggregator {
    let mut agg = Aggregator::new(aggregation, false);
    for (i, &v) in values.iter().enumerate() {
        agg.append(v, i as i64);
    }
    agg
}

fn sorted_median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        f64::NAN
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn finite_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6f64..1.0e6, 1..200)
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Range equals max minus min, and sum / count equals avg.
    #[test]
    fn range_and_average_consistency(values in finite_values()) {
        let max = fold(AggregationType::Max, &values).finalize().unwrap();
        let min = fold(AggregationType::Min, &values).finalize().unwrap();
        let range = fold(AggregationType::Range, &values).finalize().unwrap();
        prop_assert_eq!(range, max - min);

        let sum = fold(AggregationType::Sum, &values).finalize().unwrap();
        let count = fold(AggregationType::Count, &values).finalize().unwrap();
        let avg = fold(AggregationType::Avg, &values).finalize().unwrap();
        prop_assert_eq!(count, values.len() as f64);
        prop_assert!(close(sum / count, avg), "sum/count {} vs avg {}", sum / count, avg);
    }

    /// Population variance is never negative and relates to the sample
    /// variance by n / (n - 1).
    #[test]
    fn variance_relationships(values in finite_values()) {
        let var_p = fold(AggregationType::VarP, &values).finalize().unwrap();
        let var_s = fold(AggregationType::VarS, &values).finalize().unwrap();
        let std_p = fold(AggregationType::StdP, &values).finalize().unwrap();

        prop_assert!(var_p >= 0.0);
        prop_assert!(std_p.is_finite() && std_p >= 0.0);

        let n = values.len() as f64;
        if values.len() == 1 {
            prop_assert_eq!(var_s, 0.0);
        } else {
            prop_assert!(close(var_s, var_p * n / (n - 1.0)));
        }
    }

    /// Every kernel this CPU can run agrees with the scalar fold.
    #[test]
    fn kernels_match_scalar(
        values in prop::collection::vec(prop_oneof![
            9 => -1.0e9f64..1.0e9,
            1 => Just(f64::NAN),
        ], 0..300),
        acc in -1.0e9f64..1.0e9,
        offset in 0usize..8,
    ) {
        let slice = &values[offset.min(values.len())..];
        let expected = max_scan_scalar(acc, slice);
        for preference in [KernelPreference::Auto, KernelPreference::Scalar] {
            let kernel = MaxKernel::select(arch_features(), preference);
            prop_assert_eq!(kernel.scan(acc, slice), expected, "kernel {}", kernel);
        }
    }

    /// The tracked median equals the sorted median after each operation.
    #[test]
    fn median_matches_sorted(
        ops in prop::collection::vec((any::<bool>(), -50i32..50), 1..150),
    ) {
        let mut tracker = MedianTracker::new(16);
        let mut live: Vec<f64> = Vec::new();

        for (delete, raw) in ops {
            let value = raw as f64;
            if delete && !live.is_empty() {
                let victim = live[(raw.unsigned_abs() as usize) % live.len()];
                prop_assert!(tracker.delete(victim));
                if let Some(pos) = live.iter().position(|&v| v == victim) {
                    live.swap_remove(pos);
                }
            } else {
                tracker.insert(value);
                live.push(value);
            }

            let expected = sorted_median(&live);
            let got = tracker.median();
            prop_assert!(
                got == expected || (got.is_nan() && expected.is_nan()),
                "median {} vs {} over {:?}", got, expected, live
            );
        }
    }

    /// Persisting and restoring any aggregator preserves its result.
    #[test]
    fn persisted_state_finalizes_identically(
        values in finite_values(),
        index in 0usize..AggregationType::ALL.len(),
    ) {
        let aggregation = AggregationType::ALL[index];
        let agg = fold(aggregation, &values);
        let bytes = agg.to_bytes();
        let restored = Aggregator::from_bytes(aggregation, &bytes, EncodingVersion::LATEST).unwrap();

        let a = agg.finalize_or_empty();
        let b = restored.finalize_or_empty();
        prop_assert!(a.to_bits() == b.to_bits(), "{}: {} vs {}", aggregation, a, b);
    }

    /// Appending a slice at once equals appending each value.
    #[test]
    fn vector_append_matches_scalar(
        values in finite_values(),
        split in 0usize..200,
        index in 0usize..AggregationType::ALL.len(),
    ) {
        let aggregation = AggregationType::ALL[index];
        prop_assume!(aggregation != AggregationType::Twa);

        let split = split.min(values.len());
        let mut vector = Aggregator::new(aggregation, false);
        vector.append_values(&values[..split]).unwrap();
        vector.append_values(&values[split..]).unwrap();

        let expected = fold(aggregation, &values).finalize().unwrap();
        prop_assert!(close(vector.finalize().unwrap(), expected));
    }

    /// Downsampled buckets are strictly increasing and aligned.
    #[test]
    fn downsampled_buckets_are_aligned(
        deltas in prop::collection::vec(0i64..40, 1..100),
        duration in 1i64..50,
        alignment in -100i64..100,
    ) {
        let mut ts = -500;
        let samples: Vec<Sample> = deltas
            .iter()
            .map(|d| {
                ts += d;
                Sample::new(ts, *d as f64)
            })
            .collect();

        let buckets = Downsampler::new(AggregationType::Count, duration)
            .with_alignment(alignment)
            .downsample(&samples)
            .unwrap();

        let total: f64 = buckets.iter().map(|b| b.value).sum();
        prop_assert_eq!(total, samples.len() as f64);
        for pair in buckets.windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
        for bucket in &buckets {
            prop_assert_eq!((bucket.timestamp - alignment).rem_euclid(duration), 0);
        }
    }
}

/// Doubling a run of `f64::MAX` values must not overflow the average.
#[test]
fn average_survives_overflow() {
    let mut agg = Aggregator::new(AggregationType::Avg, false);
    for _ in 0..2000 {
        agg.append(f64::MAX, 0);
    }
    let avg = agg.finalize().unwrap();
    assert!(avg.is_finite());
    assert!((avg - f64::MAX).abs() / f64::MAX < 1e-9);
}

/// Registry lookups are case-insensitive and reject unknown names.
#[test]
fn registry_names() {
    assert_eq!(AggregationType::from_name("AVG"), Some(AggregationType::Avg));
    assert_eq!(AggregationType::from_name("avg"), Some(AggregationType::Avg));
    assert_eq!(AggregationType::from_name("bogus"), None);
    for aggregation in AggregationType::ALL {
        let token = aggregation.as_str();
        assert_eq!(
            AggregationType::from_name(token).map(|a| a.to_string()),
            Some(token.to_uppercase())
        );
    }
}

/// The max kernel binds once; later configuration does not rebind it.
#[test]
fn kernel_binding_is_stable() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let bound = init_kernels(&CompactionConfig::default());
    assert_eq!(init_kernels(&CompactionConfig::portable()), bound);
    assert_eq!(max_kernel(), bound);
}
