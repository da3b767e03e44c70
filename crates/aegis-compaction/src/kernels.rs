//! Aegis Compaction Scan Kernels
//!
//! Running-max scans over dense runs of sample values. A portable scalar
//! kernel is always available; AVX2 (and, with the `avx512` feature,
//! AVX-512F) kernels are bound once per process from the capability probe.
//!
//! The wide kernels scan the unaligned prefix scalarly, reduce one full
//! register per iteration over the aligned body, then scan the remainder
//! scalarly. Runs shorter than two registers go straight to the scalar
//! kernel. NaN inputs never replace the running max, matching a scalar
//! `value > max` fold.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::arch::{arch_features, ArchFeatures};
use aegis_common::{CompactionConfig, KernelPreference};
use std::fmt;
use std::sync::OnceLock;

// =============================================================================
// Constants
// =============================================================================

/// Lanes folded independently by the scalar kernel.
const SCALAR_LANES: usize = 8;

/// Doubles per AVX2 register.
pub const VECTOR_WIDTH_AVX2: usize = 4;
/// Doubles per AVX-512 register (one cache line).
pub const VECTOR_WIDTH_AVX512: usize = 8;

#[cfg(target_arch = "x86_64")]
const ALIGN_AVX2: usize = 32;
#[cfg(all(target_arch = "x86_64", feature = "avx512"))]
const ALIGN_AVX512: usize = 64;

/// Shortest run the AVX2 kernel vectorizes.
pub const MIN_RUN_AVX2: usize = VECTOR_WIDTH_AVX2 * 2;
/// Shortest run the AVX-512 kernel vectorizes.
pub const MIN_RUN_AVX512: usize = VECTOR_WIDTH_AVX512 * 2;

// =============================================================================
// Kernel Selection
// =============================================================================

/// Max-scan kernel implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MaxKernel {
    Scalar,
    Avx2,
    Avx512,
}

impl MaxKernel {
    /// Best kernel for the given capabilities and preference.
    pub fn select(features: &ArchFeatures, preference: KernelPreference) -> Self {
        if preference == KernelPreference::Scalar {
            return MaxKernel::Scalar;
        }
        if cfg!(all(target_arch = "x86_64", feature = "avx512")) && features.avx512f {
            MaxKernel::Avx512
        } else if cfg!(target_arch = "x86_64") && features.avx2 {
            MaxKernel::Avx2
        } else {
            MaxKernel::Scalar
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            MaxKernel::Scalar => "scalar",
            MaxKernel::Avx2 => "avx2",
            MaxKernel::Avx512 => "avx512f",
        }
    }

    /// Fold `values` into `acc`, returning the new running max.
    ///
    /// A wide kernel the running CPU lacks falls back to the scalar kernel.
    pub fn scan(self, acc: f64, values: &[f64]) -> f64 {
        match self {
            #[cfg(all(target_arch = "x86_64", feature = "avx512"))]
            MaxKernel::Avx512 if arch_features().avx512f => {
                // SAFETY: AVX-512F availability checked above.
                unsafe { x86::max_scan_avx512(acc, values) }
            }
            #[cfg(target_arch = "x86_64")]
            MaxKernel::Avx2 if arch_features().avx2 => {
                // SAFETY: AVX2 availability checked above.
                unsafe { x86::max_scan_avx2(acc, values) }
            }
            _ => max_scan_scalar(acc, values),
        }
    }
}

impl fmt::Display for MaxKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Kernel bound for this process.
static MAX_KERNEL: OnceLock<MaxKernel> = OnceLock::new();

/// Bind the max kernel from configuration. Only the first call binds;
/// later calls return the kernel already in use.
pub fn init_kernels(config: &CompactionConfig) -> MaxKernel {
    let requested = MaxKernel::select(arch_features(), config.kernels.preference);
    let bound = *MAX_KERNEL.get_or_init(|| {
        tracing::info!("Bound max scan kernel: {} ({})", requested, arch_features());
        requested
    });
    if bound != requested {
        tracing::debug!("Max scan kernel already bound to {}, ignoring {}", bound, requested);
    }
    bound
}

/// Kernel in use, binding the best available one on first use.
#[inline]
pub fn max_kernel() -> MaxKernel {
    *MAX_KERNEL.get_or_init(|| {
        let kernel = MaxKernel::select(arch_features(), KernelPreference::Auto);
        tracing::info!("Bound max scan kernel: {} ({})", kernel, arch_features());
        kernel
    })
}

/// Fold `values` into `acc` with the bound kernel.
#[inline]
pub fn max_scan(acc: f64, values: &[f64]) -> f64 {
    max_kernel().scan(acc, values)
}

// =============================================================================
// Scalar Kernel
// =============================================================================

/// Portable max scan. Folds independent lanes so the compiler can keep
/// several comparisons in flight.
pub fn max_scan_scalar(acc: f64, values: &[f64]) -> f64 {
    let mut lanes = [acc; SCALAR_LANES];
    let mut chunks = values.chunks_exact(SCALAR_LANES);
    for chunk in &mut chunks {
        for (lane, &value) in lanes.iter_mut().zip(chunk) {
            if value > *lane {
                *lane = value;
            }
        }
    }

    let mut res = acc;
    for &value in lanes.iter().chain(chunks.remainder()) {
        if value > res {
            res = value;
        }
    }
    res
}

/// Plain linear max scan, one comparison per value.
#[inline]
fn fold_max(acc: f64, values: &[f64]) -> f64 {
    values
        .iter()
        .fold(acc, |res, &value| if value > res { value } else { res })
}

// =============================================================================
// x86_64 Kernels
// =============================================================================

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::*;
    use std::arch::x86_64::*;

    /// # Safety
    /// The CPU must support AVX2.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn max_scan_avx2(acc: f64, values: &[f64]) -> f64 {
        if values.len() < MIN_RUN_AVX2 {
            return max_scan_scalar(acc, values);
        }

        let prefix = values.as_ptr().align_offset(ALIGN_AVX2).min(values.len());
        let mut res = fold_max(acc, &values[..prefix]);

        let body = &values[prefix..];
        let full = body.len() - body.len() % VECTOR_WIDTH_AVX2;
        if full > 0 {
            let ptr = body.as_ptr();
            let mut reg = _mm256_set1_pd(res);
            let mut i = 0;
            while i < full {
                // max_pd returns its second operand when either is NaN.
                reg = _mm256_max_pd(_mm256_load_pd(ptr.add(i)), reg);
                i += VECTOR_WIDTH_AVX2;
            }
            let mut lanes = [0.0f64; VECTOR_WIDTH_AVX2];
            _mm256_storeu_pd(lanes.as_mut_ptr(), reg);
            res = fold_max(res, &lanes);
        }

        fold_max(res, &body[full..])
    }

    /// # Safety
    /// The CPU must support AVX-512F.
    #[cfg(feature = "avx512")]
    #[target_feature(enable = "avx512f")]
    pub(super) unsafe fn max_scan_avx512(acc: f64, values: &[f64]) -> f64 {
        if values.len() < MIN_RUN_AVX512 {
            return max_scan_scalar(acc, values);
        }

        let prefix = values.as_ptr().align_offset(ALIGN_AVX512).min(values.len());
        let mut res = fold_max(acc, &values[..prefix]);

        let body = &values[prefix..];
        let full = body.len() - body.len() % VECTOR_WIDTH_AVX512;
        if full > 0 {
            let ptr = body.as_ptr();
            let mut reg = _mm512_set1_pd(res);
            let mut i = 0;
            while i < full {
                reg = _mm512_max_pd(_mm512_load_pd(ptr.add(i)), reg);
                i += VECTOR_WIDTH_AVX512;
            }
            let mut lanes = [0.0f64; VECTOR_WIDTH_AVX512];
            _mm512_storeu_pd(lanes.as_mut_ptr(), reg);
            res = fold_max(res, &lanes);
        }

        fold_max(res, &body[full..])
    }
}

// =============================================================================
// Tests
// =============================================================================
