//! Aegis Compaction Architecture Probe
//!
//! Runtime detection of the wide-vector instruction sets the scan kernels
//! can use. Detection runs once per process; every later query reads the
//! cached descriptor.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;
use std::sync::OnceLock;

// =============================================================================
// Architecture Features
// =============================================================================

/// Wide-vector capability flags detected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchFeatures {
    /// AVX2 support (x86_64)
    pub avx2: bool,
    /// AVX-512 Foundation support (x86_64)
    pub avx512f: bool,
}

impl ArchFeatures {
    /// Detect CPU features at runtime.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            Self {
                avx2: is_x86_feature_detected!("avx2"),
                avx512f: is_x86_feature_detected!("avx512f"),
            }
        }

        #[cfg(not(target_arch = "x86_64"))]
        {
            Self::default()
        }
    }

    /// Descriptor with every wide-vector generation disabled.
    pub const fn scalar() -> Self {
        Self {
            avx2: false,
            avx512f: false,
        }
    }

    /// Check if any wide-vector generation is available.
    pub fn has_wide_vectors(&self) -> bool {
        self.avx2 || self.avx512f
    }
}

impl fmt::Display for ArchFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "avx2={} avx512f={}", self.avx2, self.avx512f)
    }
}

/// Global CPU features, detected once at first use.
static ARCH_FEATURES: OnceLock<ArchFeatures> = OnceLock::new();

/// Get the detected capability descriptor (cached).
#[inline]
pub fn arch_features() -> &'static ArchFeatures {
    ARCH_FEATURES.get_or_init(ArchFeatures::detect)
}

// =============================================================================
// Tests
// =============================================================================
