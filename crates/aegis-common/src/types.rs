//! Aegis Types - Core Data Types
//!
//! Fundamental data types shared by the compaction engine: the sample
//! representation and the encoding version tag carried by persisted
//! aggregator state.
//!
//! Key Features:
//! - 64-bit signed timestamps and double-precision values
//! - Ordered encoding version tags with named milestones
//! - Serialization support via serde
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Sample
// =============================================================================

/// Timestamp of a sample, in the series' own unit (usually milliseconds).
pub type Timestamp = i64;

/// A single (timestamp, value) sample of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl From<(Timestamp, f64)> for Sample {
    fn from((timestamp, value): (Timestamp, f64)) -> Self {
        Self { timestamp, value }
    }
}

// =============================================================================
// Encoding Version
// =============================================================================

/// Monotonically increasing tag selecting which optional fields are present
/// in a persisted state layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingVersion(pub u32);

impl EncodingVersion {
    /// Initial layout.
    pub const BASE: Self = Self(0);
    /// Uncompressed chunk support.
    pub const UNCOMPRESSED: Self = Self(1);
    /// Chunk size persisted.
    pub const SIZE: Self = Self(2);
    /// Reset flags persisted for single-value and first-value states.
    pub const IS_RESETTED: Self = Self(3);
    /// Rule alignment timestamps; min/max no longer write the legacy buffer.
    pub const ALIGNMENT_TS: Self = Self(4);
    /// Running-average overflow flag persisted.
    pub const AVG_OVERFLOW: Self = Self(5);
    /// Single-value reset flag dropped.
    pub const RESET_FLAG_REMOVED: Self = Self(6);

    pub const LATEST: Self = Self::RESET_FLAG_REMOVED;

    /// Returns true if this version can be read by the current build.
    pub fn is_supported(self) -> bool {
        self <= Self::LATEST
    }
}

impl Default for EncodingVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for EncodingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
