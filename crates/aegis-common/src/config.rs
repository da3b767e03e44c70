//! Aegis Config - Configuration Structures
//!
//! Configuration types for the compaction engine. Supports loading from
//! TOML files and programmatic construction, with defaults suitable for
//! both development and production deployments.
//!
//! Key Features:
//! - Kernel configuration (vectorized scan preference)
//! - Median tracker sizing
//! - Rule behaviour (empty bucket reporting)
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{AegisError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Kernel Configuration
// =============================================================================

/// Which max-scan kernel family may be bound at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KernelPreference {
    /// Best kernel the CPU supports.
    #[default]
    Auto,
    /// Portable scalar kernel only.
    Scalar,
}

/// Configuration for the scan kernels.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub preference: KernelPreference,
}

// =============================================================================
// Median Configuration
// =============================================================================

/// Configuration for streaming median trackers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MedianConfig {
    /// Initial capacity reserved in each heap.
    pub capacity_hint: usize,
}

impl Default for MedianConfig {
    fn default() -> Self {
        Self { capacity_hint: 64 }
    }
}

// =============================================================================
// Rule Configuration
// =============================================================================

/// Configuration for compaction rules and downsampling.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuleConfig {
    /// Emit buckets without samples using the aggregation's empty value.
    pub report_empty_buckets: bool,
}

// =============================================================================
// Compaction Configuration
// =============================================================================

/// Top-level compaction engine configuration. Unknown sections are
/// rejected rather than silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CompactionConfig {
    pub kernels: KernelConfig,
    pub median: MedianConfig,
    pub rules: RuleConfig,
}

impl CompactionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded compaction configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AegisError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.median.capacity_hint == 0 {
            return Err(AegisError::Configuration(
                "median capacity hint must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Create configuration with development defaults.
    pub fn development() -> Self {
        Self::default()
    }

    /// Create configuration for deterministic runs (no vector kernels).
    pub fn portable() -> Self {
        Self {
            kernels: KernelConfig {
                preference: KernelPreference::Scalar,
            },
            ..Default::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
