//! Aegis Common - Shared Types and Utilities
//!
//! Foundational types, error handling, and configuration used by the Aegis
//! compaction engine. Provides the core abstractions that keep aggregation,
//! persistence and rule evaluation consistent with each other.
//!
//! Key Features:
//! - Unified error types with empty-aggregate and load-failure detection
//! - Core data types (Sample, Timestamp, EncodingVersion)
//! - Configuration structures with TOML loading
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod config;
pub mod error;
pub mod types;

pub use config::{CompactionConfig, KernelPreference};
pub use error::{AegisError, Result};
pub use types::*;
