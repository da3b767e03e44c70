//! Aegis Error - Unified Error Types
//!
//! Error handling for the compaction engine. Separates the two failure
//! kinds the aggregation core can produce (an empty aggregate at finalize
//! and a failed state load) from caller mistakes such as unknown
//! aggregation names, out-of-order samples and bad configuration.
//!
//! Key Features:
//! - Domain-specific error variants for precise error handling
//! - Empty-aggregate detection so callers can substitute an empty value
//! - Load-failure classification for aborting a whole restore
//! - Seamless integration with std::io::Error
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all Aegis compaction operations.
#[derive(Error, Debug)]
pub enum AegisError {
    // Aggregation errors
    #[error("empty aggregate: {0} has no samples in this bucket")]
    EmptyAggregate(&'static str),

    #[error("unknown aggregation type: {0}")]
    UnknownAggregation(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    // Persistence errors
    #[error("deserialize failed: {0}")]
    DeserializeFailed(String),

    #[error("unsupported encoding version: {0}")]
    UnsupportedEncodingVersion(u32),

    // Rule errors
    #[error("invalid compaction rule: {0}")]
    InvalidRule(String),

    #[error("sample out of order: timestamp {timestamp} precedes {last}")]
    OutOfOrder { timestamp: i64, last: i64 },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for Aegis operations.
pub type Result<T> = std::result::Result<T, AegisError>;

// =============================================================================
// Error Classification
// =============================================================================

impl AegisError {
    /// Returns true if finalize found no samples; the caller substitutes the
    /// aggregation's empty value instead of surfacing a fault.
    pub fn is_empty_aggregate(&self) -> bool {
        matches!(self, AegisError::EmptyAggregate(_))
    }

    /// Returns true if the error must abort the enclosing load. The structure
    /// being restored is invalid as a whole.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            AegisError::DeserializeFailed(_)
                | AegisError::UnsupportedEncodingVersion(_)
                | AegisError::UnknownAggregation(_)
                | AegisError::Io(_)
        )
    }

    /// Returns true if this is a caller error (vs a data error).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AegisError::UnknownAggregation(_)
                | AegisError::UnsupportedOperation(_)
                | AegisError::InvalidRule(_)
                | AegisError::OutOfOrder { .. }
                | AegisError::Configuration(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
