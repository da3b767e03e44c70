//! Aegis Compaction Simple States
//!
//! Single-scalar and min/max aggregator states: sum, count, last, first,
//! min, max and range.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::codec::{Persist, StateReader, StateWriter};
use crate::kernels;
use aegis_common::{EncodingVersion, Result};

/// Most negative finite double; the max side of an untouched min/max state.
pub const DOUBLE_MOST_NEG: f64 = -f64::MAX;

// =============================================================================
// Single Value
// =============================================================================

/// One running double, shared by sum, count and last.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleValue {
    pub value: f64,
}

impl SingleValue {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Persist for SingleValue {
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        writer.write_f64(self.value);
    }

    fn load<R: StateReader + ?Sized>(reader: &mut R, version: EncodingVersion) -> Result<Self> {
        let value = reader.read_f64()?;
        if version >= EncodingVersion::IS_RESETTED && version < EncodingVersion::RESET_FLAG_REMOVED {
            // Obsolete reset flag, consumed and dropped.
            let _ = reader.read_u64()?;
        }
        Ok(Self { value })
    }
}

// =============================================================================
// First Value
// =============================================================================

/// First value seen in the bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstValue {
    pub value: f64,
    pub is_reset: bool,
}

impl FirstValue {
    pub fn new() -> Self {
        Self {
            value: f64::NAN,
            is_reset: true,
        }
    }

    pub fn append(&mut self, value: f64) {
        if self.is_reset {
            self.value = value;
            self.is_reset = false;
        }
    }

    pub fn finalize(&self) -> f64 {
        if self.is_reset {
            f64::NAN
        } else {
            self.value
        }
    }
}

impl Default for FirstValue {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for FirstValue {
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        writer.write_f64(self.value);
        writer.write_bool(self.is_reset);
    }

    fn load<R: StateReader + ?Sized>(reader: &mut R, version: EncodingVersion) -> Result<Self> {
        let value = reader.read_f64()?;
        let is_reset = if version >= EncodingVersion::IS_RESETTED {
            reader.read_bool()?
        } else {
            // Older layouts only kept the value; an untouched state holds NaN.
            value.is_nan()
        };
        Ok(Self { value, is_reset })
    }
}

// =============================================================================
// Min / Max
// =============================================================================

/// Running minimum and maximum. Untouched state is `(f64::MAX, -f64::MAX)`,
/// so `min_value > max_value` exactly when nothing has been appended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min_value: f64,
    pub max_value: f64,
}

impl MinMax {
    pub fn new() -> Self {
        Self {
            min_value: f64::MAX,
            max_value: DOUBLE_MOST_NEG,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_value > self.max_value
    }

    /// Min, max and range all move both bounds; `is_empty` depends on it.
    #[inline]
    pub fn append(&mut self, value: f64) {
        if value < self.min_value {
            self.min_value = value;
        }
        if value > self.max_value {
            self.max_value = value;
        }
    }

    /// Fold a run of values. The max side goes through the bound scan kernel.
    pub fn append_values(&mut self, values: &[f64]) {
        self.max_value = kernels::max_scan(self.max_value, values);
        for &value in values {
            if value < self.min_value {
                self.min_value = value;
            }
        }
    }

    pub fn min(&self) -> f64 {
        if self.is_empty() {
            f64::NAN
        } else {
            self.min_value
        }
    }

    pub fn max(&self) -> f64 {
        if self.is_empty() {
            f64::NAN
        } else {
            self.max_value
        }
    }

    pub fn range(&self) -> f64 {
        if self.is_empty() {
            f64::NAN
        } else {
            self.max_value - self.min_value
        }
    }
}

impl Default for MinMax {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for MinMax {
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W) {
        writer.write_f64(self.max_value);
        writer.write_f64(self.min_value);
    }

    fn load<R: StateReader + ?Sized>(reader: &mut R, version: EncodingVersion) -> Result<Self> {
        let max_value = reader.read_f64()?;
        let min_value = reader.read_f64()?;
        if version < EncodingVersion::ALIGNMENT_TS {
            // Obsolete buffer, read and discarded unseen.
            let _ = reader.read_string_buffer()?;
        }
        Ok(Self {
            min_value,
            max_value,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
