//! Aegis Compaction State Codec
//!
//! Sink and source abstractions for persisting aggregator state, plus a
//! little-endian byte implementation. Doubles and unsigned integers are
//! written as eight bytes each; string buffers carry a u64 length prefix.
//! Every read checks the remaining input so truncated payloads surface as
//! `DeserializeFailed` instead of panicking.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use aegis_common::{AegisError, EncodingVersion, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

// =============================================================================
// Sink / Source Traits
// =============================================================================

/// Destination for persisted state.
pub trait StateWriter {
    fn write_f64(&mut self, value: f64);
    fn write_u64(&mut self, value: u64);
    fn write_string_buffer(&mut self, value: &[u8]);

    fn write_bool(&mut self, value: bool) {
        self.write_u64(value as u64);
    }

    /// Signed timestamps are persisted as their unsigned bit pattern.
    fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }
}

/// Source of persisted state. Any failure aborts the enclosing load.
pub trait StateReader {
    fn read_f64(&mut self) -> Result<f64>;
    fn read_u64(&mut self) -> Result<u64>;
    fn read_string_buffer(&mut self) -> Result<Vec<u8>>;

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u64()? != 0)
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }
}

/// State that can be written to a sink and restored from a source.
pub trait Persist: Sized {
    /// Write the state in the latest layout.
    fn save<W: StateWriter + ?Sized>(&self, writer: &mut W);

    /// Read a state written with layout `version`.
    fn load<R: StateReader + ?Sized>(reader: &mut R, version: EncodingVersion) -> Result<Self>;
}

// =============================================================================
// Byte Encoder
// =============================================================================

/// Little-endian byte sink.
#[derive(Debug, Default)]
pub struct StateEncoder {
    buf: BytesMut,
}

impl StateEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl StateWriter for StateEncoder {
    fn write_f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    fn write_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    fn write_string_buffer(&mut self, value: &[u8]) {
        self.buf.put_u64_le(value.len() as u64);
        self.buf.put_slice(value);
    }
}

// =============================================================================
// Byte Decoder
// =============================================================================

/// Little-endian byte source over a borrowed buffer.
#[derive(Debug)]
pub struct StateDecoder<'a> {
    buf: &'a [u8],
}

impl<'a> StateDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(AegisError::DeserializeFailed(format!(
                "truncated input reading {}: need {} bytes, have {}",
                what,
                needed,
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}

impl StateReader for StateDecoder<'_> {
    fn read_f64(&mut self) -> Result<f64> {
        self.ensure(8, "double")?;
        Ok(self.buf.get_f64_le())
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8, "unsigned")?;
        Ok(self.buf.get_u64_le())
    }

    fn read_string_buffer(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u64()?;
        let len = usize::try_from(len).map_err(|_| {
            AegisError::DeserializeFailed(format!("string buffer length {} too large", len))
        })?;
        self.ensure(len, "string buffer")?;
        let mut out = vec![0u8; len];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }
}

// =============================================================================
// Convenience
// =============================================================================

/// Encode a state in the latest layout.
pub fn encode<T: Persist>(state: &T) -> Bytes {
    let mut encoder = StateEncoder::new();
    state.save(&mut encoder);
    encoder.into_bytes()
}

/// Decode a state written with layout `version`.
pub fn decode<T: Persist>(data: &[u8], version: EncodingVersion) -> Result<T> {
    check_version(version)?;
    let mut decoder = StateDecoder::new(data);
    T::load(&mut decoder, version).map_err(|err| {
        tracing::warn!("Failed to load persisted state ({}): {}", version, err);
        err
    })
}

/// Reject layouts newer than this build understands.
pub fn check_version(version: EncodingVersion) -> Result<()> {
    if version.is_supported() {
        Ok(())
    } else {
        Err(AegisError::UnsupportedEncodingVersion(version.0))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_layout() {
        let mut encoder = StateEncoder::new();
        encoder.write_f64(1.5);
        encoder.write_u64(7);
        encoder.write_bool(true);
        encoder.write_i64(-3);
        encoder.write_string_buffer(b"abc");
        assert_eq!(encoder.len(), 8 * 5 + 3);

        let bytes = encoder.into_bytes();
        assert_eq!(&bytes[..8], &1.5f64.to_le_bytes());

        let mut decoder = StateDecoder::new(&bytes);
        assert_eq!(decoder.read_f64().unwrap(), 1.5);
        assert_eq!(decoder.read_u64().unwrap(), 7);
        assert!(decoder.read_bool().unwrap());
        assert_eq!(decoder.read_i64().unwrap(), -3);
        assert_eq!(decoder.read_string_buffer().unwrap(), b"abc");
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_truncated_reads_fail_cleanly() {
        let mut decoder = StateDecoder::new(&[1, 2, 3]);
        let err = decoder.read_f64().unwrap_err();
        assert!(err.is_load_failure());

        // A declared length beyond the input must not allocate or panic.
        let mut encoder = StateEncoder::new();
        encoder.write_u64(u64::MAX);
        let bytes = encoder.into_bytes();
        let mut decoder = StateDecoder::new(&bytes);
        assert!(matches!(
            decoder.read_string_buffer(),
            Err(AegisError::DeserializeFailed(_))
        ));
    }

    #[test]
    fn test_version_check() {
        assert!(check_version(EncodingVersion::BASE).is_ok());
        assert!(check_version(EncodingVersion::LATEST).is_ok());
        assert!(matches!(
            check_version(EncodingVersion(EncodingVersion::LATEST.0 + 1)),
            Err(AegisError::UnsupportedEncodingVersion(_))
        ));
    }
}
