//! Field stream reader.
//!
//! After the header the file is a sequence of Twofish-CBC blocks. Each field
//! starts a new block:
//!
//! ```text
//! first block (decrypted)
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     length (u32 LE)
//! 4       1     type
//! 5       11    value[0..11]
//!
//! continuation blocks (only if length > 11)
//! 0       16    value[11..] ... trailing padding
//! ```
//!
//! The stream ends with the unencrypted block `"PWS3-EOFPWS3-EOF"`.

use std::fmt;

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

use super::crypto::BlockDecryptor;
use super::format::{
    BLOCK_SIZE, EOF_MARKER, FIELD_END_OF_BLOCK, FIELD_PREFIX_SIZE, FIRST_BLOCK_PAYLOAD,
};
use super::stream::VaultStream;

/// One decrypted, length-tagged field.
#[derive(Clone, PartialEq, Eq)]
pub struct RawField {
    /// Declared length of the value.
    pub length: u32,
    /// Field type tag.
    pub field_type: u8,
    /// Exactly `length` bytes of plaintext, zeroized on drop.
    pub value: Zeroizing<Vec<u8>>,
}

impl RawField {
    /// Whether this field closes the header block or a record.
    #[must_use]
    pub const fn is_end_of_block(&self) -> bool {
        self.field_type == FIELD_END_OF_BLOCK
    }
}

impl fmt::Debug for RawField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawField")
            .field("length", &self.length)
            .field("field_type", &format_args!("0x{:02x}", self.field_type))
            .finish_non_exhaustive()
    }
}

/// Number of blocks following the first one for a field of `length` bytes.
///
/// The first block carries 11 value bytes; every further block carries 16.
#[must_use]
pub const fn continuation_blocks(length: u32) -> u64 {
    if length as usize <= FIRST_BLOCK_PAYLOAD {
        0
    } else {
        (length as u64 + 4) / BLOCK_SIZE as u64
    }
}

/// Pulls fields from the encrypted stream, one at a time, in file order.
pub struct FieldReader<'a> {
    stream: VaultStream<'a>,
    decryptor: BlockDecryptor,
    at_eof: bool,
}

impl<'a> FieldReader<'a> {
    /// Creates a reader positioned at the first field block.
    #[must_use]
    pub const fn new(stream: VaultStream<'a>, decryptor: BlockDecryptor) -> Self {
        Self {
            stream,
            decryptor,
            at_eof: false,
        }
    }

    /// Reads the next field.
    ///
    /// Returns `Ok(None)` once the end-of-file marker has been consumed, and
    /// on every call after that without touching the stream again.
    ///
    /// # Errors
    ///
    /// - [`VaultError::TruncatedStream`] if the stream ends at a block boundary
    ///   before the end-of-file marker, or inside a block
    /// - [`VaultError::Integrity`] if a field declares more blocks than the
    ///   stream holds. The key has already been verified at this point, so an
    ///   impossible length means the ciphertext was altered.
    pub fn read_field(&mut self) -> VaultResult<Option<RawField>> {
        if self.at_eof {
            return Ok(None);
        }

        let offset = self.stream.position();
        let remaining = self.stream.remaining();
        let first: [u8; BLOCK_SIZE] = self.stream.take_array().ok_or_else(|| {
            VaultError::truncated(format!(
                "expected a field block or end-of-file marker at offset {offset}, \
                 {remaining} bytes left"
            ))
        })?;

        if &first == EOF_MARKER {
            self.at_eof = true;
            return Ok(None);
        }

        let plain = Zeroizing::new(self.decryptor.decrypt_block(&first));
        let length = u32::from_le_bytes([plain[0], plain[1], plain[2], plain[3]]);
        let field_type = plain[4];

        let extra = continuation_blocks(length);
        let needed = extra * BLOCK_SIZE as u64;
        let remaining = self.stream.remaining();
        if needed > remaining as u64 {
            debug!(offset, needed, remaining, "field length runs past the end of the stream");
            return Err(VaultError::Integrity);
        }

        // Bounded by `remaining` above.
        let needed = usize::try_from(needed).unwrap_or(remaining);
        let mut value = Zeroizing::new(Vec::with_capacity(FIRST_BLOCK_PAYLOAD + needed));
        value.extend_from_slice(&plain[FIELD_PREFIX_SIZE..]);

        for _ in 0..extra {
            let block: [u8; BLOCK_SIZE] = self
                .stream
                .take_array()
                .ok_or_else(|| VaultError::truncated("field continuation block"))?;
            let plain = Zeroizing::new(self.decryptor.decrypt_block(&block));
            value.extend_from_slice(plain.as_slice());
        }

        value.truncate(usize::try_from(length).unwrap_or(usize::MAX));

        Ok(Some(RawField {
            length,
            field_type,
            value,
        }))
    }

    /// Hands back the underlying stream, positioned after the last block read.
    #[must_use]
    pub fn into_stream(self) -> VaultStream<'a> {
        self.stream
    }
}

impl fmt::Debug for FieldReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldReader")
            .field("offset", &self.stream.position())
            .field("at_eof", &self.at_eof)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::fixture::{self, FIXTURE_DATA_KEY, FIXTURE_IV};

    fn decryptor() -> BlockDecryptor {
        fixture::decryptor(&FIXTURE_DATA_KEY, &FIXTURE_IV)
    }

    fn stream_of(fields: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut bytes = fixture::encrypt_fields(&FIXTURE_DATA_KEY, &FIXTURE_IV, fields);
        bytes.extend_from_slice(EOF_MARKER);
        bytes
    }

    #[test_case(0, 0 ; "empty")]
    #[test_case(11, 0 ; "fits first block")]
    #[test_case(12, 1 ; "one continuation")]
    #[test_case(27, 1 ; "fills two blocks")]
    #[test_case(28, 2 ; "spills into third block")]
    #[test_case(u32::MAX, 268_435_456 ; "max length")]
    fn test_continuation_blocks(length: u32, expected: u64) {
        assert_eq!(continuation_blocks(length), expected);
    }

    #[test_case(0 ; "empty value")]
    #[test_case(11 ; "exactly one block")]
    #[test_case(12 ; "one continuation block")]
    #[test_case(27 ; "exactly two blocks")]
    #[test_case(300 ; "many blocks")]
    fn test_field_roundtrip(len: usize) {
        let value: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let bytes = stream_of(&[(0x05, value.clone()), (0x03, b"next".to_vec())]);

        let mut reader = FieldReader::new(VaultStream::new(&bytes), decryptor());
        let field = reader.read_field().unwrap().unwrap();
        assert_eq!(field.length as usize, len);
        assert_eq!(field.field_type, 0x05);
        assert_eq!(field.value.as_slice(), value.as_slice());

        // The following field decrypts correctly, so CBC state stayed in step.
        let next = reader.read_field().unwrap().unwrap();
        assert_eq!(next.field_type, 0x03);
        assert_eq!(next.value.as_slice(), b"next");

        assert!(reader.read_field().unwrap().is_none());
    }

    #[test]
    fn test_block_usage_per_length() {
        let eleven = fixture::encrypt_fields(&FIXTURE_DATA_KEY, &FIXTURE_IV, &[(1, vec![0; 11])]);
        let twelve = fixture::encrypt_fields(&FIXTURE_DATA_KEY, &FIXTURE_IV, &[(1, vec![0; 12])]);
        let empty = fixture::encrypt_fields(&FIXTURE_DATA_KEY, &FIXTURE_IV, &[(1, vec![])]);

        assert_eq!(eleven.len(), BLOCK_SIZE);
        assert_eq!(twelve.len(), 2 * BLOCK_SIZE);
        assert_eq!(empty.len(), BLOCK_SIZE);
    }

    #[test]
    fn test_end_of_block_marker() {
        let bytes = stream_of(&[(FIELD_END_OF_BLOCK, Vec::new())]);
        let mut reader = FieldReader::new(VaultStream::new(&bytes), decryptor());

        let field = reader.read_field().unwrap().unwrap();
        assert!(field.is_end_of_block());
        assert_eq!(field.length, 0);
        assert!(field.value.is_empty());
    }

    #[test]
    fn test_eof_marker_is_sticky() {
        let mut bytes = stream_of(&[(0x03, b"title".to_vec())]);
        bytes.extend_from_slice(&[0xee; 32]);

        let mut reader = FieldReader::new(VaultStream::new(&bytes), decryptor());
        assert!(reader.read_field().unwrap().is_some());
        assert!(reader.read_field().unwrap().is_none());
        assert!(reader.read_field().unwrap().is_none());

        // The bytes after the marker are left for the integrity check.
        assert_eq!(reader.into_stream().remaining(), 32);
    }

    #[test]
    fn test_missing_eof_marker() {
        let bytes = fixture::encrypt_fields(&FIXTURE_DATA_KEY, &FIXTURE_IV, &[(0x03, b"x".to_vec())]);
        let mut reader = FieldReader::new(VaultStream::new(&bytes), decryptor());

        assert!(reader.read_field().unwrap().is_some());
        assert!(matches!(
            reader.read_field(),
            Err(VaultError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_length_past_end_of_stream() {
        let mut bytes =
            fixture::encrypt_fields(&FIXTURE_DATA_KEY, &FIXTURE_IV, &[(0x05, vec![0x41; 40])]);
        bytes.truncate(2 * BLOCK_SIZE);

        let mut reader = FieldReader::new(VaultStream::new(&bytes), decryptor());
        assert!(matches!(reader.read_field(), Err(VaultError::Integrity)));
    }

    #[test]
    fn test_partial_block() {
        let bytes = [0u8; BLOCK_SIZE - 3];
        let mut reader = FieldReader::new(VaultStream::new(&bytes), decryptor());
        assert!(matches!(
            reader.read_field(),
            Err(VaultError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_debug_hides_value() {
        let field = RawField {
            length: 6,
            field_type: 0x06,
            value: Zeroizing::new(b"secret".to_vec()),
        };
        let rendered = format!("{field:?}");
        assert!(rendered.contains("0x06"));
        assert!(!rendered.contains("secret"));
    }
}
