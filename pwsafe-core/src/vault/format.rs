//! File format constants and layout definitions.
//!
//! This module defines the binary layout of a PasswordSafe v3 file: the
//! magic tag, header offsets, block geometry and the field type tags the
//! reader understands.

// Layout comments describe binary structure, not Rust identifiers
#![allow(clippy::doc_markdown)]

/// Magic bytes at the start of every PasswordSafe v3 file.
pub const FILE_MAGIC: &[u8; 4] = b"PWS3";

/// Unencrypted block that terminates the field stream.
pub const EOF_MARKER: &[u8; BLOCK_SIZE] = b"PWS3-EOFPWS3-EOF";

/// Twofish block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Size of SHA-256 output, and of every 256-bit key in the file.
pub const HASH_SIZE: usize = 32;

/// Size of the salt in the header.
pub const SALT_SIZE: usize = 32;

/// Size of the trailing HMAC-SHA256 tag.
pub const HMAC_SIZE: usize = 32;

/// Size of the file header in bytes.
/// Layout: magic(4) + salt(32) + iter(4) + hash(32) + 4 * wrapped(16) + iv(16) = 152
pub const HEADER_SIZE: usize = 152;

/// Offset of the salt.
pub const SALT_OFFSET: usize = 4;

/// Offset of the iteration count (u32 LE).
pub const ITERATIONS_OFFSET: usize = 36;

/// Offset of the stretched-key verification hash.
pub const VERIFIER_OFFSET: usize = 40;

/// Offset of the first of the four wrapped key blocks.
pub const WRAPPED_KEYS_OFFSET: usize = 72;

/// Offset of the CBC initialization vector.
pub const IV_OFFSET: usize = 136;

/// Bytes of a field's first block taken by its length prefix and type tag.
/// Layout: length(4) + type(1)
pub const FIELD_PREFIX_SIZE: usize = 5;

/// Payload bytes carried by a field's first block.
pub const FIRST_BLOCK_PAYLOAD: usize = BLOCK_SIZE - FIELD_PREFIX_SIZE;

/// Default upper bound on the header's iteration count.
pub const DEFAULT_MAX_ITERATIONS: u32 = 1 << 24;

// Field Types

/// Terminates the header field block and each record.
pub const FIELD_END_OF_BLOCK: u8 = 0xff;

/// Record UUID (16 bytes).
pub const FIELD_UUID: u8 = 0x01;

/// Group, dot-separated for nesting.
pub const FIELD_GROUP: u8 = 0x02;

/// Entry title.
pub const FIELD_TITLE: u8 = 0x03;

/// Username.
pub const FIELD_USERNAME: u8 = 0x04;

/// Free-form notes.
pub const FIELD_NOTES: u8 = 0x05;

/// Password.
pub const FIELD_PASSWORD: u8 = 0x06;

/// Creation time (Unix seconds).
pub const FIELD_CREATION_TIME: u8 = 0x07;

/// Password modification time (Unix seconds).
pub const FIELD_PASSWORD_MODIFIED: u8 = 0x08;

/// Last modification time (Unix seconds).
pub const FIELD_LAST_MODIFIED: u8 = 0x0c;

/// URL.
pub const FIELD_URL: u8 = 0x0d;

/// E-mail address.
pub const FIELD_EMAIL: u8 = 0x14;

/// Protected entry flag (1 byte).
pub const FIELD_PROTECTED: u8 = 0x15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_constants() {
        assert_eq!(
            HEADER_SIZE,
            FILE_MAGIC.len() + SALT_SIZE + 4 + HASH_SIZE + 4 * BLOCK_SIZE + BLOCK_SIZE
        );
        assert_eq!(IV_OFFSET + BLOCK_SIZE, HEADER_SIZE);
        assert_eq!(WRAPPED_KEYS_OFFSET, VERIFIER_OFFSET + HASH_SIZE);
        assert_eq!(EOF_MARKER.len(), BLOCK_SIZE);
        assert_eq!(FIRST_BLOCK_PAYLOAD, 11);
    }
}
