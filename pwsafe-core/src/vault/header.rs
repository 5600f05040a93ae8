//! Fixed-size file header.
//!
//! The header carries everything needed to check a passphrase and recover
//! the working keys. It is never encrypted.

use std::fmt;

use crate::error::{VaultError, VaultResult};

use super::format::{
    BLOCK_SIZE, FILE_MAGIC, HASH_SIZE, HEADER_SIZE, ITERATIONS_OFFSET, IV_OFFSET, SALT_OFFSET,
    SALT_SIZE, VERIFIER_OFFSET, WRAPPED_KEYS_OFFSET,
};
use super::stream::VaultStream;

/// Header at the start of every PasswordSafe v3 file.
///
/// # Binary Layout (152 bytes)
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic ("PWS3")
/// 4       32    salt
/// 36      4     iterations (u32 LE)
/// 40      32    verifier (SHA-256 of the stretched key)
/// 72      16    wrapped key block 1  (K, first half)
/// 88      16    wrapped key block 2  (K, second half)
/// 104     16    wrapped key block 3  (L, first half)
/// 120     16    wrapped key block 4  (L, second half)
/// 136     16    iv
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    /// Magic tag as read from the file.
    pub magic: [u8; 4],
    /// Salt for key stretching.
    pub salt: [u8; SALT_SIZE],
    /// Number of extra hash rounds applied while stretching.
    pub iterations: u32,
    /// SHA-256 of the stretched key, used to check the passphrase.
    pub verifier: [u8; HASH_SIZE],
    /// The four encrypted halves of the data key and the MAC key.
    pub wrapped_keys: [[u8; BLOCK_SIZE]; 4],
    /// CBC initialization vector for the field stream.
    pub iv: [u8; BLOCK_SIZE],
}

impl Header {
    /// Parses the header from the front of `stream`, consuming exactly
    /// [`HEADER_SIZE`] bytes.
    ///
    /// The magic tag is read but not checked; see [`Header::validate_magic`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Format`] if fewer than [`HEADER_SIZE`] bytes remain.
    pub fn parse(stream: &mut VaultStream<'_>) -> VaultResult<Self> {
        let remaining = stream.remaining();
        let bytes = stream.take(HEADER_SIZE).ok_or_else(|| {
            VaultError::format(format!(
                "file header too short: expected {HEADER_SIZE} bytes, got {remaining}"
            ))
        })?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..SALT_OFFSET]);

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[SALT_OFFSET..ITERATIONS_OFFSET]);

        let iterations = u32::from_le_bytes([
            bytes[ITERATIONS_OFFSET],
            bytes[ITERATIONS_OFFSET + 1],
            bytes[ITERATIONS_OFFSET + 2],
            bytes[ITERATIONS_OFFSET + 3],
        ]);

        let mut verifier = [0u8; HASH_SIZE];
        verifier.copy_from_slice(&bytes[VERIFIER_OFFSET..WRAPPED_KEYS_OFFSET]);

        let mut wrapped_keys = [[0u8; BLOCK_SIZE]; 4];
        for (i, block) in wrapped_keys.iter_mut().enumerate() {
            let start = WRAPPED_KEYS_OFFSET + i * BLOCK_SIZE;
            block.copy_from_slice(&bytes[start..start + BLOCK_SIZE]);
        }

        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(&bytes[IV_OFFSET..HEADER_SIZE]);

        Ok(Self {
            magic,
            salt,
            iterations,
            verifier,
            wrapped_keys,
            iv,
        })
    }

    /// Checks that the magic tag is `"PWS3"`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidFormat`] if the tag differs.
    pub fn validate_magic(&self) -> VaultResult<()> {
        if &self.magic != FILE_MAGIC {
            return Err(VaultError::InvalidFormat {
                expected: FILE_MAGIC,
                found: self.magic,
            });
        }
        Ok(())
    }

    /// Encodes the header to bytes.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..SALT_OFFSET].copy_from_slice(&self.magic);
        buf[SALT_OFFSET..ITERATIONS_OFFSET].copy_from_slice(&self.salt);
        buf[ITERATIONS_OFFSET..VERIFIER_OFFSET].copy_from_slice(&self.iterations.to_le_bytes());
        buf[VERIFIER_OFFSET..WRAPPED_KEYS_OFFSET].copy_from_slice(&self.verifier);
        for (i, block) in self.wrapped_keys.iter().enumerate() {
            let start = WRAPPED_KEYS_OFFSET + i * BLOCK_SIZE;
            buf[start..start + BLOCK_SIZE].copy_from_slice(block);
        }
        buf[IV_OFFSET..HEADER_SIZE].copy_from_slice(&self.iv);
        buf
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("magic", &String::from_utf8_lossy(&self.magic))
            .field("salt", &hex::encode(self.salt))
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            magic: *FILE_MAGIC,
            salt: [0x5a; SALT_SIZE],
            iterations: 2048,
            verifier: [0x11; HASH_SIZE],
            wrapped_keys: [[0x21; 16], [0x22; 16], [0x23; 16], [0x24; 16]],
            iv: [0x99; BLOCK_SIZE],
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample_header();
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);

        let mut stream = VaultStream::new(&encoded);
        let decoded = Header::parse(&mut stream).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn test_header_layout_offsets() {
        let encoded = sample_header().encode();

        assert_eq!(&encoded[0..4], b"PWS3");
        assert_eq!(&encoded[36..40], &2048u32.to_le_bytes());
        assert_eq!(encoded[72], 0x21);
        assert_eq!(encoded[120], 0x24);
        assert_eq!(encoded[136], 0x99);
    }

    #[test]
    fn test_header_consumes_only_its_region() {
        let mut bytes = sample_header().encode().to_vec();
        bytes.extend_from_slice(&[0xab; 20]);

        let mut stream = VaultStream::new(&bytes);
        Header::parse(&mut stream).unwrap();
        assert_eq!(stream.position(), HEADER_SIZE);
        assert_eq!(stream.remaining(), 20);
    }

    #[test]
    fn test_header_too_short() {
        let encoded = sample_header().encode();
        let mut stream = VaultStream::new(&encoded[..HEADER_SIZE - 1]);

        let result = Header::parse(&mut stream);
        assert!(matches!(result, Err(VaultError::Format { .. })));
    }

    #[test]
    fn test_header_invalid_magic() {
        let mut header = sample_header();
        assert!(header.validate_magic().is_ok());

        header.magic = *b"PWS2";
        let result = header.validate_magic();
        assert!(matches!(
            result,
            Err(VaultError::InvalidFormat { found, .. }) if &found == b"PWS2"
        ));
    }

    #[test]
    fn test_header_debug_hides_key_material() {
        let rendered = format!("{:?}", sample_header());
        assert!(rendered.contains("iterations: 2048"));
        assert!(!rendered.contains("wrapped_keys"));
    }
}
