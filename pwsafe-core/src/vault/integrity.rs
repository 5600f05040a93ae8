//! HMAC-SHA256 integrity check over decrypted field contents.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{VaultError, VaultResult};

use super::crypto::WorkingKeys;
use super::format::{HASH_SIZE, HMAC_SIZE};
use super::stream::VaultStream;

type HmacSha256 = Hmac<Sha256>;

/// Running HMAC over the plaintext value of every absorbed field.
///
/// Only field values are fed in; length prefixes, type tags, padding and
/// end-of-block markers are not.
#[derive(Clone)]
pub struct IntegrityAccumulator {
    mac: HmacSha256,
}

impl IntegrityAccumulator {
    /// Creates an empty accumulator keyed by `mac_key`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] if the MAC rejects the key.
    pub fn new(mac_key: &[u8; HASH_SIZE]) -> VaultResult<Self> {
        let mac = HmacSha256::new_from_slice(mac_key)
            .map_err(|e| VaultError::crypto(format!("hmac init: {e}")))?;
        Ok(Self { mac })
    }

    /// Feeds one field value into the digest.
    pub fn absorb(&mut self, value: &[u8]) {
        self.mac.update(value);
    }

    /// Compares the finalized digest with `stored` in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Integrity`] on mismatch.
    pub fn verify_tag(self, stored: &[u8; HMAC_SIZE]) -> VaultResult<()> {
        self.mac
            .verify_slice(stored)
            .map_err(|_| VaultError::Integrity)
    }
}

impl std::fmt::Debug for IntegrityAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityAccumulator").finish_non_exhaustive()
    }
}

/// Initializes the accumulator keyed by `L`.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if the MAC rejects the key.
pub fn setup_integrity(keys: &WorkingKeys) -> VaultResult<IntegrityAccumulator> {
    IntegrityAccumulator::new(keys.mac_key())
}

/// Reads the stored tag that follows the end-of-file marker and checks it.
///
/// Bytes after the tag are ignored.
///
/// # Errors
///
/// - [`VaultError::Format`] if fewer than 32 bytes remain
/// - [`VaultError::Integrity`] if the tag does not match
pub fn verify(stream: &mut VaultStream<'_>, accumulator: IntegrityAccumulator) -> VaultResult<()> {
    let remaining = stream.remaining();
    let stored: [u8; HMAC_SIZE] = stream.take_array().ok_or_else(|| {
        VaultError::format(format!(
            "authentication tag too short: expected {HMAC_SIZE} bytes, got {remaining}"
        ))
    })?;
    accumulator.verify_tag(&stored)
}
