//! Key stretching, key unwrapping and the field-stream block decryptor.
//!
//! The passphrase is stretched with iterated SHA-256. The stretched key both
//! authenticates the passphrase (via the header's verifier) and unwraps the
//! two working keys with single-block Twofish. The data key then drives a
//! Twofish-CBC decryptor over the field stream.

use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use secrecy::{ExposeSecret, SecretBox};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use twofish::cipher::{Block, BlockDecrypt, KeyInit};
use twofish::Twofish;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{VaultError, VaultResult};

use super::format::{BLOCK_SIZE, HASH_SIZE, SALT_SIZE};
use super::header::Header;

type TwofishCbcDec = cbc::Decryptor<Twofish>;

/// Passphrase-derived key (256-bit).
///
/// Recomputed on every open and never stored. The key is zeroized on drop
/// and never printed.
pub struct StretchedKey(SecretBox<[u8; HASH_SIZE]>);

impl StretchedKey {
    /// Returns the raw key bytes.
    #[must_use]
    pub fn expose(&self) -> &[u8; HASH_SIZE] {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for StretchedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StretchedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Stretches a passphrase.
///
/// Computes `SHA256(passphrase || salt)` and then re-hashes the digest
/// exactly `iterations` times. Zero iterations yields the single initial
/// hash. The loop never exits early, so the cost depends only on
/// `iterations`.
#[must_use]
pub fn stretch_key(passphrase: &[u8], salt: &[u8; SALT_SIZE], iterations: u32) -> StretchedKey {
    let mut digest = Zeroizing::new([0u8; HASH_SIZE]);
    digest.copy_from_slice(
        &Sha256::new()
            .chain_update(passphrase)
            .chain_update(salt)
            .finalize(),
    );

    for _ in 0..iterations {
        let next = Sha256::digest(digest.as_slice());
        digest.copy_from_slice(&next);
    }

    StretchedKey(SecretBox::new(Box::new(*digest)))
}

/// Checks the stretched key against the header's verifier.
///
/// The comparison is constant-time. This must succeed before any field is
/// decrypted.
///
/// # Errors
///
/// Returns [`VaultError::WrongPassword`] if `SHA256(stretched_key)` does not
/// match the stored verifier.
pub fn verify_passphrase(header: &Header, key: &StretchedKey) -> VaultResult<()> {
    let computed = Sha256::digest(key.expose());
    if bool::from(computed.as_slice().ct_eq(&header.verifier)) {
        Ok(())
    } else {
        Err(VaultError::WrongPassword)
    }
}

/// The two working keys recovered from the header.
///
/// `K` decrypts the field stream; `L` keys the HMAC over field contents.
/// Both are zeroized on drop.
pub struct WorkingKeys {
    data_key: Zeroizing<[u8; HASH_SIZE]>,
    mac_key: Zeroizing<[u8; HASH_SIZE]>,
}

impl WorkingKeys {
    /// The 32-byte data-decryption key (`K`).
    #[must_use]
    pub fn data_key(&self) -> &[u8; HASH_SIZE] {
        &self.data_key
    }

    /// The 32-byte integrity key (`L`).
    #[must_use]
    pub fn mac_key(&self) -> &[u8; HASH_SIZE] {
        &self.mac_key
    }
}

impl std::fmt::Debug for WorkingKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WorkingKeys([redacted])")
    }
}

/// Unwraps `K` (blocks 1 and 2) and `L` (blocks 3 and 4).
///
/// Each block is an independent single-block Twofish decryption under the
/// stretched key; no chaining state is shared between them.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if Twofish rejects the key.
pub fn derive_working_keys(header: &Header, key: &StretchedKey) -> VaultResult<WorkingKeys> {
    let cipher = Twofish::new_from_slice(key.expose())
        .map_err(|e| VaultError::crypto(format!("twofish key setup: {e}")))?;

    let mut data_key = Zeroizing::new([0u8; HASH_SIZE]);
    let mut mac_key = Zeroizing::new([0u8; HASH_SIZE]);

    let [b1, b2, b3, b4] = &header.wrapped_keys;
    unwrap_block(&cipher, b1, &mut data_key[..BLOCK_SIZE]);
    unwrap_block(&cipher, b2, &mut data_key[BLOCK_SIZE..]);
    unwrap_block(&cipher, b3, &mut mac_key[..BLOCK_SIZE]);
    unwrap_block(&cipher, b4, &mut mac_key[BLOCK_SIZE..]);

    Ok(WorkingKeys { data_key, mac_key })
}

fn unwrap_block(cipher: &Twofish, wrapped: &[u8; BLOCK_SIZE], out: &mut [u8]) {
    let mut block = Block::<Twofish>::clone_from_slice(wrapped);
    cipher.decrypt_block(&mut block);
    out.copy_from_slice(&block);
    block.as_mut_slice().zeroize();
}

/// Twofish-CBC decryptor for the field stream.
///
/// Blocks must be fed in file order: each plaintext depends on the previous
/// ciphertext block.
pub struct BlockDecryptor {
    inner: TwofishCbcDec,
}

impl BlockDecryptor {
    /// Creates a decryptor positioned at the first block of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] if the key or IV length is rejected.
    pub fn new(data_key: &[u8; HASH_SIZE], iv: &[u8; BLOCK_SIZE]) -> VaultResult<Self> {
        let inner = TwofishCbcDec::new_from_slices(data_key, iv)
            .map_err(|e| VaultError::crypto(format!("twofish-cbc setup: {e}")))?;
        Ok(Self { inner })
    }

    /// Decrypts the next ciphertext block of the stream.
    pub fn decrypt_block(&mut self, ciphertext: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut block = Block::<TwofishCbcDec>::clone_from_slice(ciphertext);
        self.inner.decrypt_block_mut(&mut block);
        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&block);
        block.as_mut_slice().zeroize();
        out
    }
}

impl std::fmt::Debug for BlockDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDecryptor").finish_non_exhaustive()
    }
}

/// Initializes the CBC decryptor with `K` and the header IV.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if the key or IV length is rejected.
pub fn setup_decryption(keys: &WorkingKeys, iv: &[u8; BLOCK_SIZE]) -> VaultResult<BlockDecryptor> {
    BlockDecryptor::new(keys.data_key(), iv)
}
