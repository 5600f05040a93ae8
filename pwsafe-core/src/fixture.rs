//! Builders for synthetic vault files.
//!
//! Produces byte-exact PasswordSafe v3 files from a list of plaintext fields,
//! so readers can be tested without shipping binary fixtures. Keys, salt and
//! IV are fixed, making every build deterministic.

use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use twofish::cipher::{Block, BlockEncrypt, KeyInit};
use twofish::Twofish;

use crate::vault::crypto::{stretch_key, BlockDecryptor};
use crate::vault::format::{
    BLOCK_SIZE, EOF_MARKER, FIELD_END_OF_BLOCK, FIELD_PREFIX_SIZE, FILE_MAGIC, HASH_SIZE,
    HMAC_SIZE, SALT_SIZE,
};
use crate::vault::header::Header;

type TwofishCbcEnc = cbc::Encryptor<Twofish>;

/// Passphrase used by most fixtures.
pub const FIXTURE_PASSPHRASE: &str = "test123";

/// Default stretching rounds for fixtures.
pub const FIXTURE_ITERATIONS: u32 = 2048;

/// Default salt.
pub const FIXTURE_SALT: [u8; SALT_SIZE] = [0x5a; SALT_SIZE];

/// Data key (`K`) wrapped into every fixture.
pub const FIXTURE_DATA_KEY: [u8; HASH_SIZE] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
    0x0f, 0x1e, 0x2d, 0x3c, 0x4b, 0x5a, 0x69, 0x78, 0x87, 0x96, 0xa5, 0xb4, 0xc3, 0xd2, 0xe1, 0xf0,
];

/// Integrity key (`L`) wrapped into every fixture.
pub const FIXTURE_MAC_KEY: [u8; HASH_SIZE] = [0x6c; HASH_SIZE];

/// CBC IV for the field stream.
pub const FIXTURE_IV: [u8; BLOCK_SIZE] = [
    0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xab, 0xac, 0xad, 0xae, 0xaf,
];

/// Header field type carrying the format version.
pub const HEADER_VERSION: u8 = 0x00;

/// Filler for the unused tail of a field's last block.
const PADDING_BYTE: u8 = 0xc7;

/// Builds a complete vault file.
///
/// ```ignore
/// let bytes = VaultBuilder::new("test123")
///     .record(&[(FIELD_TITLE, b"Example"), (FIELD_PASSWORD, b"secret")])
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct VaultBuilder {
    passphrase: Vec<u8>,
    salt: [u8; SALT_SIZE],
    iterations: u32,
    fields: Vec<(u8, Vec<u8>)>,
    eof_marker: bool,
}

impl VaultBuilder {
    /// Starts a vault with a version header field and its end-of-block marker.
    #[must_use]
    pub fn new(passphrase: impl AsRef<[u8]>) -> Self {
        Self::bare(passphrase)
            .field(HEADER_VERSION, [0x0d_u8, 0x03])
            .end_of_block()
    }

    /// Starts a vault with an empty field stream.
    #[must_use]
    pub fn bare(passphrase: impl AsRef<[u8]>) -> Self {
        Self {
            passphrase: passphrase.as_ref().to_vec(),
            salt: FIXTURE_SALT,
            iterations: FIXTURE_ITERATIONS,
            fields: Vec::new(),
            eof_marker: true,
        }
    }

    /// Sets the stretching rounds recorded in the header.
    #[must_use]
    pub const fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the salt recorded in the header.
    #[must_use]
    pub const fn salt(mut self, salt: [u8; SALT_SIZE]) -> Self {
        self.salt = salt;
        self
    }

    /// Appends one field.
    #[must_use]
    pub fn field(mut self, field_type: u8, value: impl AsRef<[u8]>) -> Self {
        self.fields.push((field_type, value.as_ref().to_vec()));
        self
    }

    /// Appends an end-of-block marker.
    #[must_use]
    pub fn end_of_block(self) -> Self {
        self.field(FIELD_END_OF_BLOCK, [0u8; 0])
    }

    /// Appends a record's fields followed by its end-of-block marker.
    #[must_use]
    pub fn record(self, fields: &[(u8, &[u8])]) -> Self {
        fields
            .iter()
            .fold(self, |builder, (field_type, value)| {
                builder.field(*field_type, value)
            })
            .end_of_block()
    }

    /// Leaves out the end-of-file marker (and with it the HMAC).
    #[must_use]
    pub const fn without_eof_marker(mut self) -> Self {
        self.eof_marker = false;
        self
    }

    /// The header this builder writes.
    ///
    /// # Panics
    ///
    /// Never for the fixed fixture keys.
    #[must_use]
    pub fn header(&self) -> Header {
        let stretched = stretch_key(&self.passphrase, &self.salt, self.iterations);

        let mut verifier = [0u8; HASH_SIZE];
        verifier.copy_from_slice(&Sha256::digest(stretched.expose()));

        let cipher = Twofish::new_from_slice(stretched.expose()).expect("32-byte twofish key");
        let mut wrapped_keys = [[0u8; BLOCK_SIZE]; 4];
        let halves = FIXTURE_DATA_KEY
            .chunks(BLOCK_SIZE)
            .chain(FIXTURE_MAC_KEY.chunks(BLOCK_SIZE));
        for (slot, half) in wrapped_keys.iter_mut().zip(halves) {
            let mut block = Block::<Twofish>::clone_from_slice(half);
            cipher.encrypt_block(&mut block);
            slot.copy_from_slice(&block);
        }

        Header {
            magic: *FILE_MAGIC,
            salt: self.salt,
            iterations: self.iterations,
            verifier,
            wrapped_keys,
            iv: FIXTURE_IV,
        }
    }

    /// HMAC over the values of every non-marker field.
    ///
    /// # Panics
    ///
    /// Never; HMAC accepts keys of any length.
    #[must_use]
    pub fn expected_hmac(&self) -> [u8; HMAC_SIZE] {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&FIXTURE_MAC_KEY).expect("hmac key");
        for (field_type, value) in &self.fields {
            if *field_type != FIELD_END_OF_BLOCK {
                mac.update(value);
            }
        }
        let mut tag = [0u8; HMAC_SIZE];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        tag
    }

    /// Serializes the vault.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = self.header().encode().to_vec();
        bytes.extend(encrypt_fields(&FIXTURE_DATA_KEY, &FIXTURE_IV, &self.fields));
        if self.eof_marker {
            bytes.extend_from_slice(EOF_MARKER);
            bytes.extend_from_slice(&self.expected_hmac());
        }
        bytes
    }
}

/// Encrypts `fields` as one Twofish-CBC stream, without the end-of-file marker.
///
/// # Panics
///
/// Panics if a value is longer than `u32::MAX` bytes.
#[must_use]
pub fn encrypt_fields(
    data_key: &[u8; HASH_SIZE],
    iv: &[u8; BLOCK_SIZE],
    fields: &[(u8, Vec<u8>)],
) -> Vec<u8> {
    let mut encryptor =
        TwofishCbcEnc::new_from_slices(data_key, iv).expect("32-byte key and 16-byte iv");
    let mut out = Vec::new();

    for (field_type, value) in fields {
        let length = u32::try_from(value.len()).expect("field value fits in u32");

        let mut plain = Vec::with_capacity(FIELD_PREFIX_SIZE + value.len() + BLOCK_SIZE);
        plain.extend_from_slice(&length.to_le_bytes());
        plain.push(*field_type);
        plain.extend_from_slice(value);
        plain.resize(plain.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, PADDING_BYTE);

        for chunk in plain.chunks(BLOCK_SIZE) {
            let mut block = Block::<TwofishCbcEnc>::clone_from_slice(chunk);
            encryptor.encrypt_block_mut(&mut block);
            out.extend_from_slice(&block);
        }
    }
    out
}

/// A decryptor matching [`encrypt_fields`] for the same key and IV.
///
/// # Panics
///
/// Never for well-sized inputs.
#[must_use]
pub fn decryptor(data_key: &[u8; HASH_SIZE], iv: &[u8; BLOCK_SIZE]) -> BlockDecryptor {
    BlockDecryptor::new(data_key, iv).expect("32-byte key and 16-byte iv")
}
