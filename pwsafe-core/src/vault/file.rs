//! Opening a vault: the full read pipeline from bytes to records.

use std::path::Path;

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};
use crate::record::Record;

use super::crypto::{
    derive_working_keys, setup_decryption, stretch_key, verify_passphrase,
};
use super::field::FieldReader;
use super::format::DEFAULT_MAX_ITERATIONS;
use super::header::Header;
use super::integrity::{setup_integrity, verify};
use super::records::read_records;
use super::stream::VaultStream;

/// Limits applied while opening a vault.
///
/// ```ignore
/// let options = OpenOptions::default().max_iterations(1 << 20);
/// let vault = Vault::open_with(&bytes, b"passphrase", &options)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    max_iterations: u32,
}

impl OpenOptions {
    /// Options with the default limits.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Sets the largest header iteration count that will be stretched.
    ///
    /// Files declaring more are rejected with [`VaultError::IterationLimit`]
    /// before any hashing starts.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// The configured iteration limit.
    #[must_use]
    pub const fn iteration_limit(&self) -> u32 {
        self.max_iterations
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A decrypted and authenticated vault.
///
/// Only produced once the passphrase has been verified and the stored HMAC
/// matched every decrypted field.
#[derive(Debug, Clone)]
pub struct Vault {
    header: Header,
    records: Vec<Record>,
}

impl Vault {
    /// Opens a vault held in memory.
    ///
    /// Steps, in order: parse the header, check the magic tag and the
    /// iteration limit, stretch the passphrase and check it, unwrap the
    /// working keys, decrypt and assemble the records, then verify the HMAC.
    /// Nothing is returned unless every step succeeds.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Format`] if the header or the trailing tag is short
    /// - [`VaultError::InvalidFormat`] if the magic tag is not `"PWS3"`
    /// - [`VaultError::IterationLimit`] if the header asks for too many rounds
    /// - [`VaultError::WrongPassword`] if the passphrase does not verify
    /// - [`VaultError::TruncatedStream`] if the field stream ends before the
    ///   end-of-file marker
    /// - [`VaultError::CorruptUuid`] or [`VaultError::CorruptTimestamp`] for
    ///   malformed record fields
    /// - [`VaultError::Integrity`] if the content does not match its tag or a
    ///   field length runs past the end of the file
    pub fn open_with(bytes: &[u8], passphrase: &[u8], options: &OpenOptions) -> VaultResult<Self> {
        let mut stream = VaultStream::new(bytes);

        let header = Header::parse(&mut stream)?;
        header.validate_magic()?;
        debug!(
            len = bytes.len(),
            iterations = header.iterations,
            "parsed vault header"
        );

        if header.iterations > options.max_iterations {
            return Err(VaultError::IterationLimit {
                iterations: header.iterations,
                limit: options.max_iterations,
            });
        }

        let stretched = stretch_key(passphrase, &header.salt, header.iterations);
        verify_passphrase(&header, &stretched)?;
        let keys = derive_working_keys(&header, &stretched)?;
        drop(stretched);

        let decryptor = setup_decryption(&keys, &header.iv)?;
        let mut integrity = setup_integrity(&keys)?;
        drop(keys);

        let mut fields = FieldReader::new(stream, decryptor);
        let records = read_records(&mut fields, &mut integrity)?;

        let mut stream = fields.into_stream();
        verify(&mut stream, integrity)?;
        if stream.remaining() > 0 {
            debug!(
                trailing = stream.remaining(),
                "ignoring bytes after authentication tag"
            );
        }

        debug!(records = records.len(), "vault opened");
        Ok(Self { header, records })
    }

    /// Reads and opens the vault at `path`.
    ///
    /// The file contents are zeroized once parsing finishes.
    ///
    /// # Errors
    ///
    /// [`VaultError::Io`] if the file cannot be read, otherwise as
    /// [`Vault::open_with`].
    pub fn open_file(
        path: impl AsRef<Path>,
        passphrase: &[u8],
        options: &OpenOptions,
    ) -> VaultResult<Self> {
        let path = path.as_ref();
        let bytes = Zeroizing::new(std::fs::read(path).map_err(|source| VaultError::Io {
            path: path.to_path_buf(),
            source,
        })?);
        debug!(path = %path.display(), "read vault file");
        Self::open_with(&bytes, passphrase, options)
    }

    /// The file header.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Completed records in file order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the vault, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Opens the vault at `path` with default options.
///
/// # Errors
///
/// See [`Vault::open_file`].
pub fn open_vault(path: impl AsRef<Path>, passphrase: &[u8]) -> VaultResult<Vault> {
    Vault::open_file(path, passphrase, &OpenOptions::default())
}

/// Opens an in-memory vault with default options.
///
/// # Errors
///
/// See [`Vault::open_with`].
pub fn open_vault_bytes(bytes: &[u8], passphrase: &[u8]) -> VaultResult<Vault> {
    Vault::open_with(bytes, passphrase, &OpenOptions::default())
}
