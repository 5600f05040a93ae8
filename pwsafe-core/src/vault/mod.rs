//! PasswordSafe v3 vault reader.
//!
//! Decrypts and authenticates a vault file and assembles its records.
//!
//! # File Structure
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              Header (152 bytes)          │  offset 0
//! │   magic, salt, iterations, verifier,     │
//! │   4 wrapped key blocks, IV               │
//! ├──────────────────────────────────────────┤
//! │                                          │
//! │     Field stream (Twofish-CBC, K)        │  offset 152
//! │                                          │
//! │   - header fields ... 0xFF               │
//! │   - record fields ... 0xFF   (repeated)  │
//! │                                          │
//! ├──────────────────────────────────────────┤
//! │      "PWS3-EOFPWS3-EOF" (16 bytes)       │
//! ├──────────────────────────────────────────┤
//! │      HMAC-SHA256 (L) (32 bytes)          │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Open Sequence
//!
//! 1. Parse the header and check the magic tag and iteration limit
//! 2. Stretch the passphrase with the salt and compare against the verifier
//! 3. Unwrap the data key `K` and the MAC key `L`
//! 4. Decrypt fields in order, absorbing each value into the HMAC
//! 5. Assemble records; drop a trailing unterminated one
//! 6. Compare the stored tag with the computed HMAC
//!
//! Any failure aborts the open; no partial result is returned.

pub mod crypto;
pub mod field;
mod file;
pub mod format;
pub mod header;
pub mod integrity;
pub mod records;
pub mod stream;


pub use crypto::{
    derive_working_keys, setup_decryption, stretch_key, verify_passphrase, BlockDecryptor,
    StretchedKey, WorkingKeys,
};
pub use field::{FieldReader, RawField};
pub use file::{open_vault, open_vault_bytes, OpenOptions, Vault};
pub use header::Header;
pub use integrity::{setup_integrity, verify, IntegrityAccumulator};
pub use records::read_records;
pub use stream::VaultStream;
