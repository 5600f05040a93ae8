//! Reader for PasswordSafe v3 (`.psafe3`) vault files.
//!
//! Opens a vault with its master passphrase, decrypts the field stream, and
//! returns the credential records once the file's HMAC has been verified.
//!
//! ```no_run
//! let vault = pwsafe_core::open_vault("passwords.psafe3", b"correct horse")?;
//! for record in vault.records() {
//!     println!("{} ({})", record.title, record.username);
//! }
//! # Ok::<(), pwsafe_core::VaultError>(())
//! ```
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
// Format names like PasswordSafe appear in docs without backticks
#![allow(clippy::doc_markdown)]

mod error;
pub use error::*;

mod record;
pub use record::Record;

pub mod vault;
pub use vault::{open_vault, open_vault_bytes, OpenOptions, Vault};

#[cfg(any(test, feature = "test-utils"))]
pub mod fixture;
