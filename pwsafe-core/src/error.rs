//! Error types for opening a vault.
//!
//! Every variant is terminal: a corrupt vault or a rejected passphrase cannot
//! be salvaged by retrying with the same inputs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening a PasswordSafe v3 vault.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault file could not be read.
    #[error("failed to read vault file {path}: {source}")]
    Io {
        /// Path of the file being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The byte stream is too short for a fixed-size region.
    #[error("malformed vault: {context}")]
    Format {
        /// Which region was being read.
        context: String,
    },

    /// The magic tag does not identify a PasswordSafe v3 file.
    #[error("not a PasswordSafe v3 file: expected magic {expected:?}, found {found:?}")]
    InvalidFormat {
        /// Expected magic bytes.
        expected: &'static [u8; 4],
        /// Bytes found at the start of the file.
        found: [u8; 4],
    },

    /// The header declares more key-stretching iterations than allowed.
    #[error("iteration count {iterations} exceeds the configured limit of {limit}")]
    IterationLimit {
        /// Iteration count stored in the header.
        iterations: u32,
        /// Maximum accepted by the open options.
        limit: u32,
    },

    /// The passphrase does not match the stored verification hash.
    #[error("invalid passphrase")]
    WrongPassword,

    /// Cipher or MAC key setup failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The field stream ended before a field, or the end-of-file marker, was complete.
    #[error("truncated field stream: {context}")]
    TruncatedStream {
        /// What was being read when the stream ran out.
        context: String,
    },

    /// A UUID field did not contain exactly 16 bytes.
    #[error("corrupt UUID field: expected 16 bytes, found {len}")]
    CorruptUuid {
        /// Length of the offending field.
        len: usize,
    },

    /// A timestamp field was neither 4 nor 8 bytes long.
    #[error("corrupt timestamp field 0x{field_type:02x}: unexpected length {len}")]
    CorruptTimestamp {
        /// Type tag of the offending field.
        field_type: u8,
        /// Length of the offending field.
        len: usize,
    },

    /// The stored authentication tag does not match the decrypted content, or
    /// a decrypted field declares more data than the file holds.
    #[error("vault integrity check failed")]
    Integrity,
}

impl VaultError {
    /// Creates a format error.
    pub fn format<S: Into<String>>(context: S) -> Self {
        Self::Format {
            context: context.into(),
        }
    }

    /// Creates a truncated stream error.
    pub fn truncated<S: Into<String>>(context: S) -> Self {
        Self::TruncatedStream {
            context: context.into(),
        }
    }

    /// Creates a crypto error.
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto(message.into())
    }
}

/// Result type alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::InvalidFormat {
            expected: b"PWS3",
            found: *b"PK\x03\x04",
        };
        assert!(format!("{err}").contains("not a PasswordSafe v3 file"));

        let err = VaultError::CorruptTimestamp {
            field_type: 0x0c,
            len: 3,
        };
        assert_eq!(
            format!("{err}"),
            "corrupt timestamp field 0x0c: unexpected length 3"
        );

        let err = VaultError::truncated("field body");
        assert!(format!("{err}").contains("field body"));
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;

        let err = VaultError::Io {
            path: PathBuf::from("missing.psafe3"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.source().is_some());
        assert!(format!("{err}").contains("missing.psafe3"));
    }
}
