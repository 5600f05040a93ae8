//! Forward-only cursor over the in-memory vault bytes.

/// Reads fixed-size regions from the front of the vault buffer.
///
/// The cursor only moves forward. A failed read leaves it untouched so the
/// caller can report how much data was left.
#[derive(Debug, Clone)]
pub struct VaultStream<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> VaultStream<'a> {
    /// Creates a cursor positioned at the start of `bytes`.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Number of unread bytes.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Current offset from the start of the file.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Consumes the next `len` bytes, or returns `None` if fewer remain.
    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Some(slice)
    }

    /// Consumes the next `N` bytes as an array, or returns `None` if fewer remain.
    pub fn take_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Some(out)
    }
}
