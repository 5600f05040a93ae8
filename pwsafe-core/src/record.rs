//! Credential records recovered from a vault.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Separator between nested group names in a PasswordSafe group path.
const GROUP_SEPARATOR: char = '.';

/// Escape character allowing a literal separator inside a group name.
const GROUP_ESCAPE: char = '\\';

/// One credential entry.
///
/// Text fields are empty and timestamps `None` when the vault does not carry
/// the corresponding field. Timestamps are Unix seconds.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Stable identifier of the entry.
    pub uuid: Uuid,
    /// Group path, dot-separated for nesting (e.g. `Work.Email`).
    pub group: String,
    /// Entry title.
    pub title: String,
    /// Username.
    pub username: String,
    /// Free-form notes.
    pub notes: String,
    /// Password.
    pub password: String,
    /// URL.
    pub url: String,
    /// E-mail address.
    pub email: String,
    /// Creation time.
    pub created_at: Option<i64>,
    /// Time the password was last changed.
    pub password_modified_at: Option<i64>,
    /// Time any field of the entry was last changed.
    pub last_modified: Option<i64>,
    /// Whether the entry is protected (requires confirmation before use).
    pub protected: bool,
}

impl Record {
    /// Splits the group into its nested components.
    ///
    /// `\.` is a literal dot inside a component. Empty components are
    /// dropped, so an empty group yields an empty path.
    #[must_use]
    pub fn group_path(&self) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = self.group.chars();

        while let Some(c) = chars.next() {
            match c {
                GROUP_ESCAPE => match chars.next() {
                    Some(GROUP_SEPARATOR) => current.push(GROUP_SEPARATOR),
                    Some(other) => {
                        current.push(GROUP_ESCAPE);
                        current.push(other);
                    }
                    None => current.push(GROUP_ESCAPE),
                },
                GROUP_SEPARATOR => {
                    if !current.is_empty() {
                        parts.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            }
        }
        if !current.is_empty() {
            parts.push(current);
        }
        parts
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("uuid", &self.uuid)
            .field("group", &self.group)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .field("last_modified", &self.last_modified)
            .field("protected", &self.protected)
            .finish_non_exhaustive()
    }
}
