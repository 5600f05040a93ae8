//! Record assembly from the decrypted field stream.
//!
//! The stream starts with a block of header fields closed by an end-of-block
//! marker, followed by zero or more records, each closed by its own marker:
//!
//! ```text
//! [hdr field]* 0xFF  ( [record field]* 0xFF )*  EOF
//! ```
//!
//! Every field other than a marker is absorbed into the integrity accumulator,
//! whether or not its type is understood.

use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};
use crate::record::Record;

use super::field::{FieldReader, RawField};
use super::format::{
    FIELD_CREATION_TIME, FIELD_EMAIL, FIELD_GROUP, FIELD_LAST_MODIFIED, FIELD_NOTES,
    FIELD_PASSWORD, FIELD_PASSWORD_MODIFIED, FIELD_PROTECTED, FIELD_TITLE, FIELD_URL, FIELD_UUID,
    FIELD_USERNAME,
};
use super::integrity::IntegrityAccumulator;

// =============================================================================
// Assembly
// =============================================================================

/// Where the assembler is in the field stream.
#[derive(Debug)]
enum Phase {
    /// Before the first end-of-block marker.
    HeaderFields,
    /// Inside a record; counts the fields seen so far.
    Records { current: Record, fields: usize },
    /// End-of-file marker consumed.
    Finished,
}

/// Reads every remaining field and assembles the completed records.
///
/// Stops at the end-of-file marker. A record that is still open at that point
/// is discarded. If the marker arrives before the header block is closed, no
/// records are read and the stream is left positioned at the stored tag.
///
/// # Errors
///
/// - Any error from [`FieldReader::read_field`]
/// - [`VaultError::CorruptUuid`] or [`VaultError::CorruptTimestamp`] for a
///   malformed record field
pub fn read_records(
    fields: &mut FieldReader<'_>,
    integrity: &mut IntegrityAccumulator,
) -> VaultResult<Vec<Record>> {
    let mut records = Vec::new();
    let mut header_fields = 0usize;
    let mut phase = Phase::HeaderFields;

    loop {
        phase = match phase {
            Phase::Finished => break,

            Phase::HeaderFields => match fields.read_field()? {
                None => {
                    debug!(header_fields, "field stream ended inside the header block");
                    Phase::Finished
                }
                Some(field) if field.is_end_of_block() => {
                    trace!(header_fields, "header block closed");
                    Phase::Records {
                        current: Record::default(),
                        fields: 0,
                    }
                }
                Some(field) => {
                    integrity.absorb(&field.value);
                    header_fields += 1;
                    Phase::HeaderFields
                }
            },

            Phase::Records {
                mut current,
                fields: seen,
            } => match fields.read_field()? {
                None => {
                    if seen > 0 {
                        debug!(fields = seen, "discarding unterminated trailing record");
                    }
                    Phase::Finished
                }
                Some(field) if field.is_end_of_block() => {
                    records.push(current);
                    Phase::Records {
                        current: Record::default(),
                        fields: 0,
                    }
                }
                Some(field) => {
                    integrity.absorb(&field.value);
                    apply_field(&mut current, &field)?;
                    Phase::Records {
                        current,
                        fields: seen + 1,
                    }
                }
            },
        };
    }

    debug!(records = records.len(), "assembled records");
    Ok(records)
}

// =============================================================================
// Field Decoding
// =============================================================================

/// Maps one record field onto `record`. Unknown types are ignored.
fn apply_field(record: &mut Record, field: &RawField) -> VaultResult<()> {
    let value = field.value.as_slice();
    match field.field_type {
        FIELD_UUID => record.uuid = decode_uuid(value)?,
        FIELD_GROUP => record.group = decode_text(value),
        FIELD_TITLE => record.title = decode_text(value),
        FIELD_USERNAME => record.username = decode_text(value),
        FIELD_NOTES => record.notes = decode_text(value),
        FIELD_PASSWORD => record.password = decode_text(value),
        FIELD_URL => record.url = decode_text(value),
        FIELD_EMAIL => record.email = decode_text(value),
        FIELD_CREATION_TIME => record.created_at = Some(decode_timestamp(field)?),
        FIELD_PASSWORD_MODIFIED => {
            record.password_modified_at = Some(decode_timestamp(field)?);
        }
        FIELD_LAST_MODIFIED => record.last_modified = Some(decode_timestamp(field)?),
        FIELD_PROTECTED => record.protected = decode_flag(value),
        other => trace!(field_type = other, len = value.len(), "skipping field"),
    }
    Ok(())
}

fn decode_uuid(value: &[u8]) -> VaultResult<Uuid> {
    Uuid::from_slice(value).map_err(|_| VaultError::CorruptUuid { len: value.len() })
}

fn decode_text(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

/// Unix seconds, stored as u32 LE (classic) or i64 LE (wide).
fn decode_timestamp(field: &RawField) -> VaultResult<i64> {
    let value = field.value.as_slice();
    if let Ok(narrow) = <[u8; 4]>::try_from(value) {
        return Ok(i64::from(u32::from_le_bytes(narrow)));
    }
    if let Ok(wide) = <[u8; 8]>::try_from(value) {
        return Ok(i64::from_le_bytes(wide));
    }
    Err(VaultError::CorruptTimestamp {
        field_type: field.field_type,
        len: value.len(),
    })
}

/// A single byte; anything but `0` and ASCII `'0'` means set.
fn decode_flag(value: &[u8]) -> bool {
    value.first().is_some_and(|&b| b != 0 && b != b'0')
}
