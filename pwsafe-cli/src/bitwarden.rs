//! Bitwarden unencrypted JSON export.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use pwsafe_core::Record;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

const ITEM_TYPE_LOGIN: u8 = 1;
const ITEM_TYPE_SECURE_NOTE: u8 = 2;
const FIELD_TYPE_TEXT: u8 = 0;
const REPROMPT_NONE: u8 = 0;
const REPROMPT_PASSWORD: u8 = 1;

/// Top-level export document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    encrypted: bool,
    folders: Vec<Folder>,
    items: Vec<Item>,
}

impl Export {
    /// Number of exported items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Serialize)]
struct Folder {
    id: Uuid,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    id: Uuid,
    organization_id: Option<String>,
    folder_id: Option<Uuid>,
    #[serde(rename = "type")]
    kind: u8,
    reprompt: u8,
    name: String,
    notes: Option<String>,
    favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    login: Option<Login>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secure_note: Option<SecureNote>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<CustomField>,
    collection_ids: Option<Vec<Uuid>>,
    revision_date: String,
    creation_date: String,
    deleted_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Login {
    username: String,
    password: String,
    uris: Option<Vec<LoginUri>>,
    totp: Option<String>,
    fido2_credentials: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct LoginUri {
    #[serde(rename = "match")]
    match_type: Option<u8>,
    uri: String,
}

#[derive(Debug, Serialize)]
struct SecureNote {
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomField {
    name: String,
    value: String,
    #[serde(rename = "type")]
    kind: u8,
    linked_id: Option<u32>,
}

/// Maps vault records to a Bitwarden export.
///
/// `now` stands in for any timestamp the record does not carry.
pub fn from_records(records: &[Record], now: DateTime<Utc>) -> Export {
    let mut folder_ids: BTreeMap<String, Uuid> = BTreeMap::new();
    for record in records {
        if let Some(name) = folder_name(record) {
            folder_ids.entry(name).or_insert_with(Uuid::new_v4);
        }
    }

    let items = records
        .iter()
        .map(|record| {
            let folder_id = folder_name(record).and_then(|name| folder_ids.get(&name).copied());
            to_item(record, folder_id, now)
        })
        .collect();

    let folders = folder_ids
        .into_iter()
        .map(|(name, id)| Folder { id, name })
        .collect();

    Export {
        encrypted: false,
        folders,
        items,
    }
}

/// Bitwarden folder path for the record's group, `None` when ungrouped.
fn folder_name(record: &Record) -> Option<String> {
    let path = record.group_path();
    if path.is_empty() {
        None
    } else {
        Some(path.join("/"))
    }
}

fn to_item(record: &Record, folder_id: Option<Uuid>, now: DateTime<Utc>) -> Item {
    let is_login =
        !(record.username.is_empty() && record.password.is_empty() && record.url.is_empty());

    let login = is_login.then(|| Login {
        username: record.username.clone(),
        password: record.password.clone(),
        uris: non_empty(&record.url).map(|uri| {
            vec![LoginUri {
                match_type: None,
                uri,
            }]
        }),
        totp: None,
        fido2_credentials: Vec::new(),
    });

    let fields = non_empty(&record.email)
        .map(|value| CustomField {
            name: "email".to_string(),
            value,
            kind: FIELD_TYPE_TEXT,
            linked_id: None,
        })
        .into_iter()
        .collect();

    let revision = record.last_modified;
    let creation = record.created_at.or(revision);

    Item {
        id: if record.uuid.is_nil() {
            Uuid::new_v4()
        } else {
            record.uuid
        },
        organization_id: None,
        folder_id,
        kind: if is_login {
            ITEM_TYPE_LOGIN
        } else {
            ITEM_TYPE_SECURE_NOTE
        },
        reprompt: if record.protected {
            REPROMPT_PASSWORD
        } else {
            REPROMPT_NONE
        },
        name: record.title.clone(),
        notes: non_empty(&record.notes),
        favorite: false,
        login,
        secure_note: (!is_login).then_some(SecureNote { kind: 0 }),
        fields,
        collection_ids: None,
        revision_date: format_timestamp(revision, now),
        creation_date: format_timestamp(creation, now),
        deleted_date: None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2023-11-14T22:13:20.000Z`.
fn format_timestamp(seconds: Option<i64>, fallback: DateTime<Utc>) -> String {
    seconds
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or(fallback)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
