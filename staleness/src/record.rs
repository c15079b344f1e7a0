//! Journal Club Record — one record file, parsed into policy-relevant fields

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::level::EscalationLevel;
use crate::metadata::{Metadata, MetadataKey};

/// Where a record lives in the storage provider.
///
/// Policy code never looks inside; only the loader and engine use it to write
/// the record back or move it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHandle {
    /// Repository-relative path, e.g. `_journalclubs/neuro.md`
    pub path: String,
    /// Revision token (blob SHA) of the content that was loaded
    pub revision: String,
    /// Provider URL the item was fetched from
    pub url: String,
    /// Decoded file content as loaded
    pub content: String,
}

/// A journal club record, rebuilt from stored content on every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    /// First entry is the primary recipient; never empty.
    pub contact_emails: Vec<String>,
    pub last_update_time: DateTime<Utc>,
    pub last_message_time: DateTime<Utc>,
    pub last_message_level: EscalationLevel,
    /// Provider-reported modification time of the file itself.
    pub modified_at: DateTime<Utc>,
    #[serde(skip)]
    pub storage: StorageHandle,
}

impl Record {
    /// Parse a record from its stored content.
    ///
    /// Missing fields take their defaults: epoch timestamps, level
    /// `UpToDate`, empty id/title, and a single empty contact. A timestamp
    /// that is present but unreadable holds the record back instead.
    pub fn from_stored(storage: StorageHandle, modified_at: DateTime<Utc>) -> Self {
        let meta = Metadata::parse(&storage.content);
        Self {
            id: meta.get(MetadataKey::Id).unwrap_or_default().to_string(),
            title: meta.get(MetadataKey::Title).unwrap_or_default().to_string(),
            contact_emails: meta.contacts(),
            last_update_time: timestamp_or_default(&meta, MetadataKey::LastUpdateTimestamp),
            last_message_time: timestamp_or_default(&meta, MetadataKey::LastMessageTimestamp),
            last_message_level: meta.level().unwrap_or_default(),
            modified_at,
            storage,
        }
    }

    /// The level the next message would be sent at, if any.
    pub fn next_level(&self) -> Option<EscalationLevel> {
        self.last_message_level.next()
    }

    pub fn primary_contact(&self) -> &str {
        self.contact_emails
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Epoch when `key` is absent; far future when it is present but unreadable,
/// so a typo never makes a record look overdue.
fn timestamp_or_default(meta: &Metadata, key: MetadataKey) -> DateTime<Utc> {
    match meta.get(key) {
        None | Some("") => DateTime::<Utc>::UNIX_EPOCH,
        Some(_) => meta
            .timestamp(key)
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}
