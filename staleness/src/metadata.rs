//! Record Metadata — line-oriented `key: value` fields embedded in record files
//!
//! A record file is free text (usually Markdown with front matter). The fields
//! this crate cares about are single lines of the form `key: value`, matched
//! case-sensitively at the start of a line. Only the first occurrence of each
//! key counts. Missing keys are not errors; callers apply defaults.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{NoExpand, Regex};
use tracing::warn;

use crate::level::EscalationLevel;

static META_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([a-z][a-z-]*): ([^\r\n]*)").expect("META_LINE regex should compile")
});
static LAST_MESSAGE_TIMESTAMP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^last-message-timestamp: [^\r\n]*")
        .expect("LAST_MESSAGE_TIMESTAMP_LINE regex should compile")
});
static LAST_MESSAGE_LEVEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^last-message-level: [^\r\n]*")
        .expect("LAST_MESSAGE_LEVEL_LINE regex should compile")
});

/// Metadata keys recognised in record files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    LastUpdateTimestamp,
    LastMessageTimestamp,
    LastMessageLevel,
    Id,
    Title,
    Contact,
    AdditionalContact,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 7] = [
        Self::LastUpdateTimestamp,
        Self::LastMessageTimestamp,
        Self::LastMessageLevel,
        Self::Id,
        Self::Title,
        Self::Contact,
        Self::AdditionalContact,
    ];

    /// The literal key as written in the file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastUpdateTimestamp => "last-update-timestamp",
            Self::LastMessageTimestamp => "last-message-timestamp",
            Self::LastMessageLevel => "last-message-level",
            Self::Id => "jcid",
            Self::Title => "title",
            Self::Contact => "contact",
            Self::AdditionalContact => "additional-contact",
        }
    }

    fn from_literal(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed metadata: the first value seen for each recognised key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    fields: HashMap<MetadataKey, String>,
}

impl Metadata {
    /// Scan `content` for metadata lines.
    pub fn parse(content: &str) -> Self {
        let mut fields = HashMap::new();
        for caps in META_LINE.captures_iter(content) {
            let Some(key) = MetadataKey::from_literal(&caps[1]) else {
                continue;
            };
            fields
                .entry(key)
                .or_insert_with(|| caps[2].trim().to_string());
        }
        Self { fields }
    }

    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    /// Read a whole-seconds-since-epoch field. Absent or malformed → `None`.
    pub fn timestamp(&self, key: MetadataKey) -> Option<DateTime<Utc>> {
        let raw = self.get(key)?;
        match raw.parse::<i64>() {
            Ok(secs) => DateTime::from_timestamp(secs, 0),
            Err(_) => {
                warn!(key = %key, value = raw, "Ignoring malformed timestamp");
                None
            }
        }
    }

    /// Read `last-message-level`.
    ///
    /// Values above the ladder are treated as terminal so the record is never
    /// messaged again by mistake.
    pub fn level(&self) -> Option<EscalationLevel> {
        let raw = self.get(MetadataKey::LastMessageLevel)?;
        match raw.parse::<u64>() {
            Ok(value) => Some(
                u8::try_from(value)
                    .ok()
                    .and_then(EscalationLevel::from_u8)
                    .unwrap_or(EscalationLevel::Deactivated),
            ),
            Err(_) => {
                warn!(value = raw, "Ignoring malformed last-message-level");
                None
            }
        }
    }

    /// `contact` followed by every entry of `additional-contact`.
    ///
    /// Always returns at least one entry; an empty string stands in for a
    /// missing primary contact.
    pub fn contacts(&self) -> Vec<String> {
        let mut contacts = vec![self
            .get(MetadataKey::Contact)
            .unwrap_or_default()
            .to_string()];
        if let Some(extra) = self.get(MetadataKey::AdditionalContact) {
            contacts.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
            );
        }
        contacts
    }
}

/// Rewrite the two message-tracking lines, leaving every other byte intact.
///
/// A missing line is inserted right after an opening `---` delimiter, or at
/// the top of the file when there is no front matter.
pub fn rewrite_message_fields(
    content: &str,
    sent_at: DateTime<Utc>,
    level: EscalationLevel,
) -> String {
    let content = set_line(
        content,
        &LAST_MESSAGE_TIMESTAMP_LINE,
        MetadataKey::LastMessageTimestamp,
        &sent_at.timestamp().to_string(),
    );
    set_line(
        &content,
        &LAST_MESSAGE_LEVEL_LINE,
        MetadataKey::LastMessageLevel,
        &level.as_u8().to_string(),
    )
}

fn set_line(content: &str, pattern: &Regex, key: MetadataKey, value: &str) -> String {
    let line = format!("{key}: {value}");
    if pattern.is_match(content) {
        return pattern.replace(content, NoExpand(&line)).into_owned();
    }

    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    for delimiter in ["---\r\n", "---\n"] {
        if let Some(rest) = content.strip_prefix(delimiter) {
            return format!("{delimiter}{line}{newline}{rest}");
        }
    }
    format!("{line}{newline}{content}")
}
