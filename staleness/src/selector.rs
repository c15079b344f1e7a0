//! Selector — pick the single record acted on this run

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// How the record for this run is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SelectionMode {
    /// Oldest provider-modified record first.
    OldestModified,
    /// Only the record carrying the sentinel test id, so sandbox runs never
    /// touch real records.
    Sentinel { id: String },
}

/// Choose at most one record from the eligible set.
///
/// Ties on `modified_at` go to the first record encountered.
pub fn select_record(eligible: Vec<Record>, mode: &SelectionMode) -> Option<Record> {
    match mode {
        SelectionMode::OldestModified => eligible.into_iter().reduce(|oldest, candidate| {
            if candidate.modified_at < oldest.modified_at {
                candidate
            } else {
                oldest
            }
        }),
        SelectionMode::Sentinel { id } => eligible.into_iter().find(|r| &r.id == id),
    }
}
