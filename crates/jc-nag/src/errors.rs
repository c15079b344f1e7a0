//! Error taxonomy for the nagger runtime.
//!
//! Only [`RunError`] ever aborts an invocation. Everything else is caught by
//! the loader or the engine and either dropped (per-record fetch failures) or
//! folded into the run summary text (send, update, archive failures).
//!
//! | Error            | Where it ends up                          |
//! |------------------|-------------------------------------------|
//! | `StorageError`   | dropped (load) / summary text (write)     |
//! | `MailError`      | summary text, side effects skipped        |
//! | `TemplateError`  | wrapped in `RunError::Template`, fatal    |

use staleness::{EscalationLevel, TemplateParseError};
use thiserror::Error;

/// Failures talking to the record storage provider.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Network-level failure (connect, TLS, body read).
    #[error("storage request failed: {0}")]
    Request(String),

    /// The revision token no longer matches the stored item.
    #[error("revision conflict on {path}: {message}")]
    Conflict { path: String, message: String },

    #[error("item not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("storage provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response arrived but its payload could not be decoded.
    #[error("could not decode storage payload: {0}")]
    Decode(String),
}

/// Failures moving an item between collections.
///
/// A failed delete leaves the copy in place; nothing is rolled back.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("copy to {to} failed: {source}")]
    Copy {
        to: String,
        #[source]
        source: StorageError,
    },

    #[error("copied to {to} but delete of {from} failed: {source}")]
    Delete {
        from: String,
        to: String,
        #[source]
        source: StorageError,
    },
}

/// Failures handing a message to the email provider.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Request(String),

    #[error("mail provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Failures loading a message template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template fetch failed: {0}")]
    Fetch(#[from] StorageError),

    #[error("template read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] TemplateParseError),
}

/// Fatal errors that abort a run and surface to the caller.
#[derive(Debug, Error)]
pub enum RunError {
    /// Missing or broken templates are a configuration problem, never a
    /// per-record one.
    #[error("template for level {level} unavailable: {source}")]
    Template {
        level: EscalationLevel,
        #[source]
        source: TemplateError,
    },

    /// The source collection itself could not be listed.
    ///
    /// Fatal on purpose, alongside missing templates: an empty listing would
    /// otherwise be indistinguishable from "all up to date".
    #[error("could not list records: {0}")]
    Listing(#[source] StorageError),
}
