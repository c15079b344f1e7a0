//! Journal club nagger runtime.
//!
//! Each run lists the active journal club records, picks at most one that has
//! gone stale, emails its owners at the next escalation level, and records the
//! outcome in the record itself (or archives it after the final warning).
//!
//! The decision logic lives in the `staleness` crate; this crate provides the
//! provider adapters (GitHub, Mailgun, template stores), the concurrent loader,
//! the side-effecting engine, and the CLI / HTTP triggers.

pub mod config;
pub mod engine;
pub mod errors;
pub mod loader;
pub mod mailer;
pub mod run;
pub mod server;
pub mod storage;
pub mod templates;

pub use config::{NagConfig, RunMode};
pub use engine::{EngineOptions, EscalationEngine, EscalationResult};
pub use errors::{MailError, MoveError, RunError, StorageError, TemplateError};
pub use loader::RecordLoader;
pub use run::{Nagger, RunSummary, ALL_OK};
