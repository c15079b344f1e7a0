//! Journal Club Staleness Policy
//!
//! Deterministic core of the journal club nagger. Everything here is pure:
//! no network, no clock reads (callers pass `now`).
//!
//! - [`metadata`]: `key: value` lines embedded in record files, read and rewrite
//! - [`record`]: a parsed record plus its opaque storage handle
//! - [`level`]: the escalation ladder, one rung per run
//! - [`policy`]: staleness and cooldown eligibility
//! - [`selector`]: the single record chosen per run
//! - [`template`]: `{{ key }}` message templates
//! - [`message`]: recipients and the outgoing message

pub mod level;
pub mod message;
pub mod metadata;
pub mod policy;
pub mod record;
pub mod selector;
pub mod template;

pub use level::EscalationLevel;
pub use message::{OutgoingMessage, Recipients};
pub use metadata::{rewrite_message_fields, Metadata, MetadataKey};
pub use policy::StalenessPolicy;
pub use record::{Record, StorageHandle};
pub use selector::{select_record, SelectionMode};
pub use template::{MessageTemplate, Placeholders, RenderedTemplate, TemplateParseError};
