//! Outgoing Message — recipients plus rendered content for one send

use serde::Serialize;

use crate::level::EscalationLevel;
use crate::record::Record;
use crate::template::RenderedTemplate;

/// Recipient list for a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipients {
    pub to: String,
    pub cc: Vec<String>,
}

impl Recipients {
    /// Build the recipients for a message at `level`.
    ///
    /// Deactivation notices also copy the operator. The record's contact list
    /// is left untouched.
    pub fn for_level(record: &Record, level: EscalationLevel, operator: &str) -> Self {
        let mut contacts = record.contact_emails.iter().cloned();
        let to = contacts.next().unwrap_or_default();
        let mut cc: Vec<String> = contacts.collect();
        if level == EscalationLevel::Deactivated {
            cc.push(operator.to_string());
        }
        Self { to, cc }
    }

    /// CC addresses in the single-header form the mail provider receives.
    pub fn cc_header(&self) -> String {
        self.cc.join("; ")
    }
}

/// Everything the mail provider needs for one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub recipients: Recipients,
    pub subject: String,
    pub html: String,
}

impl OutgoingMessage {
    pub fn new(recipients: Recipients, rendered: &RenderedTemplate) -> Self {
        Self {
            recipients,
            subject: rendered.subject().to_string(),
            html: rendered.body().to_string(),
        }
    }
}
