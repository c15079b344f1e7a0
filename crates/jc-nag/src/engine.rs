//! Escalation Engine — move one record a single rung up the ladder.
//!
//! ```text
//! template(next) ──fatal──▶ RunError
//!      │
//! render + recipients
//!      │
//!   send ──failed──▶ outcome only, record untouched
//!      │
//!   next == Deactivated ? archive (copy to inactive, delete original)
//!                       : rewrite last-message-{timestamp,level}
//! ```
//!
//! Only the template fetch can fail the run. Send, update and archive
//! failures end up in the outcome text. A failed send never advances the
//! level, so the next run retries the same rung.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use staleness::{
    rewrite_message_fields, EscalationLevel, OutgoingMessage, Placeholders, Recipients, Record,
};
use tracing::{info, warn};

use crate::errors::RunError;
use crate::mailer::Mailer;
use crate::storage::RecordStore;
use crate::templates::TemplateStore;

/// What happened to the record this run.
#[derive(Debug, Clone, Serialize)]
pub struct EscalationResult {
    pub record: Record,
    /// Level attempted; `None` when the record was already terminal.
    pub level: Option<EscalationLevel>,
    pub outcome: String,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Copied on deactivation notices.
    pub operator_email: String,
    pub active_dir: String,
    pub inactive_dir: String,
    /// Render and address the message but send and write nothing.
    pub dry_run: bool,
}

pub struct EscalationEngine {
    store: Arc<dyn RecordStore>,
    mailer: Arc<dyn Mailer>,
    templates: Arc<dyn TemplateStore>,
    options: EngineOptions,
}

impl EscalationEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        mailer: Arc<dyn Mailer>,
        templates: Arc<dyn TemplateStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            store,
            mailer,
            templates,
            options,
        }
    }

    pub async fn escalate(
        &self,
        record: Record,
        now: DateTime<Utc>,
    ) -> Result<EscalationResult, RunError> {
        let Some(level) = record.next_level() else {
            warn!(record_id = %record.id, "Record is already deactivated");
            return Ok(EscalationResult {
                record,
                level: None,
                outcome: "Already deactivated".to_string(),
            });
        };

        let template = self
            .templates
            .get_template(level)
            .await
            .map_err(|source| RunError::Template { level, source })?;
        let rendered = template.render(&Placeholders::for_record(&record));
        let recipients = Recipients::for_level(&record, level, &self.options.operator_email);
        let message = OutgoingMessage::new(recipients, &rendered);

        if self.options.dry_run {
            info!(record_id = %record.id, %level, to = %message.recipients.to, "Dry run; not sending");
            return Ok(EscalationResult {
                record,
                level: Some(level),
                outcome: format!("{} (dry run)", level.action_label()),
            });
        }

        let mut failures = Vec::new();
        match self.mailer.send(&message).await {
            Ok(()) => {
                info!(record_id = %record.id, %level, "Message sent");
                let effect = if level == EscalationLevel::Deactivated {
                    self.archive(&record).await
                } else {
                    self.update_metadata(&record, level, now).await
                };
                if let Err(failure) = effect {
                    failures.push(failure);
                }
            }
            Err(e) => {
                warn!(record_id = %record.id, %level, error = %e, "Message send failed");
                failures.push(format!("email failed: {e}"));
            }
        }

        let outcome = if failures.is_empty() {
            level.action_label().to_string()
        } else {
            format!("{} ({})", level.action_label(), failures.join("; "))
        };
        Ok(EscalationResult {
            record,
            level: Some(level),
            outcome,
        })
    }

    /// Record the message in the file, guarded by the loaded revision.
    async fn update_metadata(
        &self,
        record: &Record,
        level: EscalationLevel,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let content = rewrite_message_fields(&record.storage.content, now, level);
        let message = format!(
            "{} for {} ({})",
            level.action_label(),
            record.title,
            record.id
        );
        self.store
            .put_item(
                &record.storage.path,
                &content,
                Some(&record.storage.revision),
                &message,
            )
            .await
            .map_err(|e| {
                warn!(record_id = %record.id, error = %e, "Metadata update failed");
                format!("metadata update failed: {e}")
            })?;
        info!(record_id = %record.id, %level, "Metadata updated");
        Ok(())
    }

    /// Move the record to the inactive collection.
    async fn archive(&self, record: &Record) -> Result<(), String> {
        let to = archive_path(
            &record.storage.path,
            &self.options.active_dir,
            &self.options.inactive_dir,
        );
        let message = format!("Deactivate {} ({})", record.title, record.id);
        self.store
            .move_item(
                &record.storage.path,
                &record.storage.revision,
                &to,
                &record.storage.content,
                &message,
            )
            .await
            .map_err(|e| {
                warn!(record_id = %record.id, error = %e, "Archive failed");
                format!("archive failed: {e}")
            })?;
        info!(record_id = %record.id, from = %record.storage.path, %to, "Record archived");
        Ok(())
    }
}

/// Swap the leading active directory for the inactive one.
///
/// Paths outside the active directory keep their file name only.
pub fn archive_path(path: &str, active_dir: &str, inactive_dir: &str) -> String {
    let active = active_dir.trim_end_matches('/');
    let inactive = inactive_dir.trim_end_matches('/');
    match path
        .strip_prefix(active)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(rest) => format!("{inactive}/{rest}"),
        None => {
            let file = path.rsplit('/').next().unwrap_or(path);
            format!("{inactive}/{file}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{MailError, MoveError, StorageError, TemplateError};
    use crate::mailer::MockMailer;
    use crate::storage::{FetchedItem, ItemRef};
    use crate::templates::MockTemplateStore;
    use async_trait::async_trait;
    use staleness::{MessageTemplate, StorageHandle};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        puts: Mutex<Vec<(String, String, Option<String>)>>,
        moves: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl RecordStore for RecordingStore {
        async fn list_items(&self, _: &str) -> Result<Vec<ItemRef>, StorageError> {
            Ok(vec![])
        }

        async fn get_item(&self, url: &str) -> Result<FetchedItem, StorageError> {
            Err(StorageError::NotFound(url.to_string()))
        }

        async fn put_item(
            &self,
            path: &str,
            content: &str,
            revision: Option<&str>,
            _: &str,
        ) -> Result<(), StorageError> {
            self.puts.lock().unwrap().push((
                path.to_string(),
                content.to_string(),
                revision.map(str::to_string),
            ));
            Ok(())
        }

        async fn delete_item(&self, _: &str, _: &str, _: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn move_item(
            &self,
            from: &str,
            _: &str,
            to: &str,
            _: &str,
            _: &str,
        ) -> Result<(), MoveError> {
            self.moves
                .lock()
                .unwrap()
                .push((from.to_string(), to.to_string()));
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn record(level: EscalationLevel) -> Record {
        let content = format!(
            "---\njcid: neuro\ntitle: Neuro JC\ncontact: a@x.org\n\
             last-message-timestamp: 0\nlast-message-level: {}\n---\n",
            level.as_u8()
        );
        Record::from_stored(
            StorageHandle {
                path: "_journalclubs/neuro.md".into(),
                revision: "rev1".into(),
                url: String::new(),
                content,
            },
            now(),
        )
    }

    fn options() -> EngineOptions {
        EngineOptions {
            operator_email: "ops@x.org".into(),
            active_dir: "_journalclubs".into(),
            inactive_dir: "_inactive_journalclubs".into(),
            dry_run: false,
        }
    }

    fn template_for(expected: EscalationLevel) -> MockTemplateStore {
        let mut templates = MockTemplateStore::new();
        templates
            .expect_get_template()
            .withf(move |level| *level == expected)
            .times(1)
            .returning(|_| {
                MessageTemplate::from_json(r#"{"subject": "{{ jcTitle }}", "body": "<p>hi</p>"}"#)
                    .map_err(TemplateError::from)
            });
        templates
    }

    fn engine(
        store: Arc<RecordingStore>,
        mailer: MockMailer,
        templates: MockTemplateStore,
        options: EngineOptions,
    ) -> EscalationEngine {
        EscalationEngine::new(store, Arc::new(mailer), Arc::new(templates), options)
    }

    #[tokio::test]
    async fn notification_updates_metadata_after_send() {
        let store = Arc::new(RecordingStore::default());
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|m| m.recipients.to == "a@x.org" && m.subject == "Neuro JC")
            .times(1)
            .returning(|_| Ok(()));

        let result = engine(
            store.clone(),
            mailer,
            template_for(EscalationLevel::Notification),
            options(),
        )
        .escalate(record(EscalationLevel::UpToDate), now())
        .await
        .unwrap();

        assert_eq!(result.outcome, "Sent notification");
        assert_eq!(result.level, Some(EscalationLevel::Notification));
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "_journalclubs/neuro.md");
        assert!(puts[0].1.contains("last-message-level: 1\n"));
        assert!(puts[0].1.contains("last-message-timestamp: 1750000000\n"));
        assert_eq!(puts[0].2.as_deref(), Some("rev1"));
    }

    #[tokio::test]
    async fn failed_send_skips_side_effects() {
        let store = Arc::new(RecordingStore::default());
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(1).returning(|_| {
            Err(MailError::Rejected {
                status: 400,
                body: "bad address".into(),
            })
        });

        let result = engine(
            store.clone(),
            mailer,
            template_for(EscalationLevel::FirstReminder),
            options(),
        )
        .escalate(record(EscalationLevel::Notification), now())
        .await
        .unwrap();

        assert!(result.outcome.starts_with("Sent first reminder (email failed:"));
        assert!(result.outcome.contains("bad address"));
        assert!(store.puts.lock().unwrap().is_empty());
        assert!(store.moves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deactivation_copies_operator_and_archives() {
        let store = Arc::new(RecordingStore::default());
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|m| m.recipients.cc == vec!["ops@x.org".to_string()])
            .times(1)
            .returning(|_| Ok(()));

        let result = engine(
            store.clone(),
            mailer,
            template_for(EscalationLevel::Deactivated),
            options(),
        )
        .escalate(record(EscalationLevel::SecondReminder), now())
        .await
        .unwrap();

        assert_eq!(result.outcome, "Deactivated");
        assert_eq!(
            *store.moves.lock().unwrap(),
            vec![(
                "_journalclubs/neuro.md".to_string(),
                "_inactive_journalclubs/neuro.md".to_string()
            )]
        );
        assert!(store.puts.lock().unwrap().is_empty());
        assert_eq!(result.record.contact_emails, vec!["a@x.org"]);
    }

    #[tokio::test]
    async fn template_failure_is_fatal_and_nothing_is_sent() {
        let store = Arc::new(RecordingStore::default());
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);
        let mut templates = MockTemplateStore::new();
        templates.expect_get_template().times(1).returning(|_| {
            Err(TemplateError::Read(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "missing",
            )))
        });

        let err = engine(store.clone(), mailer, templates, options())
            .escalate(record(EscalationLevel::FirstReminder), now())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Template {
                level: EscalationLevel::SecondReminder,
                ..
            }
        ));
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_sends_and_writes_nothing() {
        let store = Arc::new(RecordingStore::default());
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);
        let mut opts = options();
        opts.dry_run = true;

        let result = engine(
            store.clone(),
            mailer,
            template_for(EscalationLevel::Notification),
            opts,
        )
        .escalate(record(EscalationLevel::UpToDate), now())
        .await
        .unwrap();

        assert_eq!(result.outcome, "Sent notification (dry run)");
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_record_is_left_alone() {
        let store = Arc::new(RecordingStore::default());
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);
        let mut templates = MockTemplateStore::new();
        templates.expect_get_template().times(0);

        let result = engine(store, mailer, templates, options())
            .escalate(record(EscalationLevel::Deactivated), now())
            .await
            .unwrap();
        assert_eq!(result.level, None);
    }

    #[test]
    fn archive_path_swaps_leading_directory() {
        assert_eq!(
            archive_path("_journalclubs/neuro.md", "_journalclubs", "_inactive_journalclubs"),
            "_inactive_journalclubs/neuro.md"
        );
        assert_eq!(
            archive_path("_journalclubs/neuro.md", "_journalclubs/", "_inactive/"),
            "_inactive/neuro.md"
        );
    }

    #[test]
    fn archive_path_outside_active_dir_keeps_file_name() {
        assert_eq!(
            archive_path("elsewhere/neuro.md", "_journalclubs", "_inactive"),
            "_inactive/neuro.md"
        );
        assert_eq!(
            archive_path("_journalclubs_old/neuro.md", "_journalclubs", "_inactive"),
            "_inactive/neuro.md"
        );
    }
}
