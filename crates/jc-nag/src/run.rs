//! One invocation: load → select → escalate → summary.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staleness::{select_record, EscalationLevel, SelectionMode};
use tracing::info;

use crate::config::{NagConfig, RunMode};
use crate::engine::{EngineOptions, EscalationEngine};
use crate::errors::RunError;
use crate::loader::RecordLoader;
use crate::mailer::{Mailer, MailgunMailer};
use crate::storage::{GitHubStore, RecordStore};
use crate::templates::{DirTemplateStore, RepoTemplateStore, TemplateStore};

/// Summary reported when no record needs attention.
pub const ALL_OK: &str = "All journal clubs are up to date";

/// Result of one invocation, returned to the trigger as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// One-line human-readable outcome
    pub summary: String,
    pub mode: RunMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<EscalationLevel>,
}

/// Wires the loader, selector and engine for a single run mode.
pub struct Nagger {
    loader: RecordLoader,
    engine: EscalationEngine,
    selection: SelectionMode,
    mode: RunMode,
}

impl Nagger {
    pub fn new(
        loader: RecordLoader,
        engine: EscalationEngine,
        selection: SelectionMode,
        mode: RunMode,
    ) -> Self {
        Self {
            loader,
            engine,
            selection,
            mode,
        }
    }

    /// Build the production adapters (GitHub, Mailgun) for `mode`.
    pub fn from_config(config: &NagConfig, mode: RunMode, dry_run: bool) -> Result<Self> {
        let github = Arc::new(
            GitHubStore::new(
                &config.repo.api_url,
                &config.repo.token,
                config.repo_for(mode),
                &config.repo.branch,
            )
            .context("Failed to build GitHub client")?,
        );
        let mailer: Arc<dyn Mailer> = Arc::new(
            MailgunMailer::new(
                &config.mail.host,
                config.mail_domain_for(mode),
                &config.mail.api_key,
                &config.operator_email,
            )
            .context("Failed to build Mailgun client")?,
        );
        let templates: Arc<dyn TemplateStore> = match &config.collections.local_templates {
            Some(dir) => Arc::new(DirTemplateStore::new(dir)),
            None => Arc::new(RepoTemplateStore::new(
                Arc::clone(&github),
                &config.collections.templates_dir,
            )),
        };
        let store: Arc<dyn RecordStore> = github;

        let loader = RecordLoader::new(
            Arc::clone(&store),
            &config.collections.active_dir,
            config.policy,
        );
        let engine = EscalationEngine::new(
            store,
            mailer,
            templates,
            EngineOptions {
                operator_email: config.operator_email.clone(),
                active_dir: config.collections.active_dir.clone(),
                inactive_dir: config.collections.inactive_dir.clone(),
                dry_run,
            },
        );
        Ok(Self::new(loader, engine, config.selection_mode(mode), mode))
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Process at most one record.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunSummary, RunError> {
        info!(mode = %self.mode, "Run starting");
        let eligible = self.loader.load_eligible_records(now).await?;

        let Some(record) = select_record(eligible, &self.selection) else {
            info!("No record selected");
            return Ok(RunSummary {
                summary: ALL_OK.to_string(),
                mode: self.mode,
                record_id: None,
                level: None,
            });
        };
        info!(record_id = %record.id, path = %record.storage.path, "Selected record");

        let result = self.engine.escalate(record, now).await?;
        let summary = format!(
            "{} [{}]: {}",
            result.record.title, result.record.id, result.outcome
        );
        info!(%summary, "Run finished");
        Ok(RunSummary {
            summary,
            mode: self.mode,
            record_id: Some(result.record.id),
            level: result.level,
        })
    }
}
