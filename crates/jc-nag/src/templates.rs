//! Template stores — where per-level message templates come from.
//!
//! Templates are JSON objects named after the level's template key
//! (`notification.json`, `first-reminder.json`, ...).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use staleness::{EscalationLevel, MessageTemplate};
use tracing::debug;

use crate::errors::TemplateError;
use crate::storage::GitHubStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, level: EscalationLevel) -> Result<MessageTemplate, TemplateError>;
}

fn file_name(level: EscalationLevel) -> String {
    format!("{}.json", level.template_key())
}

/// Templates kept in the content repository next to the records.
pub struct RepoTemplateStore {
    store: Arc<GitHubStore>,
    dir: String,
}

impl RepoTemplateStore {
    pub fn new(store: Arc<GitHubStore>, dir: impl Into<String>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl TemplateStore for RepoTemplateStore {
    async fn get_template(&self, level: EscalationLevel) -> Result<MessageTemplate, TemplateError> {
        let path = format!("{}/{}", self.dir.trim_end_matches('/'), file_name(level));
        debug!(%path, "Fetching template from repository");
        let item = self.store.get_path(&path).await?;
        Ok(MessageTemplate::from_json(&item.content)?)
    }
}

/// Templates read from a local directory.
pub struct DirTemplateStore {
    dir: PathBuf,
}

impl DirTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl TemplateStore for DirTemplateStore {
    async fn get_template(&self, level: EscalationLevel) -> Result<MessageTemplate, TemplateError> {
        let path = self.dir.join(file_name(level));
        debug!(path = %path.display(), "Reading template from disk");
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(MessageTemplate::from_json(&raw)?)
    }
}
