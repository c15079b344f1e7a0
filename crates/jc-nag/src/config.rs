use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use staleness::{SelectionMode, StalenessPolicy};
use std::fmt;
use std::path::PathBuf;

/// Largest accepted staleness or cooldown window, in days.
pub const MAX_POLICY_DAYS: i64 = 36_500;

/// Whether a run may touch production records.
///
/// Decided once per invocation and passed down explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Production,
    /// Sandbox repository and mail domain; only the sentinel record is eligible.
    Sandbox,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Sandbox => write!(f, "sandbox"),
        }
    }
}

/// GitHub repository holding the record files and templates.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    pub api_url: String,
    pub token: String,
    /// `owner/name` used in production
    pub repo: String,
    /// `owner/name` used for sandbox runs
    pub sandbox_repo: String,
    pub branch: String,
}

/// Collection layout inside the repository.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Directory listed for records, e.g. `_journalclubs`
    pub active_dir: String,
    /// Directory deactivated records move to
    pub inactive_dir: String,
    /// Directory holding `<template-key>.json` message templates
    pub templates_dir: String,
    /// Read templates from disk instead of the repository
    pub local_templates: Option<PathBuf>,
}

/// Mailgun credentials.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    /// e.g. `api.mailgun.net` or `api.eu.mailgun.net`
    pub host: String,
    pub domain: String,
    pub sandbox_domain: String,
}

/// Top-level nagger configuration.
#[derive(Debug, Clone)]
pub struct NagConfig {
    pub repo: RepoConfig,
    pub collections: CollectionConfig,
    pub mail: MailConfig,
    /// Sender of every message, and CC on deactivations.
    pub operator_email: String,
    /// Record id that sandbox runs are allowed to act on.
    pub sandbox_record_id: String,
    pub policy: StalenessPolicy,
}

impl NagConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };
        let days = |key: &str, default: i64| -> Result<i64> {
            let Some(raw) = lookup(key) else {
                return Ok(default);
            };
            let days: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a whole number of days"))?;
            ensure!(
                (1..=MAX_POLICY_DAYS).contains(&days),
                "{key} must be between 1 and {MAX_POLICY_DAYS} days, got {days}"
            );
            Ok(days)
        };

        let repo = var("JC_REPO", "journal-clubs/journal-clubs.github.io");
        let domain = required("MAILGUN_DOMAIN")?;
        let defaults = StalenessPolicy::default();

        Ok(Self {
            repo: RepoConfig {
                api_url: var("JC_GITHUB_API_URL", "https://api.github.com")
                    .trim_end_matches('/')
                    .to_string(),
                token: required("JC_GITHUB_TOKEN")?,
                sandbox_repo: lookup("JC_SANDBOX_REPO").unwrap_or_else(|| repo.clone()),
                repo,
                branch: var("JC_BRANCH", "main"),
            },
            collections: CollectionConfig {
                active_dir: var("JC_ACTIVE_DIR", "_journalclubs"),
                inactive_dir: var("JC_INACTIVE_DIR", "_inactive_journalclubs"),
                templates_dir: var("JC_TEMPLATES_DIR", "_templates/emails"),
                local_templates: lookup("JC_LOCAL_TEMPLATES").map(PathBuf::from),
            },
            mail: MailConfig {
                api_key: required("MAILGUN_API_KEY")?,
                host: var("MAILGUN_HOST", "api.mailgun.net"),
                sandbox_domain: lookup("MAILGUN_SANDBOX_DOMAIN").unwrap_or_else(|| domain.clone()),
                domain,
            },
            operator_email: var("JC_OPERATOR_EMAIL", "journal-clubs@example.org"),
            sandbox_record_id: var("JC_SANDBOX_RECORD_ID", "sandbox-test"),
            policy: StalenessPolicy {
                staleness_days: days("JC_STALENESS_DAYS", defaults.staleness_days)?,
                cooldown_days: days("JC_COOLDOWN_DAYS", defaults.cooldown_days)?,
            },
        })
    }

    pub fn repo_for(&self, mode: RunMode) -> &str {
        match mode {
            RunMode::Production => &self.repo.repo,
            RunMode::Sandbox => &self.repo.sandbox_repo,
        }
    }

    pub fn mail_domain_for(&self, mode: RunMode) -> &str {
        match mode {
            RunMode::Production => &self.mail.domain,
            RunMode::Sandbox => &self.mail.sandbox_domain,
        }
    }

    pub fn selection_mode(&self, mode: RunMode) -> SelectionMode {
        match mode {
            RunMode::Production => SelectionMode::OldestModified,
            RunMode::Sandbox => SelectionMode::Sentinel {
                id: self.sandbox_record_id.clone(),
            },
        }
    }
}
