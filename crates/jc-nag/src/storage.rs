//! Record storage — the provider interface and its GitHub contents API adapter.
//!
//! The loader and engine only see [`RecordStore`]. Revision tokens (blob
//! SHAs) are the only concurrency control: a write with a stale token fails
//! with [`StorageError::Conflict`] instead of clobbering someone else's edit.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, LAST_MODIFIED};
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{MoveError, StorageError};

/// One entry of a collection listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemRef {
    pub name: String,
    pub path: String,
    pub sha: String,
    /// URL that [`RecordStore::get_item`] accepts
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ItemRef {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// A fetched item with its content already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedItem {
    pub path: String,
    pub revision: String,
    pub url: String,
    pub content: String,
    pub modified_at: DateTime<Utc>,
}

/// Operations the nagger needs from the record storage provider.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List the items directly inside `collection`.
    async fn list_items(&self, collection: &str) -> Result<Vec<ItemRef>, StorageError>;

    /// Fetch an item's content, revision token and last-modified time.
    async fn get_item(&self, url: &str) -> Result<FetchedItem, StorageError>;

    /// Create (`revision: None`) or update an item.
    async fn put_item(
        &self,
        path: &str,
        content: &str,
        revision: Option<&str>,
        message: &str,
    ) -> Result<(), StorageError>;

    async fn delete_item(
        &self,
        path: &str,
        revision: &str,
        message: &str,
    ) -> Result<(), StorageError>;

    /// Copy `content` to `to`, then delete `from` at `revision`.
    ///
    /// The delete only runs after the copy succeeded.
    async fn move_item(
        &self,
        from: &str,
        revision: &str,
        to: &str,
        content: &str,
        message: &str,
    ) -> Result<(), MoveError> {
        self.put_item(to, content, None, message)
            .await
            .map_err(|source| MoveError::Copy {
                to: to.to_string(),
                source,
            })?;
        self.delete_item(from, revision, message)
            .await
            .map_err(|source| MoveError::Delete {
                from: from.to_string(),
                to: to.to_string(),
                source,
            })
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

/// [`RecordStore`] backed by the GitHub repository contents API.
pub struct GitHubStore {
    client: reqwest::Client,
    api_url: String,
    token: String,
    /// `owner/name`
    repo: String,
    branch: String,
}

impl GitHubStore {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("jc-nag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorageError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
            repo: repo.into(),
            branch: branch.into(),
        })
    }

    /// `{api}/repos/{owner}/{name}/contents/{path}` with each segment encoded.
    pub fn contents_url(&self, path: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| StorageError::Request(format!("bad API url {}: {e}", self.api_url)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Request(format!("API url {} cannot be a base", self.api_url)))?
            .pop_if_empty()
            .push("repos")
            .extend(self.repo.split('/'))
            .push("contents")
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
    }

    /// Fetch by repository path rather than item URL.
    pub async fn get_path(&self, path: &str) -> Result<FetchedItem, StorageError> {
        let mut url = self.contents_url(path)?;
        url.query_pairs_mut().append_pair("ref", &self.branch);
        self.get_item(url.as_str()).await
    }
}

#[async_trait]
impl RecordStore for GitHubStore {
    async fn list_items(&self, collection: &str) -> Result<Vec<ItemRef>, StorageError> {
        let mut url = self.contents_url(collection)?;
        url.query_pairs_mut().append_pair("ref", &self.branch);
        debug!(%url, "Listing collection");

        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let response = check_status(response, collection).await?;

        response
            .json::<Vec<ItemRef>>()
            .await
            .map_err(|e| StorageError::Decode(format!("listing of {collection}: {e}")))
    }

    async fn get_item(&self, url: &str) -> Result<FetchedItem, StorageError> {
        let response = self
            .authed(self.client.get(url))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let response = check_status(response, url).await?;
        let modified_at = last_modified(&response, url);

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Decode(format!("{url}: {e}")))?;
        let content = decode_content(&body.content)?;

        Ok(FetchedItem {
            path: body.path,
            revision: body.sha,
            url: url.to_string(),
            content,
            modified_at,
        })
    }

    async fn put_item(
        &self,
        path: &str,
        content: &str,
        revision: Option<&str>,
        message: &str,
    ) -> Result<(), StorageError> {
        let url = self.contents_url(path)?;
        let request = PutRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content),
            branch: &self.branch,
            sha: revision,
        };
        debug!(path, revision = ?revision, "Writing item");

        let response = self
            .authed(self.client.put(url))
            .json(&request)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        check_status(response, path).await.map(|_| ())
    }

    async fn delete_item(
        &self,
        path: &str,
        revision: &str,
        message: &str,
    ) -> Result<(), StorageError> {
        let url = self.contents_url(path)?;
        let request = DeleteRequest {
            message,
            sha: revision,
            branch: &self.branch,
        };
        debug!(path, revision, "Deleting item");

        let response = self
            .authed(self.client.delete(url))
            .json(&request)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        check_status(response, path).await.map(|_| ())
    }
}

async fn check_status(response: Response, target: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(target.to_string()),
        StatusCode::CONFLICT => StorageError::Conflict {
            path: target.to_string(),
            message: body,
        },
        _ => StorageError::Status {
            status: status.as_u16(),
            body,
        },
    })
}

/// Provider-reported modification time; epoch when the header is unusable so
/// such items sort first rather than disappearing.
fn last_modified(response: &Response, url: &str) -> DateTime<Utc> {
    let parsed = response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok());
    match parsed {
        Some(ts) => ts.with_timezone(&Utc),
        None => {
            warn!(url, "Missing or malformed Last-Modified header");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

/// GitHub wraps base64 content at 60 columns.
pub fn decode_content(encoded: &str) -> Result<String, StorageError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| StorageError::Decode(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| StorageError::Decode(format!("content is not UTF-8: {e}")))
}
