//! Record Loader — list the active collection and parse every record in it.
//!
//! Item fetches fan out on a `JoinSet` and are joined settle-all: every fetch
//! finishes (or fails) before parsing starts, and a failed fetch only costs
//! that one record. Failures are logged and dropped, never retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use staleness::{Record, StalenessPolicy, StorageHandle};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::{RunError, StorageError};
use crate::storage::{FetchedItem, RecordStore};

pub struct RecordLoader {
    store: Arc<dyn RecordStore>,
    collection: String,
    policy: StalenessPolicy,
}

impl RecordLoader {
    pub fn new(
        store: Arc<dyn RecordStore>,
        collection: impl Into<String>,
        policy: StalenessPolicy,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            policy,
        }
    }

    /// Every record in the collection that could be fetched, in listing order.
    ///
    /// Only a failure to list the collection itself is an error.
    pub async fn load_records(&self) -> Result<Vec<Record>, RunError> {
        let items = self
            .store
            .list_items(&self.collection)
            .await
            .map_err(RunError::Listing)?;

        let mut join_set: JoinSet<(usize, String, Result<FetchedItem, StorageError>)> =
            JoinSet::new();
        for (index, item) in items.into_iter().filter(|i| i.is_file()).enumerate() {
            let store = Arc::clone(&self.store);
            join_set.spawn(async move {
                let fetched = store.get_item(&item.url).await;
                (index, item.path, fetched)
            });
        }

        let mut settled = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, _, Ok(item))) => settled.push((index, item)),
                Ok((_, path, Err(e))) => {
                    warn!(%path, error = %e, "Dropping record that failed to load");
                }
                Err(e) => warn!(error = %e, "Record fetch task panicked"),
            }
        }
        settled.sort_by_key(|(index, _)| *index);

        let records: Vec<Record> = settled
            .into_iter()
            .map(|(_, item)| to_record(item))
            .collect();
        debug!(count = records.len(), collection = %self.collection, "Loaded records");
        Ok(records)
    }

    /// Records due for their next message at `now`.
    pub async fn load_eligible_records(&self, now: DateTime<Utc>) -> Result<Vec<Record>, RunError> {
        let records = self.load_records().await?;
        let total = records.len();

        let eligible: Vec<Record> = self
            .policy
            .filter_eligible(records, now)
            .into_iter()
            .filter(|record| {
                if record.last_message_level.is_terminal() {
                    warn!(
                        record_id = %record.id,
                        path = %record.storage.path,
                        "Deactivated record still in active collection; skipping"
                    );
                    return false;
                }
                true
            })
            .collect();

        info!(total, eligible = eligible.len(), "Filtered records");
        Ok(eligible)
    }
}

fn to_record(item: FetchedItem) -> Record {
    let handle = StorageHandle {
        path: item.path,
        revision: item.revision,
        url: item.url,
        content: item.content,
    };
    Record::from_stored(handle, item.modified_at)
}
