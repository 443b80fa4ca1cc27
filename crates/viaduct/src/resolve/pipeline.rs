//! The resolver: batched, deduplicated lookups against the backing store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

use viaduct_protocol::{Message, Service};

use crate::ingest::{self, IngestContext};
use crate::store::{MessageStore, QueryBounds, StoreError};

use super::buffer::{BatchResult, FetchBuffer, SharedBatch};

/// Whole-batch failure. Partial success within a batch is not a thing:
/// individual GUIDs that fail to resolve are silently omitted, and a store
/// failure fails every caller attached to the batch.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("resolution task failed: {0}")]
    Canceled(String),
}

/// One per-chat slice of a batched fetch.
#[derive(Debug, Clone)]
struct BatchGroup {
    ctx: IngestContext,
    guids: Vec<String>,
}

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn MessageStore>,
    buffer: Arc<FetchBuffer>,
}

impl Resolver {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            buffer: FetchBuffer::new(),
        }
    }

    /// Resolve a flat set of GUIDs, regardless of chat.
    ///
    /// Result order follows the requested order; GUIDs with no data are
    /// omitted.
    pub async fn resolve_by_guids(
        &self,
        guids: &[String],
        ctx: IngestContext,
    ) -> Result<Vec<Message>, ResolveError> {
        let requested = dedup(guids);
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let (pending, completion) = new_pending();
        let (buffered, remaining) = self.buffer.claim(&requested, &pending).await;
        let batch = if remaining.is_empty() {
            // Fully satisfied by in-flight work; no store query at all.
            None
        } else {
            self.drive_batch(
                completion,
                vec![BatchGroup {
                    ctx,
                    guids: remaining,
                }],
            );
            Some(pending)
        };

        collect(&requested, buffered, batch).await
    }

    /// Resolve the most relevant messages for several chats at once,
    /// honoring [`QueryBounds`], then feed the resulting GUIDs through the
    /// graph-aware variant of the GUID resolver so a single store round
    /// trip services every chat.
    pub async fn resolve_by_chats(
        &self,
        chats: &[(String, Service)],
        bounds: QueryBounds,
    ) -> Result<Vec<Message>, ResolveError> {
        if chats.is_empty() {
            return Ok(Vec::new());
        }

        let identifiers: Vec<String> = chats.iter().map(|(id, _)| id.clone()).collect();
        let store = Arc::clone(&self.store);
        let refs = tokio::task::spawn_blocking(move || {
            store.newest_guid_refs(&identifiers, &bounds)
        })
        .await
        .map_err(|err| ResolveError::Canceled(err.to_string()))??;

        // Group the index results per chat, keeping the store's order and
        // dropping duplicate GUIDs (sibling chats can index the same
        // message).
        let mut groups: Vec<BatchGroup> = Vec::new();
        let mut requested = Vec::new();
        let mut seen = HashSet::new();
        for record_ref in refs {
            let Some((_, service)) = chats
                .iter()
                .find(|(id, _)| *id == record_ref.chat_identifier)
            else {
                debug!(chat = %record_ref.chat_identifier, "index returned a chat we did not ask for");
                continue;
            };
            if !seen.insert(record_ref.message_guid.clone()) {
                continue;
            }
            requested.push(record_ref.message_guid.clone());
            match groups
                .iter_mut()
                .find(|g| g.ctx.chat_id.as_deref() == Some(record_ref.chat_identifier.as_str()))
            {
                Some(group) => group.guids.push(record_ref.message_guid),
                None => groups.push(BatchGroup {
                    ctx: IngestContext::for_chat(record_ref.chat_identifier, *service),
                    guids: vec![record_ref.message_guid],
                }),
            }
        }
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let (pending, completion) = new_pending();
        let (buffered, remaining) = self.buffer.claim(&requested, &pending).await;
        let batch = if remaining.is_empty() {
            None
        } else {
            let remaining_set: HashSet<&str> = remaining.iter().map(String::as_str).collect();
            let remaining_groups: Vec<BatchGroup> = groups
                .into_iter()
                .map(|group| BatchGroup {
                    guids: group
                        .guids
                        .into_iter()
                        .filter(|guid| remaining_set.contains(guid.as_str()))
                        .collect(),
                    ctx: group.ctx,
                })
                .filter(|group| !group.guids.is_empty())
                .collect();
            self.drive_batch(completion, remaining_groups);
            Some(pending)
        };

        collect(&requested, buffered, batch).await
    }

    /// Full-text search, resolved through the GUID pipeline.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Message>, ResolveError> {
        let store = Arc::clone(&self.store);
        let query = query.to_string();
        let guids = tokio::task::spawn_blocking(move || store.search(&query, limit))
            .await
            .map_err(|err| ResolveError::Canceled(err.to_string()))??;
        self.resolve_by_guids(&guids, IngestContext::default()).await
    }

    /// Number of GUIDs with an outstanding fetch. Test/diagnostic surface.
    pub async fn in_flight(&self) -> usize {
        self.buffer.in_flight().await
    }

    /// Start the task driving a claimed batch: one blocking store query,
    /// per-group ingestion, buffer eviction, then fan-out to everyone
    /// holding the shared future. Claiming already published the future,
    /// so callers arriving mid-query attach instead of re-fetching.
    fn drive_batch(&self, completion: oneshot::Sender<BatchResult>, groups: Vec<BatchGroup>) {
        let guids: Vec<String> = groups.iter().flat_map(|g| g.guids.clone()).collect();
        let store = Arc::clone(&self.store);
        let buffer = Arc::clone(&self.buffer);
        tokio::spawn(async move {
            let result = fetch_batch(store, &groups).await;
            buffer.release(&guids).await;
            let _ = completion.send(result);
        });
    }
}

/// A not-yet-driven shared batch and its completion handle.
fn new_pending() -> (SharedBatch, oneshot::Sender<BatchResult>) {
    let (tx, rx) = oneshot::channel::<BatchResult>();
    let shared: SharedBatch = rx
        .map(|result| {
            result.unwrap_or_else(|_| Err(ResolveError::Canceled("batch task dropped".into())))
        })
        .boxed()
        .shared();
    (shared, tx)
}

/// One blocking store query for every GUID across `groups`, ingested per
/// group so each message lands with its chat's context.
async fn fetch_batch(store: Arc<dyn MessageStore>, groups: &[BatchGroup]) -> BatchResult {
    let all: Vec<String> = groups.iter().flat_map(|g| g.guids.clone()).collect();
    let fetch_store = Arc::clone(&store);
    let records = tokio::task::spawn_blocking(move || fetch_store.records_for_guids(&all))
        .await
        .map_err(|err| ResolveError::Canceled(err.to_string()))??;

    let mut by_guid: HashMap<String, _> = records
        .into_iter()
        .map(|record| (record.guid.clone(), record))
        .collect();

    let mut out = HashMap::new();
    for group in groups {
        for guid in &group.guids {
            let Some(record) = by_guid.remove(guid) else {
                continue;
            };
            if let Some(message) = ingest::ingest_record(record, &group.ctx) {
                out.insert(message.guid.clone(), message);
            }
        }
    }
    Ok(Arc::new(out))
}

/// Union of the buffered futures' values and the fresh batch's value,
/// one entry per requested GUID that resolved, in requested order.
async fn collect(
    requested: &[String],
    buffered: Vec<SharedBatch>,
    batch: Option<SharedBatch>,
) -> Result<Vec<Message>, ResolveError> {
    let mut resolved: HashMap<String, Message> = HashMap::new();
    for shared in buffered.into_iter().chain(batch) {
        let map = shared.await?;
        for guid in requested {
            if let Some(message) = map.get(guid) {
                resolved
                    .entry(guid.clone())
                    .or_insert_with(|| message.clone());
            }
        }
    }
    Ok(requested
        .iter()
        .filter_map(|guid| resolved.remove(guid))
        .collect())
}

fn dedup(guids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    guids
        .iter()
        .filter(|guid| seen.insert(guid.as_str()))
        .cloned()
        .collect()
}
