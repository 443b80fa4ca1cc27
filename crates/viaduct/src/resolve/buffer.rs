//! Pending-fetch buffer: GUID to shared in-flight batch future.
//!
//! While a GUID's fetch is outstanding, any new request for it attaches to
//! the existing future instead of issuing a duplicate store query. Entries
//! are evicted when their batch resolves; completed work is never retained.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;

use viaduct_protocol::Message;

use super::pipeline::ResolveError;

/// Eventual outcome of one batched store fetch, keyed by GUID. Shared by
/// every caller that attached while the batch was in flight.
pub type BatchResult = Result<Arc<HashMap<String, Message>>, ResolveError>;

/// A batch future that can be awaited by any number of callers.
pub type SharedBatch = Shared<BoxFuture<'static, BatchResult>>;

#[derive(Default)]
pub struct FetchBuffer {
    inner: Mutex<HashMap<String, SharedBatch>>,
}

impl FetchBuffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Split `guids` into (batches already in flight, GUIDs this caller now
    /// owns), publishing `pending` for the owned GUIDs in the same critical
    /// section. The atomicity is the point: two callers racing on the same
    /// GUID must see exactly one of them claim it, so each GUID gets at
    /// most one store fetch. The buffered list is de-duplicated -- ten
    /// GUIDs living in one in-flight batch yield that batch once.
    pub async fn claim(&self, guids: &[String], pending: &SharedBatch) -> (Vec<SharedBatch>, Vec<String>) {
        let mut inner = self.inner.lock().await;
        let mut buffered: Vec<SharedBatch> = Vec::new();
        let mut remaining = Vec::new();
        for guid in guids {
            match inner.get(guid) {
                Some(batch) => {
                    if !buffered.iter().any(|known| known.ptr_eq(batch)) {
                        buffered.push(batch.clone());
                    }
                }
                None => {
                    inner.insert(guid.clone(), pending.clone());
                    remaining.push(guid.clone());
                }
            }
        }
        (buffered, remaining)
    }

    /// Evict the entries for a resolved batch.
    pub async fn release(&self, guids: &[String]) {
        let mut inner = self.inner.lock().await;
        for guid in guids {
            inner.remove(guid);
        }
    }

    pub async fn in_flight(&self) -> usize {
        self.inner.lock().await.len()
    }
}
