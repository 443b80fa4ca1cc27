//! Correlation registry for outbound-initiated requests.
//!
//! Maps an outstanding request id to its single-fulfillment completion
//! handle. Ids are assigned monotonically and never reused while
//! outstanding. Every entry carries a deadline; a request the peer never
//! answers fails with [`RequestError::Timeout`] and its entry is evicted,
//! so abandoned ids cannot grow the table without bound.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, oneshot};
use tracing::debug;

use viaduct_protocol::{ErrorPayload, ResponsePayload};

/// Outcome of a correlated request: the peer's success payload or its
/// structured error.
pub type ReplyResult = Result<ResponsePayload, ErrorPayload>;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,

    #[error("peer replied {}: {}", .0.code, .0.message)]
    Peer(ErrorPayload),

    #[error("channel closed before a reply arrived")]
    ChannelClosed,
}

pub struct CorrelationRegistry {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<ReplyResult>>>,
    timeout: Duration,
}

impl CorrelationRegistry {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            timeout,
        })
    }

    /// Allocate a fresh id and register its completion handle.
    pub async fn register(&self) -> (u64, oneshot::Receiver<ReplyResult>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        (id, rx)
    }

    /// Await the reply for `id`, enforcing the registry deadline.
    pub async fn wait(
        &self,
        id: u64,
        rx: oneshot::Receiver<ReplyResult>,
    ) -> Result<ResponsePayload, RequestError> {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(error))) => Err(RequestError::Peer(error)),
            Ok(Err(_)) => Err(RequestError::ChannelClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                debug!(id, "outbound request timed out");
                Err(RequestError::Timeout)
            }
        }
    }

    /// Complete the pending request for `id`. Returns false when no such
    /// request is outstanding (late reply after timeout, or a reply the
    /// peer invented).
    pub async fn fulfill(&self, id: u64, result: ReplyResult) -> bool {
        let Some(tx) = self.pending.lock().await.remove(&id) else {
            return false;
        };
        tx.send(result).is_ok()
    }

    /// Drop a pending entry without completing it.
    pub async fn abort(&self, id: u64) {
        self.pending.lock().await.remove(&id);
    }

    /// Fail every outstanding request; used when the channel closes.
    pub async fn drain(&self) {
        self.pending.lock().await.clear();
    }

    pub async fn outstanding(&self) -> usize {
        self.pending.lock().await.len()
    }
}
