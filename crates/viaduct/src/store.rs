//! Backing-store collaborator interface.
//!
//! The record store is the external, read-mostly source of historical
//! messages. All calls are synchronous/blocking from this crate's point of
//! view; the resolution pipeline moves them onto the blocking pool so they
//! never stall unrelated requests.

use thiserror::Error;

use viaduct_protocol::Service;

/// Daemon-native flag bits carried on raw records.
pub mod flags {
    /// Message finished sending (or a completed typing tombstone).
    pub const FINISHED: u64 = 0x1;
    /// Delivery receipt recorded.
    pub const DELIVERED: u64 = 0x4;
    /// Emergency (SOS) message.
    pub const SOS: u64 = 0x10;
    /// Audio message.
    pub const AUDIO: u64 = 0x20;
    /// Typing indicator record.
    pub const TYPING: u64 = 0x40;
}

/// One unconverted record as the store hands it back.
///
/// Timestamps are unix milliseconds, 0 = unset. `chat_identifier` may be
/// absent at fetch time and is then filled in from the requesting context
/// during ingestion.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub guid: String,
    pub chat_identifier: Option<String>,
    pub service: Option<Service>,
    pub sender: Option<String>,
    pub is_from_me: bool,
    pub time: i64,
    pub time_delivered: i64,
    pub time_read: i64,
    pub time_played: i64,
    pub subject: Option<String>,
    pub flags: u64,
    pub thread_identifier: Option<String>,
    pub associated_message_guid: Option<String>,
    pub parts: Vec<RawPart>,
}

/// Raw content block inside a record.
#[derive(Debug, Clone)]
pub enum RawPart {
    Text(String),
    Attachment {
        transfer_guid: String,
        file_name: Option<String>,
        mime_type: Option<String>,
    },
    Plugin {
        bundle_id: String,
        payload: Option<serde_json::Value>,
    },
}

/// (message GUID, chat identifier) pair from the store's per-chat index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub message_guid: String,
    pub chat_identifier: String,
}

/// Bounds for per-chat index queries.
///
/// When both a time bound and a GUID bound are present, the GUID bound
/// wins for exclusivity. `limit` applies per chat, never globally.
#[derive(Debug, Clone, Default)]
pub struct QueryBounds {
    pub after_time: Option<i64>,
    pub before_time: Option<i64>,
    pub after_guid: Option<String>,
    pub before_guid: Option<String>,
    pub limit: Option<usize>,
}

/// Store failures. Cloneable so a shared in-flight batch can fan the same
/// failure out to every attached caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record store returned malformed data: {0}")]
    Malformed(String),
}

/// The backing message store.
pub trait MessageStore: Send + Sync + 'static {
    /// Fetch raw records for a set of message GUIDs. GUIDs the store does
    /// not know are simply absent from the result, not an error.
    fn records_for_guids(&self, guids: &[String]) -> Result<Vec<RawRecord>, StoreError>;

    /// Ordered newest-first (message GUID, chat identifier) pairs per chat,
    /// honoring [`QueryBounds`].
    fn newest_guid_refs(
        &self,
        chat_identifiers: &[String],
        bounds: &QueryBounds,
    ) -> Result<Vec<RecordRef>, StoreError>;

    /// Full-text search returning matching message GUIDs, newest first.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, StoreError>;
}
