//! Structured message representation produced by ingestion.
//!
//! A [`Message`] is built exactly once from a raw store record, is immutable
//! afterwards, and is never persisted by this layer -- the backing store
//! stays the system of record. Timestamps are unix milliseconds with 0
//! meaning "unset".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chats::Service;

/// One resolved chat item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message GUID, globally unique within a service.
    pub guid: String,

    /// Identifier of the chat this message belongs to.
    pub chat_id: String,

    pub service: Service,

    /// Sender handle; `None` for messages sent from this account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    #[serde(default)]
    pub is_from_me: bool,

    /// Creation time, unix milliseconds.
    pub time: i64,

    /// Delivery receipt time; 0 when not delivered.
    #[serde(default)]
    pub time_delivered: i64,

    /// Read receipt time; 0 when unread.
    #[serde(default)]
    pub time_read: i64,

    /// Playback time for audio messages; 0 when never played.
    #[serde(default)]
    pub time_played: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default)]
    pub is_delivered: bool,

    #[serde(default)]
    pub is_sos: bool,

    #[serde(default)]
    pub is_typing: bool,

    #[serde(default)]
    pub is_cancel_typing: bool,

    #[serde(default)]
    pub is_audio_message: bool,

    /// Raw thread identifier as stored by the daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_identifier: Option<String>,

    /// GUID of the message that started the thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_originator: Option<String>,

    /// Part index within the originator the thread hangs off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_originator_part: Option<u32>,

    /// Tapback/edit target, if this message annotates another one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_message_guid: Option<String>,

    /// Ordered content blocks.
    pub items: Vec<MessageItem>,
}

impl Message {
    /// Whether the message carries any renderable content.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One typed sub-item of a message, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageItem {
    Text {
        text: String,
    },
    Attachment {
        transfer_guid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Plugin {
        bundle_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

/// Acknowledgement for an accepted outbound send.
///
/// The full message flows back later as a `message` event once the daemon
/// commits it; the receipt only carries what the peer needs to correlate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub guid: String,
    pub service: Service,
    /// Unix milliseconds at which the send was accepted.
    pub timestamp: i64,
}

impl MessageReceipt {
    /// Receipt stamped with the current wall clock.
    pub fn accepted_now(guid: impl Into<String>, service: Service) -> Self {
        Self {
            guid: guid.into(),
            service,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
