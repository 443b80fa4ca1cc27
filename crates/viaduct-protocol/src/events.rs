//! Unsolicited event payloads pushed to the peer without a correlation id.

use serde::{Deserialize, Serialize};

use crate::chats::Service;

/// A read receipt observed by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceiptEvent {
    pub chat_guid: String,
    /// GUID of the newest message covered by the receipt.
    pub read_up_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_guid: Option<String>,
    #[serde(default)]
    pub is_from_me: bool,
}

/// Typing state change in a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingEvent {
    pub chat_guid: String,
    pub typing: bool,
}

/// Delivery progress for a previously accepted outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStatusEvent {
    pub guid: String,
    pub chat_guid: String,
    pub service: Service,
    /// `sent`, `delivered`, or `failed`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Coarse bridge health, surfaced to the peer's status tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatusEvent {
    /// `connected`, `transient-disconnect`, or `bad-credentials`.
    pub state_event: String,
    /// Seconds the peer may consider this state fresh.
    pub ttl: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
