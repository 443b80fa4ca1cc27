//! Request payloads for peer-initiated commands.
//!
//! Field names are wire-stable; the peer is an external process with its
//! own release cycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Send a text message, optionally as a thread reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub chat_guid: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_part: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Send a file already staged on local disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMediaRequest {
    pub chat_guid: String,
    pub path_on_disk: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_audio_message: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Attach a tapback reaction to a message part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTapbackRequest {
    pub chat_guid: String,
    pub target_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_part: Option<u32>,
    /// Raw tapback type; 2000-2005 add, 3000-3005 remove.
    #[serde(rename = "type")]
    pub tapback_type: i32,
}

/// Mark everything up to a message as read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReadReceiptRequest {
    pub chat_guid: String,
    pub read_up_to: String,
}

/// Forward the peer user's typing state into a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTypingRequest {
    pub chat_guid: String,
    pub typing: bool,
}

/// List chats with activity at or after a timestamp (unix ms).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChatsRequest {
    #[serde(default)]
    pub min_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChatRequest {
    pub chat_guid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChatAvatarRequest {
    pub chat_guid: String,
}

/// Fetch messages created after a timestamp (unix ms), oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessagesAfterRequest {
    pub chat_guid: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Fetch the newest messages in a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRecentMessagesRequest {
    pub chat_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Resolve a free-form identifier (phone number, email) to a chat GUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveIdentifierRequest {
    pub identifier: String,
}

/// Ensure a DM chat exists for a GUID before the peer bridges into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareDmRequest {
    pub guid: String,
}
