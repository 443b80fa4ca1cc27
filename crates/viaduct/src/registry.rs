//! Live daemon collaborators: chat/handle registry and outbound sending.
//!
//! Unlike the backing store, the registry reflects the messaging daemon's
//! current in-memory state. Lookups are cheap; snapshots are built on
//! demand and never cached here.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use viaduct_protocol::{ChatGuid, ChatSnapshot, ChatStyle, MessageReceipt, Service};

/// A chat as the live registry knows it.
#[derive(Debug, Clone)]
pub struct RegisteredChat {
    pub identifier: String,
    pub service: Service,
    pub style: ChatStyle,
    pub room_name: Option<String>,
    pub display_name: Option<String>,
    /// Recent participant handles, most recent first. May contain
    /// duplicates; snapshotting de-duplicates while preserving order.
    pub participants: Vec<String>,
    pub unread_message_count: u64,
    pub message_failure_count: u64,
    pub last_message: Option<String>,
    /// Unix milliseconds; 0 when the chat has no messages.
    pub last_message_time: i64,
    pub read_receipts: bool,
    pub ignore_alerts: bool,
    pub group_photo_id: Option<String>,
}

impl RegisteredChat {
    /// Wire snapshot of this chat.
    pub fn snapshot(&self) -> ChatSnapshot {
        let mut participants = Vec::with_capacity(self.participants.len());
        for handle in &self.participants {
            if !participants.contains(handle) {
                participants.push(handle.clone());
            }
        }
        ChatSnapshot {
            chat_guid: ChatGuid::new(
                self.service,
                self.style == ChatStyle::Group,
                self.identifier.clone(),
            )
            .to_string(),
            service: self.service,
            style: self.style,
            room_name: self.room_name.clone(),
            display_name: self.display_name.clone(),
            participants,
            unread_message_count: self.unread_message_count,
            message_failure_count: self.message_failure_count,
            last_message: self.last_message.clone(),
            last_message_time: self.last_message_time,
            read_receipts: self.read_receipts,
            ignore_alerts: self.ignore_alerts,
            group_photo_id: self.group_photo_id.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no chat with identifier {0}")]
    ChatNotFound(String),

    #[error("identifier {0} cannot be reached on any service")]
    Unreachable(String),

    #[error("registry failure: {0}")]
    Internal(String),
}

/// Chat lookup and identity resolution against the live daemon.
pub trait ChatRegistry: Send + Sync + 'static {
    /// Look up a chat by (identifier, service, style).
    fn chat(&self, identifier: &str, service: Service, style: ChatStyle)
    -> Option<RegisteredChat>;

    /// Chats with activity at or after `min_timestamp` (unix ms).
    fn chats_since(&self, min_timestamp: i64) -> Vec<RegisteredChat>;

    /// The chat plus every sibling carrying the same conversation on a
    /// merged service (e.g. the SMS twin of an iMessage chat). Always
    /// contains at least `chat` itself.
    fn siblings(&self, chat: &RegisteredChat) -> Vec<RegisteredChat>;

    /// Resolve a free-form identifier (phone number, email) to the chat
    /// GUID the daemon would use for it.
    fn resolve_identifier(&self, identifier: &str) -> Option<ChatGuid>;

    /// Make sure a DM chat exists for the GUID, creating it if needed.
    fn prepare_dm(&self, guid: &ChatGuid) -> Result<(), RegistryError>;

    /// Local path of the chat's group photo, if it has one.
    fn group_photo_path(&self, identifier: &str, service: Service) -> Option<PathBuf>;
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("no chat with guid {0}")]
    ChatNotFound(String),

    #[error("no message with guid {0}")]
    MessageNotFound(String),

    #[error("send failed: {0}")]
    Failed(String),
}

/// Outbound surface of the messaging daemon.
///
/// Sends return a receipt as soon as the daemon accepts the message; the
/// full message flows back asynchronously as a `message` event.
#[async_trait]
pub trait MessageSender: Send + Sync + 'static {
    async fn send_text(
        &self,
        chat: &ChatGuid,
        text: &str,
        reply_to: Option<(&str, u32)>,
    ) -> Result<MessageReceipt, SendError>;

    async fn send_media(
        &self,
        chat: &ChatGuid,
        path: &std::path::Path,
        file_name: &str,
        is_audio: bool,
    ) -> Result<MessageReceipt, SendError>;

    async fn send_tapback(
        &self,
        chat: &ChatGuid,
        target_guid: &str,
        target_part: Option<u32>,
        tapback_type: i32,
    ) -> Result<MessageReceipt, SendError>;

    async fn mark_read(&self, chat: &ChatGuid, read_up_to: &str) -> Result<(), SendError>;

    async fn set_typing(&self, chat: &ChatGuid, typing: bool) -> Result<(), SendError>;
}
