//! The wire envelope and the closed command set.
//!
//! Every frame on the stream is one JSON object: an optional numeric
//! correlation `id` plus a payload selected by the `kind` discriminator.
//! Decoding always goes through the discriminator, never trial-and-error.
//!
//! Two invariants the engine relies on:
//! - `log` envelopes never carry an id, in either direction.
//! - Reply envelopes (`response`/`error`) reuse the inbound id verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chats::ChatSnapshot;
use crate::error::ErrorPayload;
use crate::events::{BridgeStatusEvent, MessageStatusEvent, ReadReceiptEvent, TypingEvent};
use crate::messages::{Message, MessageReceipt};
use crate::requests::*;

/// One framed protocol message: request, reply, or event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id linking a request to its eventual reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub command: Command,
}

impl Envelope {
    pub fn new(id: Option<u64>, command: Command) -> Self {
        // Log frames are exempt from id propagation entirely.
        let id = if matches!(command, Command::Log(_)) {
            None
        } else {
            id
        };
        Self { id, command }
    }

    /// Event envelope: no id, no reply expected.
    pub fn event(command: Command) -> Self {
        Self::new(None, command)
    }

    /// Success reply correlated to an inbound request id.
    pub fn response(id: u64, payload: ResponsePayload) -> Self {
        Self::new(Some(id), Command::Response(payload))
    }

    /// Error reply correlated to an inbound request id.
    pub fn error(id: u64, payload: ErrorPayload) -> Self {
        Self::new(Some(id), Command::Error(payload))
    }
}

/// Closed set of command kinds, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    // -- Peer-initiated requests --
    SendMessage(SendMessageRequest),
    SendMedia(SendMediaRequest),
    SendTapback(SendTapbackRequest),
    SendReadReceipt(SendReadReceiptRequest),
    SetTyping(SetTypingRequest),
    GetChats(GetChatsRequest),
    GetChat(GetChatRequest),
    GetChatAvatar(GetChatAvatarRequest),
    GetMessagesAfter(GetMessagesAfterRequest),
    GetRecentMessages(GetRecentMessagesRequest),
    ResolveIdentifier(ResolveIdentifierRequest),
    PrepareDm(PrepareDmRequest),
    Ping,
    PreStartupSync,

    // -- Daemon-initiated events --
    Message(Message),
    ReadReceipt(ReadReceiptEvent),
    Typing(TypingEvent),
    Chat(ChatSnapshot),
    SendMessageStatus(MessageStatusEvent),
    BridgeStatus(BridgeStatusEvent),

    // -- Replies --
    Response(ResponsePayload),
    Error(ErrorPayload),

    // -- Diagnostics --
    Log(LogPayload),
}

impl Command {
    /// Wire name of the discriminator, for logging and dispatch tables.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "send_message",
            Self::SendMedia(_) => "send_media",
            Self::SendTapback(_) => "send_tapback",
            Self::SendReadReceipt(_) => "send_read_receipt",
            Self::SetTyping(_) => "set_typing",
            Self::GetChats(_) => "get_chats",
            Self::GetChat(_) => "get_chat",
            Self::GetChatAvatar(_) => "get_chat_avatar",
            Self::GetMessagesAfter(_) => "get_messages_after",
            Self::GetRecentMessages(_) => "get_recent_messages",
            Self::ResolveIdentifier(_) => "resolve_identifier",
            Self::PrepareDm(_) => "prepare_dm",
            Self::Ping => "ping",
            Self::PreStartupSync => "pre_startup_sync",
            Self::Message(_) => "message",
            Self::ReadReceipt(_) => "read_receipt",
            Self::Typing(_) => "typing",
            Self::Chat(_) => "chat",
            Self::SendMessageStatus(_) => "send_message_status",
            Self::BridgeStatus(_) => "bridge_status",
            Self::Response(_) => "response",
            Self::Error(_) => "error",
            Self::Log(_) => "log",
        }
    }

    /// Whether an inbound envelope of this kind is a fire-and-forget
    /// notification rather than a request expecting a reply.
    /// `set_typing` is fire-and-forget; the rest are daemon-side pushes.
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            Self::Message(_)
                | Self::ReadReceipt(_)
                | Self::Typing(_)
                | Self::Chat(_)
                | Self::SendMessageStatus(_)
                | Self::BridgeStatus(_)
                | Self::Log(_)
                | Self::SetTyping(_)
        )
    }
}

/// Success payloads, flattened into the `response` envelope.
///
/// Serialization picks the variant statically; deserialization (only needed
/// for replies to our own outbound requests) distinguishes by the variant's
/// characteristic field, with the bare ack last.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Messages { messages: Vec<Message> },
    Chats { chats: Vec<ChatSnapshot> },
    ChatInfo { chat: ChatSnapshot },
    ChatResolved { chat_guid: String },
    MessageReceipt { receipt: MessageReceipt },
    /// Local path of a chat's group photo.
    Avatar { avatar: String },
    Ack {},
}

/// Log line forwarded to the peer's logging pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPayload {
    pub level: LogLevel,
    pub module: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}
