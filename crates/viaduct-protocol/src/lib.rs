//! Canonical wire and domain types for the Viaduct bridge protocol.
//!
//! The bridge peer and the daemon side exchange newline-delimited JSON
//! envelopes over an ordered byte stream. Every envelope is a single JSON
//! object tagged by a `kind` discriminator, optionally carrying a numeric
//! correlation `id`. This crate defines the envelope, every command and
//! event payload, and the structured chat-item/chat representations the
//! resolution pipeline produces.
//!
//! Nothing in here does I/O; framing and dispatch live in the `viaduct`
//! crate.

pub mod chats;
pub mod envelope;
pub mod error;
pub mod events;
pub mod messages;
pub mod requests;

pub use chats::{ChatGuid, ChatSnapshot, ChatStyle, Service};
pub use envelope::{Command, Envelope, LogLevel, LogPayload, ResponsePayload};
pub use error::{ErrorCode, ErrorPayload, ParseError};
pub use events::{BridgeStatusEvent, MessageStatusEvent, ReadReceiptEvent, TypingEvent};
pub use messages::{Message, MessageItem, MessageReceipt};
