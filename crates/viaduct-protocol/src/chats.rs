//! Chat identity and snapshot types.
//!
//! Chats are addressed on the wire by a chat GUID of the form
//! `service;kind;identifier`, e.g. `iMessage;-;+15555550123` for a direct
//! message or `iMessage;+;chat831...` for a group. Snapshots are built on
//! demand from the live daemon registry and never cached by this layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Messaging service a chat or message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Service {
    #[default]
    #[serde(rename = "iMessage")]
    IMessage,
    #[serde(rename = "SMS")]
    Sms,
}

impl Service {
    /// Wire name of the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IMessage => "iMessage",
            Self::Sms => "SMS",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iMessage" => Ok(Self::IMessage),
            "SMS" => Ok(Self::Sms),
            other => Err(ParseError::UnknownService(other.to_string())),
        }
    }
}

/// Chat style, encoded on the wire with the daemon's raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum ChatStyle {
    Group,
    #[default]
    DirectMessage,
}

impl From<ChatStyle> for u8 {
    fn from(style: ChatStyle) -> Self {
        match style {
            ChatStyle::Group => 43,
            ChatStyle::DirectMessage => 45,
        }
    }
}

impl TryFrom<u8> for ChatStyle {
    type Error = ParseError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            43 => Ok(Self::Group),
            45 => Ok(Self::DirectMessage),
            other => Err(ParseError::UnknownChatStyle(other)),
        }
    }
}

/// Parsed form of a wire chat GUID (`service;kind;identifier`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatGuid {
    pub service: Service,
    pub is_group: bool,
    pub identifier: String,
}

impl ChatGuid {
    pub fn new(service: Service, is_group: bool, identifier: impl Into<String>) -> Self {
        Self {
            service,
            is_group,
            identifier: identifier.into(),
        }
    }

    pub fn style(&self) -> ChatStyle {
        if self.is_group {
            ChatStyle::Group
        } else {
            ChatStyle::DirectMessage
        }
    }
}

impl fmt::Display for ChatGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{}",
            self.service,
            if self.is_group { "+" } else { "-" },
            self.identifier
        )
    }
}

impl FromStr for ChatGuid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ';');
        let service = parts
            .next()
            .ok_or_else(|| ParseError::MalformedChatGuid(s.to_string()))?
            .parse::<Service>()?;
        let kind = parts
            .next()
            .ok_or_else(|| ParseError::MalformedChatGuid(s.to_string()))?;
        let identifier = parts
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ParseError::MalformedChatGuid(s.to_string()))?;

        let is_group = match kind {
            "+" => true,
            "-" => false,
            _ => return Err(ParseError::MalformedChatGuid(s.to_string())),
        };

        Ok(Self::new(service, is_group, identifier))
    }
}

/// Point-in-time view of a chat, built from the live daemon registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSnapshot {
    /// Full wire GUID, `service;kind;identifier`.
    pub chat_guid: String,

    pub service: Service,
    pub style: ChatStyle,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Recent participant handles, ordered, de-duplicated.
    pub participants: Vec<String>,

    #[serde(default)]
    pub unread_message_count: u64,

    #[serde(default)]
    pub message_failure_count: u64,

    /// Denormalized summary of the newest finished message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,

    /// Unix milliseconds; 0 when the chat has no messages.
    #[serde(default)]
    pub last_message_time: i64,

    #[serde(default)]
    pub read_receipts: bool,

    #[serde(default)]
    pub ignore_alerts: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_photo_id: Option<String>,
}
