//! Protocol error codes and payloads.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures while parsing wire-level identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("unknown chat style: {0}")]
    UnknownChatStyle(u8),

    #[error("malformed chat guid: {0}")]
    MalformedChatGuid(String),
}

/// Stable machine-readable error codes carried in `error` replies.
///
/// The peer matches on these strings; never rename a variant's wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ChatNotFound,
    MessageNotFound,
    DecodeError,
    Timeout,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatNotFound => "chat_not_found",
            Self::MessageNotFound => "message_not_found",
            Self::DecodeError => "decode_error",
            Self::Timeout => "timeout",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an `error` reply: stable code plus human-readable detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn chat_not_found(chat_guid: &str) -> Self {
        Self::new(ErrorCode::ChatNotFound, format!("no chat with guid {chat_guid}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}
