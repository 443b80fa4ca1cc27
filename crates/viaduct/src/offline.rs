//! Offline collaborator adapters.
//!
//! Used when no daemon adapters are wired in (protocol smoke testing,
//! development on platforms without the messaging daemon). Queries resolve
//! to nothing, sends fail cleanly, and the engine itself stays fully
//! exercisable.

use async_trait::async_trait;

use viaduct_protocol::{ChatGuid, MessageReceipt, Service};

use crate::registry::{ChatRegistry, MessageSender, RegisteredChat, RegistryError, SendError};
use crate::store::{MessageStore, QueryBounds, RawRecord, RecordRef, StoreError};

pub struct OfflineStore;

impl MessageStore for OfflineStore {
    fn records_for_guids(&self, _guids: &[String]) -> Result<Vec<RawRecord>, StoreError> {
        Ok(Vec::new())
    }

    fn newest_guid_refs(
        &self,
        _chat_identifiers: &[String],
        _bounds: &QueryBounds,
    ) -> Result<Vec<RecordRef>, StoreError> {
        Ok(Vec::new())
    }

    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

pub struct OfflineRegistry;

impl ChatRegistry for OfflineRegistry {
    fn chat(
        &self,
        _identifier: &str,
        _service: Service,
        _style: viaduct_protocol::ChatStyle,
    ) -> Option<RegisteredChat> {
        None
    }

    fn chats_since(&self, _min_timestamp: i64) -> Vec<RegisteredChat> {
        Vec::new()
    }

    fn siblings(&self, chat: &RegisteredChat) -> Vec<RegisteredChat> {
        vec![chat.clone()]
    }

    fn resolve_identifier(&self, _identifier: &str) -> Option<ChatGuid> {
        None
    }

    fn prepare_dm(&self, guid: &ChatGuid) -> Result<(), RegistryError> {
        Err(RegistryError::Unreachable(guid.to_string()))
    }

    fn group_photo_path(&self, _identifier: &str, _service: Service) -> Option<std::path::PathBuf> {
        None
    }
}

pub struct OfflineSender;

#[async_trait]
impl MessageSender for OfflineSender {
    async fn send_text(
        &self,
        chat: &ChatGuid,
        _text: &str,
        _reply_to: Option<(&str, u32)>,
    ) -> Result<MessageReceipt, SendError> {
        Err(SendError::ChatNotFound(chat.to_string()))
    }

    async fn send_media(
        &self,
        chat: &ChatGuid,
        _path: &std::path::Path,
        _file_name: &str,
        _is_audio: bool,
    ) -> Result<MessageReceipt, SendError> {
        Err(SendError::ChatNotFound(chat.to_string()))
    }

    async fn send_tapback(
        &self,
        chat: &ChatGuid,
        _target_guid: &str,
        _target_part: Option<u32>,
        _tapback_type: i32,
    ) -> Result<MessageReceipt, SendError> {
        Err(SendError::ChatNotFound(chat.to_string()))
    }

    async fn mark_read(&self, chat: &ChatGuid, _read_up_to: &str) -> Result<(), SendError> {
        Err(SendError::ChatNotFound(chat.to_string()))
    }

    async fn set_typing(&self, chat: &ChatGuid, _typing: bool) -> Result<(), SendError> {
        Err(SendError::ChatNotFound(chat.to_string()))
    }
}
