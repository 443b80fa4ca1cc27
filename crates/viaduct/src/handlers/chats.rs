//! Chat lookup and identity handlers, backed by the live registry.

use std::sync::Arc;

use viaduct_protocol::{Command, ResponsePayload};

use crate::dispatch::{CommandError, Deps, HandlerResult};

use super::{lookup_chat, mismatch, parse_chat_guid};

pub(super) async fn get_chats(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::GetChats(req) => req,
        other => return Err(mismatch("get_chats", &other)),
    };
    let chats = deps
        .registry
        .chats_since(req.min_timestamp)
        .iter()
        .map(|chat| chat.snapshot())
        .collect();
    Ok(Some(ResponsePayload::Chats { chats }))
}

pub(super) async fn get_chat(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::GetChat(req) => req,
        other => return Err(mismatch("get_chat", &other)),
    };
    let chat = lookup_chat(&deps, &req.chat_guid)?;
    Ok(Some(ResponsePayload::ChatInfo {
        chat: chat.snapshot(),
    }))
}

pub(super) async fn get_chat_avatar(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::GetChatAvatar(req) => req,
        other => return Err(mismatch("get_chat_avatar", &other)),
    };
    let guid = parse_chat_guid(&req.chat_guid)?;
    match deps.registry.group_photo_path(&guid.identifier, guid.service) {
        Some(path) => Ok(Some(ResponsePayload::Avatar {
            avatar: path.to_string_lossy().into_owned(),
        })),
        None => Ok(Some(ResponsePayload::Ack {})),
    }
}

pub(super) async fn resolve_identifier(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::ResolveIdentifier(req) => req,
        other => return Err(mismatch("resolve_identifier", &other)),
    };
    let guid = deps
        .registry
        .resolve_identifier(&req.identifier)
        .ok_or_else(|| CommandError::ChatNotFound(req.identifier.clone()))?;
    Ok(Some(ResponsePayload::ChatResolved {
        chat_guid: guid.to_string(),
    }))
}

pub(super) async fn prepare_dm(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::PrepareDm(req) => req,
        other => return Err(mismatch("prepare_dm", &other)),
    };
    let guid = parse_chat_guid(&req.guid)?;
    deps.registry.prepare_dm(&guid)?;
    Ok(Some(ResponsePayload::Ack {}))
}
