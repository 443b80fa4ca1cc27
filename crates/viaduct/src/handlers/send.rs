//! Outbound send/typing/read-receipt handlers.
//!
//! These forward to the daemon's send surface and shape the receipt; the
//! committed message itself flows back later as a `message` event.

use std::path::Path;
use std::sync::Arc;

use viaduct_protocol::{Command, ResponsePayload};

use crate::dispatch::{Deps, HandlerResult};

use super::{mismatch, parse_chat_guid};

pub(super) async fn send_message(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::SendMessage(req) => req,
        other => return Err(mismatch("send_message", &other)),
    };
    let chat = parse_chat_guid(&req.chat_guid)?;
    let reply_to = req
        .reply_to
        .as_deref()
        .map(|guid| (guid, req.reply_to_part.unwrap_or(0)));
    let receipt = deps.sender.send_text(&chat, &req.text, reply_to).await?;
    Ok(Some(ResponsePayload::MessageReceipt { receipt }))
}

pub(super) async fn send_media(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::SendMedia(req) => req,
        other => return Err(mismatch("send_media", &other)),
    };
    let chat = parse_chat_guid(&req.chat_guid)?;
    let receipt = deps
        .sender
        .send_media(
            &chat,
            Path::new(&req.path_on_disk),
            &req.file_name,
            req.is_audio_message.unwrap_or(false),
        )
        .await?;
    Ok(Some(ResponsePayload::MessageReceipt { receipt }))
}

pub(super) async fn send_tapback(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::SendTapback(req) => req,
        other => return Err(mismatch("send_tapback", &other)),
    };
    let chat = parse_chat_guid(&req.chat_guid)?;
    let receipt = deps
        .sender
        .send_tapback(&chat, &req.target_guid, req.target_part, req.tapback_type)
        .await?;
    Ok(Some(ResponsePayload::MessageReceipt { receipt }))
}

pub(super) async fn send_read_receipt(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::SendReadReceipt(req) => req,
        other => return Err(mismatch("send_read_receipt", &other)),
    };
    let chat = parse_chat_guid(&req.chat_guid)?;
    deps.sender.mark_read(&chat, &req.read_up_to).await?;
    Ok(Some(ResponsePayload::Ack {}))
}

/// Fire-and-forget: failures are logged by the dispatcher, never replied.
pub(super) async fn set_typing(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::SetTyping(req) => req,
        other => return Err(mismatch("set_typing", &other)),
    };
    let chat = parse_chat_guid(&req.chat_guid)?;
    deps.sender.set_typing(&chat, req.typing).await?;
    Ok(None)
}
