//! Message query handlers, backed by the resolution pipeline.

use std::sync::Arc;

use tracing::debug;

use viaduct_protocol::{Command, ResponsePayload};

use crate::dispatch::{Deps, HandlerResult};
use crate::store::QueryBounds;

use super::{lookup_chat, mismatch, sibling_targets};

pub(super) async fn get_recent_messages(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::GetRecentMessages(req) => req,
        other => return Err(mismatch("get_recent_messages", &other)),
    };

    let chat = lookup_chat(&deps, &req.chat_guid)?;
    let targets = sibling_targets(&deps, &chat);
    let bounds = QueryBounds {
        limit: req.limit,
        ..Default::default()
    };
    let messages = deps.resolver.resolve_by_chats(&targets, bounds).await?;
    Ok(Some(ResponsePayload::Messages { messages }))
}

pub(super) async fn get_messages_after(deps: Arc<Deps>, command: Command) -> HandlerResult {
    let req = match command {
        Command::GetMessagesAfter(req) => req,
        other => return Err(mismatch("get_messages_after", &other)),
    };

    let chat = lookup_chat(&deps, &req.chat_guid)?;
    let siblings = deps.registry.siblings(&chat);

    // If nothing in this conversation is newer than the requested
    // timestamp, the store has nothing for us.
    let newest = siblings
        .iter()
        .map(|sibling| sibling.last_message_time)
        .max()
        .unwrap_or(0);
    if newest < req.timestamp {
        debug!(
            chat = %req.chat_guid,
            newest,
            after = req.timestamp,
            "skipping store query, chat has no newer messages"
        );
        return Ok(Some(ResponsePayload::Messages {
            messages: Vec::new(),
        }));
    }

    let targets: Vec<_> = siblings
        .into_iter()
        .map(|sibling| (sibling.identifier, sibling.service))
        .collect();
    let bounds = QueryBounds {
        after_time: Some(req.timestamp),
        limit: req.limit,
        ..Default::default()
    };
    let messages = deps.resolver.resolve_by_chats(&targets, bounds).await?;
    Ok(Some(ResponsePayload::Messages { messages }))
}
