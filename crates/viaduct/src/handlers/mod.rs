//! Built-in command handlers.
//!
//! Each handler is a thin async fn: parse the chat identity, call the
//! registry/sender/resolver, shape the response payload. Everything heavy
//! lives in the resolution pipeline.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use viaduct_protocol::{ChatGuid, Command};

use crate::dispatch::{CommandError, Deps, Handler, HandlerResult};
use crate::registry::RegisteredChat;

mod chats;
mod lifecycle;
mod queries;
mod send;

/// The kind-to-handler table, built once at engine construction.
pub(crate) fn builtin() -> HashMap<&'static str, Handler> {
    let mut map: HashMap<&'static str, Handler> = HashMap::new();
    register(&mut map, "ping", lifecycle::ping);
    register(&mut map, "pre_startup_sync", lifecycle::pre_startup_sync);
    register(&mut map, "log", lifecycle::log);
    register(&mut map, "get_recent_messages", queries::get_recent_messages);
    register(&mut map, "get_messages_after", queries::get_messages_after);
    register(&mut map, "get_chats", chats::get_chats);
    register(&mut map, "get_chat", chats::get_chat);
    register(&mut map, "get_chat_avatar", chats::get_chat_avatar);
    register(&mut map, "resolve_identifier", chats::resolve_identifier);
    register(&mut map, "prepare_dm", chats::prepare_dm);
    register(&mut map, "send_message", send::send_message);
    register(&mut map, "send_media", send::send_media);
    register(&mut map, "send_tapback", send::send_tapback);
    register(&mut map, "send_read_receipt", send::send_read_receipt);
    register(&mut map, "set_typing", send::set_typing);
    map
}

fn register<F, Fut>(map: &mut HashMap<&'static str, Handler>, kind: &'static str, handler: F)
where
    F: Fn(Arc<Deps>, Command) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    map.insert(kind, Arc::new(move |deps, command| handler(deps, command).boxed()));
}

/// A handler was invoked with a command kind it is not bound to; only a
/// mis-built handler table can cause this.
fn mismatch(expected: &str, got: &Command) -> CommandError {
    CommandError::Internal(format!(
        "handler for {expected} received {} command",
        got.kind()
    ))
}

/// Parse a wire chat GUID and look the chat up in the live registry.
fn lookup_chat(deps: &Deps, chat_guid: &str) -> Result<RegisteredChat, CommandError> {
    let guid = parse_chat_guid(chat_guid)?;
    deps.registry
        .chat(&guid.identifier, guid.service, guid.style())
        .ok_or_else(|| CommandError::ChatNotFound(chat_guid.to_string()))
}

fn parse_chat_guid(chat_guid: &str) -> Result<ChatGuid, CommandError> {
    chat_guid
        .parse::<ChatGuid>()
        .map_err(|_| CommandError::ChatNotFound(chat_guid.to_string()))
}

/// The chat plus its merged-service siblings, as (identifier, service)
/// resolution targets.
fn sibling_targets(deps: &Deps, chat: &RegisteredChat) -> Vec<(String, viaduct_protocol::Service)> {
    deps.registry
        .siblings(chat)
        .into_iter()
        .map(|sibling| (sibling.identifier, sibling.service))
        .collect()
}
