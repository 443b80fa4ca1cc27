//! Ingestion: raw store records to structured chat items.
//!
//! Each record is converted exactly once, at resolution time. Records the
//! converter cannot place (no chat identifier from either the record or the
//! requesting context) are dropped silently; the caller treats missing
//! GUIDs as "no data", not as an error.

use tracing::trace;

use viaduct_protocol::{Message, MessageItem, Service};

use crate::store::{RawPart, RawRecord, flags};

/// Chat/service context a batch was requested under. Fills in fields the
/// raw record leaves unresolved.
#[derive(Debug, Clone, Default)]
pub struct IngestContext {
    pub chat_id: Option<String>,
    pub service: Option<Service>,
}

impl IngestContext {
    pub fn for_chat(chat_id: impl Into<String>, service: Service) -> Self {
        Self {
            chat_id: Some(chat_id.into()),
            service: Some(service),
        }
    }

    pub fn with_service(service: Service) -> Self {
        Self {
            chat_id: None,
            service: Some(service),
        }
    }
}

/// Convert one raw record into a [`Message`], or `None` when the record
/// cannot be represented.
pub fn ingest_record(record: RawRecord, ctx: &IngestContext) -> Option<Message> {
    let chat_id = record.chat_identifier.or_else(|| ctx.chat_id.clone());
    let Some(chat_id) = chat_id else {
        trace!(guid = %record.guid, "dropping record with no resolvable chat");
        return None;
    };

    let service = record.service.or(ctx.service).unwrap_or_default();

    let is_typing_record = record.flags & flags::TYPING != 0;
    let is_finished = record.flags & flags::FINISHED != 0;
    // A typing record that is already finished is the "stopped typing"
    // tombstone, not a live indicator.
    let is_typing = is_typing_record && !is_finished;
    let is_cancel_typing = is_typing_record && is_finished;

    let is_delivered = record.time_delivered > 0 || record.flags & flags::DELIVERED != 0;

    let (thread_originator, thread_originator_part) = record
        .thread_identifier
        .as_deref()
        .and_then(parse_thread_identifier)
        .map(|(originator, part)| (Some(originator), Some(part)))
        .unwrap_or((None, None));

    let items = record.parts.into_iter().map(ingest_part).collect();

    Some(Message {
        guid: record.guid,
        chat_id,
        service,
        sender: if record.is_from_me { None } else { record.sender },
        is_from_me: record.is_from_me,
        time: record.time,
        time_delivered: record.time_delivered,
        time_read: record.time_read,
        time_played: record.time_played,
        subject: record.subject,
        is_delivered,
        is_sos: record.flags & flags::SOS != 0,
        is_typing,
        is_cancel_typing,
        is_audio_message: record.flags & flags::AUDIO != 0,
        thread_identifier: record.thread_identifier,
        thread_originator,
        thread_originator_part,
        associated_message_guid: record.associated_message_guid,
        items,
    })
}

fn ingest_part(part: RawPart) -> MessageItem {
    match part {
        RawPart::Text(text) => MessageItem::Text { text },
        RawPart::Attachment {
            transfer_guid,
            file_name,
            mime_type,
        } => MessageItem::Attachment {
            transfer_guid,
            file_name,
            mime_type,
        },
        RawPart::Plugin { bundle_id, payload } => MessageItem::Plugin { bundle_id, payload },
    }
}

/// Parse a raw thread identifier into (originator GUID, part index).
///
/// The daemon encodes these as comma-separated segments with the part
/// index second and the originator GUID last; anything with fewer than
/// three segments carries no linkage.
pub fn parse_thread_identifier(raw: &str) -> Option<(String, u32)> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() <= 2 {
        return None;
    }
    let part_index = parts[1].parse::<u32>().ok()?;
    let originator = parts.last()?;
    if originator.is_empty() {
        return None;
    }
    Some((originator.to_string(), part_index))
}
