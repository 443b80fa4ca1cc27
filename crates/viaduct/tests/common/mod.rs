//! Shared fixtures: in-memory collaborators and a peer harness speaking
//! the wire protocol over an in-process duplex stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

use viaduct::dispatch::Deps;
use viaduct::engine::{Engine, EngineConfig, EngineHandle};
use viaduct::registry::{ChatRegistry, MessageSender, RegisteredChat, RegistryError, SendError};
use viaduct::store::{MessageStore, QueryBounds, RawPart, RawRecord, RecordRef, StoreError, flags};
use viaduct_protocol::{ChatGuid, ChatStyle, MessageReceipt, Service};

/// In-memory record store with per-GUID fetch accounting and a gate for
/// holding fetches open.
pub struct TestStore {
    records: Mutex<HashMap<String, RawRecord>>,
    refs: Mutex<Vec<RecordRef>>,
    per_guid_fetches: Mutex<HashMap<String, usize>>,
    open: AtomicBool,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
            refs: Mutex::new(Vec::new()),
            per_guid_fetches: Mutex::new(HashMap::new()),
            open: AtomicBool::new(true),
        })
    }

    pub fn put_text_message(&self, guid: &str, chat: &str, time: i64, text: &str) {
        let record = RawRecord {
            guid: guid.to_string(),
            chat_identifier: Some(chat.to_string()),
            service: Some(Service::IMessage),
            sender: Some("+15555550199".to_string()),
            time,
            flags: flags::FINISHED,
            parts: vec![RawPart::Text(text.to_string())],
            ..Default::default()
        };
        self.records.lock().unwrap().insert(guid.to_string(), record);
        self.refs.lock().unwrap().push(RecordRef {
            message_guid: guid.to_string(),
            chat_identifier: chat.to_string(),
        });
    }

    pub fn hold_fetches(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn release_fetches(&self) {
        self.open.store(true, Ordering::Release);
    }

    pub fn fetches_for(&self, guid: &str) -> usize {
        self.per_guid_fetches
            .lock()
            .unwrap()
            .get(guid)
            .copied()
            .unwrap_or(0)
    }
}

impl MessageStore for TestStore {
    fn records_for_guids(&self, guids: &[String]) -> Result<Vec<RawRecord>, StoreError> {
        while !self.open.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(5));
        }
        let mut counts = self.per_guid_fetches.lock().unwrap();
        for guid in guids {
            *counts.entry(guid.clone()).or_default() += 1;
        }
        let records = self.records.lock().unwrap();
        Ok(guids.iter().filter_map(|g| records.get(g).cloned()).collect())
    }

    fn newest_guid_refs(
        &self,
        chat_identifiers: &[String],
        bounds: &QueryBounds,
    ) -> Result<Vec<RecordRef>, StoreError> {
        let records = self.records.lock().unwrap();
        let refs = self.refs.lock().unwrap();
        let mut out = Vec::new();
        for chat in chat_identifiers {
            let per_chat: Vec<RecordRef> = refs
                .iter()
                .filter(|r| r.chat_identifier == *chat)
                .filter(|r| {
                    let time = records.get(&r.message_guid).map(|rec| rec.time).unwrap_or(0);
                    bounds.after_time.is_none_or(|after| time > after)
                        && bounds.before_time.is_none_or(|before| time < before)
                })
                .rev()
                .take(bounds.limit.unwrap_or(usize::MAX))
                .cloned()
                .collect();
            out.extend(per_chat);
        }
        Ok(out)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let records = self.records.lock().unwrap();
        let mut hits: Vec<String> = records
            .values()
            .filter(|r| {
                r.parts
                    .iter()
                    .any(|p| matches!(p, RawPart::Text(text) if text.contains(query)))
            })
            .map(|r| r.guid.clone())
            .collect();
        hits.sort();
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Registry over a fixed chat list; chats sharing an identifier are
/// siblings of each other.
pub struct TestRegistry {
    chats: Vec<RegisteredChat>,
}

impl TestRegistry {
    pub fn with_chats(chats: Vec<RegisteredChat>) -> Arc<Self> {
        Arc::new(Self { chats })
    }

    pub fn direct_chat(identifier: &str, service: Service, last_message_time: i64) -> RegisteredChat {
        RegisteredChat {
            identifier: identifier.to_string(),
            service,
            style: ChatStyle::DirectMessage,
            room_name: None,
            display_name: None,
            participants: vec![identifier.to_string()],
            unread_message_count: 0,
            message_failure_count: 0,
            last_message: None,
            last_message_time,
            read_receipts: false,
            ignore_alerts: false,
            group_photo_id: None,
        }
    }
}

impl ChatRegistry for TestRegistry {
    fn chat(
        &self,
        identifier: &str,
        service: Service,
        _style: ChatStyle,
    ) -> Option<RegisteredChat> {
        self.chats
            .iter()
            .find(|c| c.identifier == identifier && c.service == service)
            .cloned()
    }

    fn chats_since(&self, min_timestamp: i64) -> Vec<RegisteredChat> {
        self.chats
            .iter()
            .filter(|c| c.last_message_time >= min_timestamp)
            .cloned()
            .collect()
    }

    fn siblings(&self, chat: &RegisteredChat) -> Vec<RegisteredChat> {
        let mut siblings: Vec<RegisteredChat> = self
            .chats
            .iter()
            .filter(|c| c.identifier == chat.identifier)
            .cloned()
            .collect();
        if siblings.is_empty() {
            siblings.push(chat.clone());
        }
        siblings
    }

    fn resolve_identifier(&self, identifier: &str) -> Option<ChatGuid> {
        self.chats
            .iter()
            .find(|c| c.identifier == identifier)
            .map(|c| ChatGuid::new(c.service, c.style == ChatStyle::Group, c.identifier.clone()))
    }

    fn prepare_dm(&self, _guid: &ChatGuid) -> Result<(), RegistryError> {
        Ok(())
    }

    fn group_photo_path(&self, _identifier: &str, _service: Service) -> Option<std::path::PathBuf> {
        None
    }
}

/// Sender that acks everything and remembers what it was asked to do.
#[derive(Default)]
pub struct TestSender {
    pub sent_texts: Mutex<Vec<(String, String)>>,
    pub read_marks: Mutex<Vec<(String, String)>>,
    pub typing_changes: Mutex<Vec<(String, bool)>>,
}

impl TestSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn receipt() -> MessageReceipt {
        let guid = uuid::Uuid::new_v4().to_string().to_uppercase();
        MessageReceipt::accepted_now(guid, Service::IMessage)
    }
}

#[async_trait]
impl MessageSender for TestSender {
    async fn send_text(
        &self,
        chat: &ChatGuid,
        text: &str,
        _reply_to: Option<(&str, u32)>,
    ) -> Result<MessageReceipt, SendError> {
        self.sent_texts
            .lock()
            .unwrap()
            .push((chat.to_string(), text.to_string()));
        Ok(Self::receipt())
    }

    async fn send_media(
        &self,
        _chat: &ChatGuid,
        _path: &std::path::Path,
        _file_name: &str,
        _is_audio: bool,
    ) -> Result<MessageReceipt, SendError> {
        Ok(Self::receipt())
    }

    async fn send_tapback(
        &self,
        _chat: &ChatGuid,
        _target_guid: &str,
        _target_part: Option<u32>,
        _tapback_type: i32,
    ) -> Result<MessageReceipt, SendError> {
        Ok(Self::receipt())
    }

    async fn mark_read(&self, chat: &ChatGuid, read_up_to: &str) -> Result<(), SendError> {
        self.read_marks
            .lock()
            .unwrap()
            .push((chat.to_string(), read_up_to.to_string()));
        Ok(())
    }

    async fn set_typing(&self, chat: &ChatGuid, typing: bool) -> Result<(), SendError> {
        self.typing_changes
            .lock()
            .unwrap()
            .push((chat.to_string(), typing));
        Ok(())
    }
}

/// The peer's end of the stream: sends raw lines, receives JSON frames.
pub struct TestPeer {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    // Keeps the engine's tasks alive for the duration of the test.
    _engine: Engine,
    pub handle: EngineHandle,
}

impl TestPeer {
    pub async fn send(&mut self, frame: Value) {
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("peer write");
    }

    /// Next frame from the engine; panics after 5 seconds of silence.
    pub async fn recv(&mut self) -> Value {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a frame")
            .expect("peer read");
        assert!(!line.is_empty(), "engine closed the stream");
        serde_json::from_str(&line).expect("frame is valid JSON")
    }

    /// Assert no frame arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        let mut line = String::new();
        let result = tokio::time::timeout(window, self.reader.read_line(&mut line)).await;
        assert!(
            result.is_err(),
            "expected silence but received frame: {line}"
        );
    }
}

pub fn spawn_engine(
    store: Arc<TestStore>,
    registry: Arc<TestRegistry>,
    sender: Arc<TestSender>,
    config: EngineConfig,
) -> TestPeer {
    let (engine_side, peer_side) = tokio::io::duplex(64 * 1024);
    let (engine_read, engine_write) = tokio::io::split(engine_side);
    let (peer_read, peer_write) = tokio::io::split(peer_side);

    let deps = Deps::new(store, registry, sender);
    let engine = Engine::spawn(engine_read, engine_write, deps, config);
    let handle = engine.handle();

    TestPeer {
        reader: BufReader::new(peer_read),
        writer: peer_write,
        _engine: engine,
        handle,
    }
}
