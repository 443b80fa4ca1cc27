//! End-to-end protocol tests: a fake peer drives the engine over an
//! in-process stream against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use viaduct::engine::EngineConfig;
use viaduct_protocol::{Command, ResponsePayload, Service};

mod common;
use common::{TestRegistry, TestSender, TestStore, spawn_engine};

const CHAT: &str = "+15555550123";
const CHAT_GUID: &str = "iMessage;-;+15555550123";

fn store_with_messages(count: usize) -> Arc<TestStore> {
    let store = TestStore::new();
    for i in 0..count {
        store.put_text_message(
            &format!("MSG-{i}"),
            CHAT,
            1_700_000_000_000 + i as i64 * 1_000,
            &format!("message number {i}"),
        );
    }
    store
}

fn default_registry() -> Arc<TestRegistry> {
    let chat = TestRegistry::direct_chat(CHAT, Service::IMessage, 1_700_000_010_000);
    TestRegistry::with_chats(vec![chat])
}

#[tokio::test]
async fn test_get_recent_messages_end_to_end() {
    let store = store_with_messages(3);
    let mut peer = spawn_engine(
        store,
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    peer.send(json!({
        "id": 1,
        "kind": "get_recent_messages",
        "chat_guid": CHAT_GUID,
        "limit": 5,
    }))
    .await;

    let reply = peer.recv().await;
    assert_eq!(reply["id"], 1);
    assert_eq!(reply["kind"], "response");
    let messages = reply["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 3);
    for message in messages {
        assert_eq!(message["chat_id"], CHAT);
        assert_eq!(message["service"], "iMessage");
    }
}

#[tokio::test]
async fn test_reply_id_survives_interleaving() {
    let store = store_with_messages(2);
    store.hold_fetches();
    let mut peer = spawn_engine(
        store.clone(),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    // Slow request first, fast request second.
    peer.send(json!({
        "id": 7,
        "kind": "get_recent_messages",
        "chat_guid": CHAT_GUID,
    }))
    .await;
    peer.send(json!({ "id": 8, "kind": "ping" })).await;

    let first = peer.recv().await;
    assert_eq!(first["id"], 8, "ping overtakes the gated store query");

    store.release_fetches();
    let second = peer.recv().await;
    assert_eq!(second["id"], 7);
    assert_eq!(second["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_queries_share_the_store_fetch() {
    let store = store_with_messages(3);
    store.hold_fetches();
    let mut peer = spawn_engine(
        store.clone(),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    let after = json!({
        "kind": "get_messages_after",
        "chat_guid": CHAT_GUID,
        "timestamp": 1_700_000_000_500_i64,
    });
    let mut first = after.clone();
    first["id"] = json!(21);
    let mut second = after;
    second["id"] = json!(22);

    peer.send(first).await;
    peer.send(second).await;
    // Let both requests hit the pipeline before the store unblocks.
    tokio::time::sleep(Duration::from_millis(100)).await;
    store.release_fetches();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let reply = peer.recv().await;
        assert_eq!(reply["kind"], "response");
        assert_eq!(reply["messages"].as_array().unwrap().len(), 2);
        ids.push(reply["id"].as_u64().unwrap());
    }
    ids.sort_unstable();
    assert_eq!(ids, vec![21, 22]);

    // The overlapping requests shared one fetch per GUID.
    for guid in ["MSG-1", "MSG-2"] {
        assert_eq!(store.fetches_for(guid), 1, "{guid} fetched more than once");
    }
}

#[tokio::test]
async fn test_messages_after_short_circuits_stale_chats() {
    let store = store_with_messages(3);
    store.hold_fetches();
    let registry = default_registry();
    let mut peer = spawn_engine(store, registry, TestSender::new(), EngineConfig::default());

    // Requested timestamp is newer than the chat's last message; the
    // reply must come back empty without touching the gated store.
    peer.send(json!({
        "id": 5,
        "kind": "get_messages_after",
        "chat_guid": CHAT_GUID,
        "timestamp": 1_800_000_000_000_i64,
    }))
    .await;

    let reply = peer.recv().await;
    assert_eq!(reply["id"], 5);
    assert!(reply["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_envelope_with_id_gets_one_error_reply() {
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    peer.send(json!({ "id": 9, "kind": "warp_drive" })).await;

    let reply = peer.recv().await;
    assert_eq!(reply["id"], 9);
    assert_eq!(reply["kind"], "error");
    assert_eq!(reply["code"], "decode_error");

    peer.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_malformed_envelope_without_id_gets_no_reply() {
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    peer.send_raw("this is not json").await;
    peer.send(json!({ "kind": "warp_drive" })).await;
    peer.send(json!({ "id": 10, "kind": "ping" })).await;

    // Only the ping is answered.
    let reply = peer.recv().await;
    assert_eq!(reply["id"], 10);
    peer.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_request_shaped_kind_without_id_is_dropped() {
    let mut peer = spawn_engine(
        store_with_messages(1),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    peer.send(json!({
        "kind": "get_recent_messages",
        "chat_guid": CHAT_GUID,
    }))
    .await;
    peer.send(json!({ "id": 2, "kind": "ping" })).await;

    let reply = peer.recv().await;
    assert_eq!(reply["id"], 2);
    peer.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_chat_not_found_error_code() {
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    peer.send(json!({
        "id": 4,
        "kind": "get_recent_messages",
        "chat_guid": "iMessage;-;+19999999999",
    }))
    .await;

    let reply = peer.recv().await;
    assert_eq!(reply["id"], 4);
    assert_eq!(reply["kind"], "error");
    assert_eq!(reply["code"], "chat_not_found");
}

#[tokio::test]
async fn test_send_message_returns_receipt() {
    let sender = TestSender::new();
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        sender.clone(),
        EngineConfig::default(),
    );

    peer.send(json!({
        "id": 11,
        "kind": "send_message",
        "chat_guid": CHAT_GUID,
        "text": "hello from the bridge",
    }))
    .await;

    let reply = peer.recv().await;
    assert_eq!(reply["id"], 11);
    assert_eq!(reply["kind"], "response");
    assert!(reply["receipt"]["guid"].is_string());
    assert_eq!(reply["receipt"]["service"], "iMessage");

    let sent = sender.sent_texts.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "hello from the bridge");
}

#[tokio::test]
async fn test_set_typing_is_fire_and_forget() {
    let sender = TestSender::new();
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        sender.clone(),
        EngineConfig::default(),
    );

    // Even with an id attached, typing forwarding produces no reply.
    peer.send(json!({
        "id": 30,
        "kind": "set_typing",
        "chat_guid": CHAT_GUID,
        "typing": true,
    }))
    .await;
    peer.send(json!({ "id": 31, "kind": "ping" })).await;

    let reply = peer.recv().await;
    assert_eq!(reply["id"], 31);
    peer.expect_silence(Duration::from_millis(200)).await;

    let changes = sender.typing_changes.lock().unwrap();
    assert_eq!(changes.as_slice(), &[(CHAT_GUID.to_string(), true)]);
}

#[tokio::test]
async fn test_outbound_log_event_has_no_id() {
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    peer.handle
        .send_log(
            viaduct_protocol::LogLevel::Info,
            "engine",
            "bridge came up",
        )
        .await
        .unwrap();

    let frame = peer.recv().await;
    assert_eq!(frame["kind"], "log");
    assert_eq!(frame["level"], "info");
    assert!(frame.get("id").is_none());
}

#[tokio::test]
async fn test_outbound_request_roundtrip() {
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    let handle = peer.handle.clone();
    let request = tokio::spawn(async move { handle.request(Command::Ping).await });

    let frame = peer.recv().await;
    assert_eq!(frame["kind"], "ping");
    let id = frame["id"].as_u64().expect("outbound request carries an id");

    peer.send(json!({ "id": id, "kind": "response" })).await;

    let payload = request.await.unwrap().unwrap();
    assert!(matches!(payload, ResponsePayload::Ack {}));
}

#[tokio::test]
async fn test_outbound_request_times_out() {
    let config = EngineConfig {
        request_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        TestSender::new(),
        config,
    );

    let handle = peer.handle.clone();
    let result = handle.request(Command::Ping).await;
    assert!(result.is_err());

    // The request frame still went out; the peer just never answered.
    let frame = peer.recv().await;
    assert_eq!(frame["kind"], "ping");
}

#[tokio::test]
async fn test_resolve_identifier_and_chat_info() {
    let mut peer = spawn_engine(
        TestStore::new(),
        default_registry(),
        TestSender::new(),
        EngineConfig::default(),
    );

    peer.send(json!({
        "id": 40,
        "kind": "resolve_identifier",
        "identifier": CHAT,
    }))
    .await;
    let reply = peer.recv().await;
    assert_eq!(reply["chat_guid"], CHAT_GUID);

    peer.send(json!({
        "id": 41,
        "kind": "get_chat",
        "chat_guid": CHAT_GUID,
    }))
    .await;
    let reply = peer.recv().await;
    assert_eq!(reply["id"], 41);
    assert_eq!(reply["chat"]["chat_guid"], CHAT_GUID);
    assert_eq!(reply["chat"]["style"], 45);
}

#[tokio::test]
async fn test_sibling_chats_resolve_together() {
    let store = TestStore::new();
    store.put_text_message("IM-1", CHAT, 1_700_000_000_000, "over iMessage");
    store.put_text_message("SMS-1", CHAT, 1_700_000_001_000, "over SMS");

    // Same identifier on both services; the registry reports them as
    // siblings of one conversation.
    let imessage = TestRegistry::direct_chat(CHAT, Service::IMessage, 1_700_000_001_000);
    let sms = TestRegistry::direct_chat(CHAT, Service::Sms, 1_700_000_001_000);
    let registry = TestRegistry::with_chats(vec![imessage, sms]);

    let mut peer = spawn_engine(store, registry, TestSender::new(), EngineConfig::default());

    peer.send(json!({
        "id": 50,
        "kind": "get_recent_messages",
        "chat_guid": CHAT_GUID,
    }))
    .await;

    let reply = peer.recv().await;
    assert_eq!(reply["id"], 50);
    assert_eq!(reply["messages"].as_array().unwrap().len(), 2);
}
