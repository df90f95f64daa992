//! Gateway end-to-end tests
//!
//! Spins up the full application on an ephemeral port with in-memory
//! collaborator ports and drives it with real WebSocket clients.
//!
//! Run with: cargo test -p relay-gateway --test gateway_ws

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use relay_common::{
    AppConfig, AppSettings, Environment, GatewayConfig, JwtConfig, JwtService,
};
use relay_core::{
    DomainResult, MembershipRepository, MessageId, MessageRecord, MessageSender,
    PresenceRepository, PushNotifier, RoomId, UserId, UserProfile,
};
use relay_gateway::{create_app, GatewayState};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream};

const JWT_SECRET: &str = "gateway-e2e-secret";

/// How long a required event may take to arrive
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long we watch a stream to conclude nothing else is coming
const QUIET_WINDOW: Duration = Duration::from_millis(300);

// ============================================================================
// In-memory collaborator ports
// ============================================================================

struct FixedMembership {
    rooms_by_user: HashMap<UserId, HashSet<RoomId>>,
}

#[async_trait]
impl MembershipRepository for FixedMembership {
    async fn room_memberships(&self, user_id: UserId) -> DomainResult<HashSet<RoomId>> {
        Ok(self.rooms_by_user.get(&user_id).cloned().unwrap_or_default())
    }

    async fn room_participants(&self, room_id: RoomId) -> DomainResult<HashSet<UserId>> {
        Ok(self
            .rooms_by_user
            .iter()
            .filter(|(_, rooms)| rooms.contains(&room_id))
            .map(|(user_id, _)| *user_id)
            .collect())
    }
}

struct FixedPresence;

#[async_trait]
impl PresenceRepository for FixedPresence {
    async fn set_online(&self, _user_id: UserId) -> DomainResult<()> {
        Ok(())
    }

    async fn set_offline(
        &self,
        _user_id: UserId,
        _last_seen: chrono::DateTime<Utc>,
    ) -> DomainResult<()> {
        Ok(())
    }

    async fn profile(&self, user_id: UserId) -> DomainResult<Option<UserProfile>> {
        Ok(Some(UserProfile {
            id: user_id,
            display_name: format!("user-{user_id}"),
            last_seen: None,
        }))
    }
}

#[derive(Default)]
struct RecordingPush {
    sent: Mutex<Vec<(UserId, String)>>,
}

#[async_trait]
impl PushNotifier for RecordingPush {
    async fn notify(
        &self,
        user_id: UserId,
        title: &str,
        _body: &str,
        _metadata: Value,
    ) -> DomainResult<()> {
        self.sent.lock().push((user_id, title.to_string()));
        Ok(())
    }
}

// ============================================================================
// Test server and client helpers
// ============================================================================

struct TestGateway {
    addr: SocketAddr,
    state: GatewayState,
    jwt: JwtService,
    push: Arc<RecordingPush>,
    _handle: JoinHandle<()>,
}

impl TestGateway {
    /// Start the gateway with the given durable memberships
    async fn start(memberships: &[(i64, &[i64])]) -> Self {
        // First test in the process wins; the rest reuse its subscriber
        relay_common::try_init_tracing().ok();

        let config = AppConfig {
            app: AppSettings {
                name: "relay-test".to_string(),
                env: Environment::Development,
            },
            gateway: GatewayConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                auth_timeout_secs: 2,
                outbound_buffer: 16,
            },
            jwt: JwtConfig {
                secret: JWT_SECRET.to_string(),
                access_token_expiry: 900,
            },
        };

        let jwt = JwtService::new(JWT_SECRET, 900);
        let push = Arc::new(RecordingPush::default());

        let rooms_by_user = memberships
            .iter()
            .map(|(user, rooms)| {
                (
                    UserId::new(*user),
                    rooms.iter().copied().map(RoomId::new).collect(),
                )
            })
            .collect();

        let state = GatewayState::new(
            config,
            Arc::new(jwt.clone()),
            Arc::new(FixedMembership { rooms_by_user }),
            Arc::new(FixedPresence),
            push.clone(),
        );

        let app = create_app(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        // Wait for the server to be ready
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            state,
            jwt,
            push,
            _handle: handle,
        }
    }

    fn token(&self, user: i64) -> String {
        self.jwt.encode_token(UserId::new(user)).unwrap()
    }

    async fn connect(&self) -> Client {
        let (ws, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("Failed to open WebSocket");
        Client { ws }
    }

    /// Connect and complete the handshake for a user
    async fn connect_as(&self, user: i64) -> Client {
        let mut client = self.connect().await;
        client
            .send_json(&json!({ "type": "auth", "token": self.token(user) }))
            .await;
        let reply = client.recv_json().await;
        assert_eq!(reply["type"], "auth_success");
        client
    }
}

struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    async fn send_json(&mut self, value: &Value) {
        self.send_text(&value.to_string()).await;
    }

    async fn send_text(&mut self, text: &str) {
        self.ws
            .send(WsMessage::Text(text.to_string()))
            .await
            .expect("Failed to send frame");
    }

    /// Next text frame, parsed; panics if nothing arrives in time
    async fn recv_json(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("Timed out waiting for a frame")
                .expect("Stream ended")
                .expect("WebSocket error");
            match frame {
                WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
                WsMessage::Close(_) => panic!("Connection closed while expecting a frame"),
                _ => {}
            }
        }
    }

    /// Collect every text frame that arrives within the quiet window
    async fn drain(&mut self) -> Vec<Value> {
        let mut events = Vec::new();
        loop {
            match tokio::time::timeout(QUIET_WINDOW, self.ws.next()).await {
                Ok(Some(Ok(WsMessage::Text(text)))) => {
                    events.push(serde_json::from_str(&text).unwrap());
                }
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(_)) | None) | Err(_) => return events,
            }
        }
    }

    /// Assert the stream stays silent for the quiet window
    async fn expect_silence(&mut self) {
        let events = self.drain().await;
        assert!(events.is_empty(), "expected no frames, got {events:?}");
    }

    /// Assert the server ends the connection
    async fn expect_closed(&mut self) {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("Timed out waiting for close")
            {
                Some(Ok(WsMessage::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(_)) => return,
            }
        }
    }
}

fn message_record(sender: i64, room: i64, content: &str) -> MessageRecord {
    MessageRecord {
        id: MessageId::new(555),
        chat_room_id: RoomId::new(room),
        sender_id: UserId::new(sender),
        content: content.to_string(),
        message_type: "text".to_string(),
        created_at: Utc::now(),
        sender: MessageSender {
            id: UserId::new(sender),
            display_name: format!("user-{sender}"),
            profile_picture: None,
        },
    }
}

fn events_of<'a>(events: &'a [Value], kind: &str) -> Vec<&'a Value> {
    events.iter().filter(|e| e["type"] == kind).collect()
}

// ============================================================================
// Health check
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let gateway = TestGateway::start(&[]).await;

    let response = reqwest::get(format!("http://{}/health", gateway.addr))
        .await
        .expect("Request failed");
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_pre_auth_frames_are_ignored_until_auth() {
    let gateway = TestGateway::start(&[(1, &[7])]).await;
    let mut client = gateway.connect().await;

    // Heartbeats before auth draw no reply and do not advance the handshake
    client.send_json(&json!({ "type": "heartbeat" })).await;
    client.expect_silence().await;

    client
        .send_json(&json!({ "type": "auth", "token": gateway.token(1) }))
        .await;
    let reply = client.recv_json().await;
    assert_eq!(reply["type"], "auth_success");

    // Now authenticated, heartbeats are acked
    client.send_json(&json!({ "type": "heartbeat" })).await;
    let ack = client.recv_json().await;
    assert_eq!(ack["type"], "heartbeat_ack");
}

#[tokio::test]
async fn test_invalid_token_is_rejected_and_closed() {
    let gateway = TestGateway::start(&[]).await;
    let mut client = gateway.connect().await;

    client
        .send_json(&json!({ "type": "auth", "token": "garbage" }))
        .await;

    let reply = client.recv_json().await;
    assert_eq!(reply["type"], "auth_error");
    client.expect_closed().await;
}

// ============================================================================
// Message fan-out
// ============================================================================

#[tokio::test]
async fn test_message_fanout_reaches_other_members_once() {
    let gateway = TestGateway::start(&[(1, &[7]), (2, &[7])]).await;
    let mut alice = gateway.connect_as(1).await;
    let mut bob = gateway.connect_as(2).await;

    // Alice sees Bob come online; flush it before the interesting part
    let warmup = alice.drain().await;
    assert_eq!(events_of(&warmup, "user_status").len(), 1);

    gateway
        .state
        .bridge()
        .message_created(message_record(1, 7, "hello"), "general")
        .await;

    let bob_events = bob.drain().await;
    let messages = events_of(&bob_events, "new_message");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["data"]["chat_room_id"], 7);
    assert_eq!(messages[0]["data"]["content"], "hello");
    assert_eq!(messages[0]["data"]["sender"]["display_name"], "user-1");

    // The sender gets the delivery ack and never their own message back
    let alice_events = alice.drain().await;
    assert!(events_of(&alice_events, "new_message").is_empty());
    let acks = events_of(&alice_events, "message_delivered");
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["data"]["chat_room_id"], 7);

    // The push path ran independently, skipping the sender
    let pushed = gateway.push.sent.lock().clone();
    assert_eq!(pushed, vec![(UserId::new(2), "user-1 • general".to_string())]);
}

// ============================================================================
// Typing relay
// ============================================================================

#[tokio::test]
async fn test_typing_is_relayed_to_other_members_only() {
    let gateway = TestGateway::start(&[(1, &[7]), (2, &[7])]).await;
    let mut alice = gateway.connect_as(1).await;
    let mut bob = gateway.connect_as(2).await;
    alice.drain().await; // Bob's online event

    alice
        .send_json(&json!({ "type": "typing", "chat_room_id": 7, "is_typing": true }))
        .await;

    let bob_events = bob.drain().await;
    let typing = events_of(&bob_events, "typing");
    assert_eq!(typing.len(), 1);
    assert_eq!(typing[0]["data"]["user_id"], 1);
    assert_eq!(typing[0]["data"]["is_typing"], true);

    // No echo back to the typist
    alice.expect_silence().await;
}

#[tokio::test]
async fn test_typing_for_foreign_room_goes_nowhere() {
    let gateway = TestGateway::start(&[(1, &[7]), (2, &[8])]).await;
    let mut alice = gateway.connect_as(1).await;
    let mut bob = gateway.connect_as(2).await;

    // Alice is not a member of room 8
    alice
        .send_json(&json!({ "type": "typing", "chat_room_id": 8, "is_typing": true }))
        .await;

    bob.expect_silence().await;
}

// ============================================================================
// Presence
// ============================================================================

#[tokio::test]
async fn test_disconnect_broadcasts_offline_to_shared_rooms() {
    let gateway = TestGateway::start(&[(1, &[7]), (2, &[7])]).await;
    let mut alice = gateway.connect_as(1).await;
    let bob = gateway.connect_as(2).await;
    alice.drain().await; // Bob's online event

    drop(bob);

    let events = alice.drain().await;
    let statuses = events_of(&events, "user_status");
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0]["data"]["user_id"], 2);
    assert_eq!(statuses[0]["data"]["status"], "offline");
    assert_eq!(statuses[0]["data"]["display_name"], "user-2");
}

#[tokio::test]
async fn test_disconnect_without_shared_rooms_is_silent() {
    let gateway = TestGateway::start(&[(1, &[7]), (2, &[8])]).await;
    let mut alice = gateway.connect_as(1).await;
    let bob = gateway.connect_as(2).await;

    drop(bob);

    alice.expect_silence().await;
}

// ============================================================================
// Supersede
// ============================================================================

#[tokio::test]
async fn test_newer_connection_supersedes_older() {
    let gateway = TestGateway::start(&[(1, &[7])]).await;
    let mut first = gateway.connect_as(1).await;
    let mut second = gateway.connect_as(1).await;

    // The older transport is closed by the server
    first.expect_closed().await;

    // The newer one is the live session
    second.send_json(&json!({ "type": "heartbeat" })).await;
    let ack = second.recv_json().await;
    assert_eq!(ack["type"], "heartbeat_ack");
    assert_eq!(gateway.state.registry().session_count(), 1);
}

// ============================================================================
// Protocol policy after auth
// ============================================================================

#[tokio::test]
async fn test_unknown_kinds_ignored_but_malformed_closes() {
    let gateway = TestGateway::start(&[(1, &[7])]).await;
    let mut client = gateway.connect_as(1).await;

    // Unknown message kind: connection stays up
    client.send_json(&json!({ "type": "presence_query" })).await;
    client.send_json(&json!({ "type": "heartbeat" })).await;
    let ack = client.recv_json().await;
    assert_eq!(ack["type"], "heartbeat_ack");

    // Malformed frame: protocol violation, connection ends
    client.send_text("not json").await;
    client.expect_closed().await;
}
