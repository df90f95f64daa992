//! WebSocket handler
//!
//! Drives one connection through its whole life: handshake, registration,
//! the authenticated event loop, and the single cleanup path at the end.

use crate::connection::Session;
use crate::error::{GatewayError, GatewayResult};
use crate::handshake::{negotiate, HandshakeOutcome};
use crate::protocol::{
    ClientMessage, Inbound, PresenceStatus, ProtocolError, ServerMessage, TypingPayload,
};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use relay_core::{RoomId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// WebSocket gateway handler
pub async fn ws_handler(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(state, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let outcome = negotiate(
        &mut ws_stream,
        state.verifier(),
        state.config().gateway.auth_timeout(),
    )
    .await;

    let user_id = match outcome {
        HandshakeOutcome::Authenticated(user_id) => user_id,
        HandshakeOutcome::Rejected(reason) => {
            tracing::debug!(reason = %reason, "Handshake rejected");
            send_and_close(&mut ws_sink, ServerMessage::auth_error(reason)).await;
            return;
        }
        HandshakeOutcome::ClosedEarly => {
            tracing::debug!("Peer left before authenticating");
            return;
        }
        HandshakeOutcome::TimedOut => {
            tracing::debug!("Handshake timed out");
            let _ = ws_sink.close().await;
            return;
        }
    };

    // Memberships are loaded once per connection; a store failure here means
    // the connection cannot be routed to, so it never becomes live.
    let rooms: HashSet<RoomId> = match state.membership().room_memberships(user_id).await {
        Ok(rooms) => rooms,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Membership load failed at handshake");
            send_and_close(
                &mut ws_sink,
                ServerMessage::auth_error("Failed to load room memberships"),
            )
            .await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config().gateway.outbound_buffer);
    let session = Session::new(user_id, tx);
    let connection_id = session.connection_id();

    // Single writer per socket: everything outbound flows through the queue
    // and this task, so per-recipient ordering holds by construction.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg.to_json() {
                Ok(json) => {
                    if ws_sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to serialize outbound event"),
            }
        }

        // Close the WebSocket when the queue is gone
        let _ = ws_sink.close().await;
    });

    state.registry().register(session.clone(), rooms.clone());

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        rooms = rooms.len(),
        "Connection authenticated"
    );

    if let Err(e) = state.presence().set_online(user_id).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to mark user online");
    }

    if session.send(ServerMessage::auth_success()).await.is_ok() {
        state
            .dispatcher()
            .broadcast_user_status(user_id, rooms.iter().copied(), PresenceStatus::Online)
            .await;

        loop {
            tokio::select! {
                frame = ws_stream.next() => {
                    match handle_frame(&state, &session, user_id, frame).await {
                        Ok(LoopAction::Continue) => {}
                        Ok(LoopAction::Stop) => break,
                        Err(e) => {
                            tracing::debug!(user_id = %user_id, error = %e, "Closing connection");
                            break;
                        }
                    }
                }
                () = session.closed() => {
                    tracing::info!(
                        user_id = %user_id,
                        connection_id = %connection_id,
                        "Close requested, ending connection"
                    );
                    break;
                }
                _ = &mut send_task => {
                    tracing::debug!(user_id = %user_id, "Writer task ended");
                    break;
                }
            }
        }
    }

    state.dispatcher().drop_session(user_id, connection_id).await;
    // Last sender clone goes away here; the writer task drains and closes
    drop(session);
}

/// What the event loop does after one frame
enum LoopAction {
    Continue,
    /// Peer is gone (close frame, stream end, transport error)
    Stop,
}

/// Process one frame in the authenticated event loop
///
/// Malformed JSON and binary frames are protocol violations and error out,
/// which closes the connection; well-formed frames of an unknown kind are
/// ignored.
async fn handle_frame(
    state: &GatewayState,
    session: &Arc<Session>,
    user_id: UserId,
    frame: Option<Result<Message, axum::Error>>,
) -> GatewayResult<LoopAction> {
    match frame {
        Some(Ok(Message::Text(text))) => match Inbound::parse(&text) {
            Ok(Inbound::Known(ClientMessage::Typing {
                chat_room_id,
                is_typing,
            })) => {
                // Typing for a room the user is not in goes nowhere
                if !state.registry().rooms_of(user_id).contains(&chat_room_id) {
                    tracing::debug!(
                        user_id = %user_id,
                        room_id = %chat_room_id,
                        "Typing for a room the user is not a member of, ignoring"
                    );
                    return Ok(LoopAction::Continue);
                }

                let payload = TypingPayload {
                    user_id,
                    chat_room_id,
                    is_typing,
                };
                state
                    .dispatcher()
                    .broadcast_to_room(chat_room_id, ServerMessage::typing(payload), Some(user_id))
                    .await;
                Ok(LoopAction::Continue)
            }
            Ok(Inbound::Known(ClientMessage::Heartbeat)) => session
                .send(ServerMessage::heartbeat_ack())
                .await
                .map(|()| LoopAction::Continue)
                .map_err(|_| GatewayError::Delivery(user_id)),
            Ok(Inbound::Known(ClientMessage::Auth { .. })) => {
                tracing::debug!(user_id = %user_id, "Auth after handshake, ignoring");
                Ok(LoopAction::Continue)
            }
            Ok(Inbound::Unknown(kind)) => {
                tracing::debug!(user_id = %user_id, kind = %kind, "Unknown message type, ignoring");
                Ok(LoopAction::Continue)
            }
            Err(e) => Err(e.into()),
        },
        Some(Ok(Message::Binary(_))) => Err(ProtocolError::UnsupportedFrame.into()),
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(LoopAction::Continue),
        Some(Ok(Message::Close(_))) | None => {
            tracing::info!(user_id = %user_id, "Client closed connection");
            Ok(LoopAction::Stop)
        }
        Some(Err(e)) => {
            tracing::warn!(user_id = %user_id, error = %e, "WebSocket error");
            Ok(LoopAction::Stop)
        }
    }
}

/// Send one message straight on the sink and close the transport
///
/// Used before a session exists, when the outbound queue has not been set up.
async fn send_and_close(sink: &mut SplitSink<WebSocket, Message>, message: ServerMessage) {
    if let Ok(json) = message.to_json() {
        let _ = sink.send(Message::Text(json.into())).await;
    }
    let _ = sink.close().await;
}
