//! `WebSocket` handler for the state stream.
//!
//! Clients connect to the configured upgrade path (default `GET /mantle`)
//! and receive one JSON-encoded state record per tick. Each connection is
//! registered with the hub as a fresh subscriber; its writer loop owns the
//! socket and drains the subscriber's outbound queue.
//!
//! The connection ends when any of these happens:
//!
//! - the hub drops the subscriber (queue closed), after which a close
//!   frame is sent
//! - a socket write fails or exceeds the write timeout
//! - the client sends a close frame, errors, or disappears

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use mantle_core::hub::SubscriberHandle;
use mantle_types::SubscriberId;
use tracing::debug;

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming state records.
pub async fn ws_subscribe(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Why a connection's writer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    /// The hub removed the subscriber or shut down.
    Released,
    /// A write failed or timed out.
    WriteFailed,
    /// The client closed the connection or the read side failed.
    ClientGone,
}

/// Handle the `WebSocket` lifecycle: register, forward frames, unregister.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let (handle, mut frames) = SubscriberHandle::channel(state.settings.subscriber_buffer);
    let id = handle.id();
    state.hub.register(handle).await;
    debug!(subscriber = %id, "WebSocket client connected");

    let reason = loop {
        tokio::select! {
            // Next encoded record from the hub.
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    break Disconnect::Released;
                };
                // Shares the hub's buffer; no per-subscriber copy.
                let Ok(text) = Utf8Bytes::try_from(frame.into_bytes()) else {
                    break Disconnect::WriteFailed;
                };
                let msg = Message::Text(text);
                if !send_with_timeout(&mut socket, msg, &state, id).await {
                    break Disconnect::WriteFailed;
                }
            }
            // Inbound traffic is only watched for close, ping, and errors.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break Disconnect::ClientGone,
                    Some(Ok(Message::Ping(data))) => {
                        if !send_with_timeout(&mut socket, Message::Pong(data), &state, id).await {
                            break Disconnect::WriteFailed;
                        }
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    };

    debug!(subscriber = %id, ?reason, "WebSocket client disconnected");

    match reason {
        Disconnect::Released => {
            let _ = send_with_timeout(&mut socket, Message::Close(None), &state, id).await;
        }
        Disconnect::WriteFailed | Disconnect::ClientGone => {
            // A no-op if the hub already dropped this subscriber.
            state.hub.unregister(id).await;
        }
    }
}

/// Write one message, giving up after the configured write timeout.
///
/// Returns `false` if the write failed or timed out.
async fn send_with_timeout(
    socket: &mut WebSocket,
    msg: Message,
    state: &AppState,
    id: SubscriberId,
) -> bool {
    match tokio::time::timeout(state.settings.write_timeout, socket.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(subscriber = %id, error = %e, "WebSocket write failed");
            false
        }
        Err(_elapsed) => {
            debug!(subscriber = %id, "WebSocket write timed out");
            false
        }
    }
}
