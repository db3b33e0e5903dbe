//! Actor-per-connection servicing of an upgraded WebSocket.
//!
//! The socket splits into a reader loop (owned here) and a writer task fed
//! by an mpsc channel; cloning that channel's sender is how the rest of the
//! system pushes to this client. The first frame must be `auth` — the
//! connection is not registered, and receives nothing, until it arrives and
//! validates.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::auth::TokenError;
use crate::state::AppState;
use crate::ws::protocol::{self, ClientFrame};

/// Server sends a WebSocket ping every 30 seconds; prevents connection
/// leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// If pong is not received within 10 seconds after a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Close codes surfaced to clients.
const CLOSE_PROTOCOL_ERROR: u16 = 4000;
const CLOSE_AUTH_TIMEOUT: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Writer task owns the sink for the connection's whole lifetime.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // First-frame authentication within the grace window. An unauthenticated
    // socket that stalls or sends anything else is closed, never registered.
    let user_id = match await_auth(&mut ws_receiver, &state, &tx).await {
        Ok(user_id) => user_id,
        Err((code, reason)) => {
            tracing::warn!(close_code = code, reason = reason, "WebSocket auth failed");
            let _ = tx.send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })));
            // Let the writer flush the close frame before tearing down.
            drop(tx);
            let _ = writer_handle.await;
            return;
        }
    };

    let connection_id = match state.registry.register(&user_id, tx.clone()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Could not register connection");
            writer_handle.abort();
            return;
        }
    };

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket actor started"
    );

    // Ping task: periodic pings, close on missed pong.
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming frames until the socket ends.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_client_frame(text.as_str(), &state, &user_id).await;
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        user_id = %user_id,
                        "Ignoring binary frame (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();
    ping_handle.abort();
    state.registry.unregister(connection_id);

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket actor stopped"
    );
}

/// Wait for the first text frame; it must be a valid `auth` envelope whose
/// token verifies for the claimed user, within the configured grace window.
/// Transport-level ping/pong is answered and does not count against the
/// client, so keepalive-enabled clients are not rejected before they auth.
async fn await_auth(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<String, (u16, &'static str)> {
    let deadline = tokio::time::Instant::now() + state.auth_grace;

    let text = loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .ok_or((CLOSE_AUTH_TIMEOUT, "No auth frame within grace window"))?;
        let next = timeout(remaining, ws_receiver.next())
            .await
            .map_err(|_| (CLOSE_AUTH_TIMEOUT, "No auth frame within grace window"))?;

        match next {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Ping(data))) => {
                let _ = tx.send(Message::Pong(data));
            }
            Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Binary(_))) => {
                return Err((CLOSE_PROTOCOL_ERROR, "Expected auth text frame"))
            }
            _ => return Err((CLOSE_PROTOCOL_ERROR, "Socket closed before auth")),
        }
    };

    let frame = serde_json::from_str::<ClientFrame>(text.as_str())
        .map_err(|_| (CLOSE_PROTOCOL_ERROR, "Undecodable auth frame"))?;

    let ClientFrame::Auth { user_id, token } = frame else {
        return Err((CLOSE_PROTOCOL_ERROR, "First frame must be auth"));
    };

    match state.verifier.verify(&token) {
        Ok(subject) if subject == user_id => Ok(user_id),
        Ok(_) => Err((CLOSE_TOKEN_INVALID, "Token subject mismatch")),
        Err(TokenError::Expired) => Err((CLOSE_TOKEN_INVALID, "Token expired")),
        Err(TokenError::Invalid) => Err((CLOSE_TOKEN_INVALID, "Token invalid")),
    }
}

/// Writer task: receives messages from the mpsc channel and forwards them to
/// the WebSocket sink. Exits on send failure or when all senders drop.
async fn writer_task(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
        if is_close {
            break;
        }
    }
}
