//! Closed tagged JSON envelopes for the client-facing wire protocol.
//!
//! Every frame is a JSON object with a `type` discriminator. Inbound and
//! outbound shapes are separate enums so a handler can never receive a frame
//! shape it was not built for; decoding happens exactly once, here.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::db::models::{ChatMessage, MessageKind, Notification};
use crate::state::AppState;

/// Frames a client may send. The first frame on any connection must be
/// `auth`; everything else is rejected until authentication completes.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Auth {
        user_id: String,
        token: String,
    },
    NewMessage {
        room_id: String,
        content: String,
        #[serde(default)]
        kind: MessageKind,
    },
}

/// Frames the server pushes. Serialized once per send and written as a
/// single text frame to each target connection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Notification {
        notification: Notification,
    },
    NewMessage {
        message: ChatMessage,
    },
    MessageEdited {
        message: ChatMessage,
    },
    TicketStatusUpdate {
        ticket_id: String,
        status: String,
    },
    OrderStatusUpdate {
        order_id: String,
        old_status: String,
        new_status: String,
    },
}

/// Decode and dispatch one post-auth text frame from a client.
/// Errors are logged and never close the connection: a bad frame from one
/// device must not take down delivery to it.
pub async fn handle_client_frame(text: &str, state: &AppState, user_id: &str) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Undecodable client frame");
            return;
        }
    };

    match frame {
        ClientFrame::Auth { .. } => {
            // Already authenticated; a second auth frame is a protocol slip.
            tracing::debug!(user_id = %user_id, "Ignoring repeated auth frame");
        }
        ClientFrame::NewMessage {
            room_id,
            content,
            kind,
        } => {
            if let Err(e) = state.chat.append(&room_id, user_id, &content, kind).await {
                tracing::warn!(
                    user_id = %user_id,
                    room_id = %room_id,
                    error = %e,
                    "Rejected chat message from WS frame"
                );
            }
        }
    }
}

/// Serialize a server frame into a WS text message.
pub fn encode(frame: &ServerFrame) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server frame");
            None
        }
    }
}
