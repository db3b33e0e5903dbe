//! Message store and delivery: append, edit, read-marking, paging, and
//! per-room unread accounting.
//!
//! Writes commit before any push. The push is targeted at the receiver's
//! live connections, plus an echo to the sender's other devices; either may
//! reach zero connections, which is a delivery miss, not a failure.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::chat::rooms::get_room;
use crate::db::models::{parse_kind, parse_ts, parse_ts_opt, ChatMessage, MessageKind};
use crate::db::{acquire, DbPool};
use crate::error::{CoreError, Result};
use crate::ws::protocol::ServerFrame;
use crate::ws::registry::ConnectionRegistry;

/// Maximum message content length (chars).
const MAX_CONTENT_LENGTH: usize = 4000;

/// Content limits are hard: empty content and oversize content are rejected,
/// never trimmed to fit — a success response always means the stored message
/// is exactly what the caller sent.
fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(CoreError::ContentEmpty);
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(CoreError::ContentTooLarge);
    }
    Ok(())
}

#[derive(Clone)]
pub struct MessageService {
    db: DbPool,
    registry: Arc<ConnectionRegistry>,
}

impl MessageService {
    pub fn new(db: DbPool, registry: Arc<ConnectionRegistry>) -> Self {
        Self { db, registry }
    }

    /// Append a message to a room. Fails with `RoomClosed` on an inactive
    /// room and `Forbidden` when the sender is not a participant. On success
    /// the message is durable, the room's last_message_at is bumped, and the
    /// receiver (plus the sender's other devices) gets a best-effort push.
    pub async fn append(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<ChatMessage> {
        validate_content(content)?;
        let db = self.db.clone();
        let room_id = room_id.to_string();
        let sender_id = sender_id.to_string();
        let content = content.to_string();

        let message = tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            let room = get_room(&conn, &room_id)?;

            if !room.active {
                return Err(CoreError::RoomClosed);
            }
            let receiver_id = room
                .other_participant(&sender_id)
                .ok_or(CoreError::Forbidden)?
                .to_string();

            // Per-room sequence assignment; the connection mutex makes the
            // read-increment-insert linearizable.
            let seq: i64 = conn.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM chat_messages WHERE room_id = ?1",
                params![room_id],
                |row| row.get(0),
            )?;

            let now = Utc::now();
            let message = ChatMessage {
                id: Uuid::now_v7().to_string(),
                room_id: room_id.clone(),
                sender_id,
                receiver_id,
                kind,
                content,
                attachment: None,
                seq,
                read_at: None,
                edited: false,
                created_at: now,
                updated_at: now,
            };

            conn.execute(
                "INSERT INTO chat_messages
                 (id, room_id, sender_id, receiver_id, kind, content, seq, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    message.id,
                    message.room_id,
                    message.sender_id,
                    message.receiver_id,
                    message.kind.as_str(),
                    message.content,
                    message.seq,
                    message.created_at.to_rfc3339(),
                    message.updated_at.to_rfc3339(),
                ],
            )?;
            conn.execute(
                "UPDATE chat_rooms SET last_message_at = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), room_id],
            )?;

            Ok(message)
        })
        .await??;

        let frame = ServerFrame::NewMessage {
            message: message.clone(),
        };
        let delivered = self.registry.send(&message.receiver_id, &frame);
        // Multi-device echo: the sender's other tabs should see it too.
        self.registry.send(&message.sender_id, &frame);

        tracing::debug!(
            message_id = %message.id,
            room_id = %message.room_id,
            delivered = delivered,
            "Message appended"
        );
        Ok(message)
    }

    /// Edit a message's content. Only the original author may edit, and only
    /// content/updated_at/edited change — never sender, room, or created_at.
    pub async fn edit(
        &self,
        message_id: &str,
        sender_id: &str,
        new_content: &str,
    ) -> Result<ChatMessage> {
        validate_content(new_content)?;
        let db = self.db.clone();
        let message_id = message_id.to_string();
        let sender_id = sender_id.to_string();
        let new_content = new_content.to_string();

        let message = tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            let mut message = get_message(&conn, &message_id)?;

            if message.sender_id != sender_id {
                return Err(CoreError::Forbidden);
            }

            let now = Utc::now();
            conn.execute(
                "UPDATE chat_messages SET content = ?1, edited = 1, updated_at = ?2 WHERE id = ?3",
                params![new_content, now.to_rfc3339(), message_id],
            )?;

            message.content = new_content;
            message.edited = true;
            message.updated_at = now;
            Ok(message)
        })
        .await??;

        // Push the edit to the other participant if connected.
        self.registry.send(
            &message.receiver_id,
            &ServerFrame::MessageEdited {
                message: message.clone(),
            },
        );
        Ok(message)
    }

    /// Set read_at once; only the receiver may mark. Returns false when the
    /// message was already read (repeat call, no-op).
    pub async fn mark_read(&self, message_id: &str, reader_id: &str) -> Result<bool> {
        let db = self.db.clone();
        let message_id = message_id.to_string();
        let reader_id = reader_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            let message = get_message(&conn, &message_id)?;

            if message.receiver_id != reader_id {
                return Err(CoreError::Forbidden);
            }

            let changed = conn.execute(
                "UPDATE chat_messages SET read_at = ?1 WHERE id = ?2 AND read_at IS NULL",
                params![Utc::now().to_rfc3339(), message_id],
            )?;
            Ok(changed > 0)
        })
        .await?
    }

    /// Chronological page of a room's messages (oldest first); paging
    /// through every offset reconstructs the full sequence without
    /// duplicates because the order is the per-room seq.
    pub async fn list(&self, room_id: &str, limit: u32, offset: u32) -> Result<Vec<ChatMessage>> {
        let db = self.db.clone();
        let room_id = room_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            // Listing an unknown room is NotFound, not an empty page.
            get_room(&conn, &room_id)?;

            let mut stmt = conn.prepare(
                "SELECT id, room_id, sender_id, receiver_id, kind, content, attachment, seq,
                        read_at, edited, created_at, updated_at
                 FROM chat_messages
                 WHERE room_id = ?1
                 ORDER BY seq ASC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![room_id, limit, offset], row_to_message)?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await?
    }

    pub async fn unread_count_for_room(&self, room_id: &str, user_id: &str) -> Result<i64> {
        let db = self.db.clone();
        let room_id = room_id.to_string();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            let count = conn.query_row(
                "SELECT COUNT(*) FROM chat_messages
                 WHERE room_id = ?1 AND receiver_id = ?2 AND read_at IS NULL",
                params![room_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await?
    }

    /// Unread messages addressed to the user, summed across all their rooms.
    pub async fn total_unread_for_user(&self, user_id: &str) -> Result<i64> {
        let db = self.db.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            let count = conn.query_row(
                "SELECT COUNT(*) FROM chat_messages WHERE receiver_id = ?1 AND read_at IS NULL",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await?
    }
}

fn get_message(conn: &Connection, message_id: &str) -> Result<ChatMessage> {
    let message = conn.query_row(
        "SELECT id, room_id, sender_id, receiver_id, kind, content, attachment, seq,
                read_at, edited, created_at, updated_at
         FROM chat_messages WHERE id = ?1",
        params![message_id],
        row_to_message,
    )?;
    Ok(message)
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let kind_raw: String = row.get(4)?;
    let read_at: Option<String> = row.get(8)?;
    let edited: i64 = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        room_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        kind: parse_kind(4, &kind_raw, MessageKind::parse)?,
        content: row.get(5)?,
        attachment: row.get(6)?,
        seq: row.get(7)?,
        read_at: parse_ts_opt(8, read_at)?,
        edited: edited != 0,
        created_at: parse_ts(10, created_at)?,
        updated_at: parse_ts(11, updated_at)?,
    })
}
