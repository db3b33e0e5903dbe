//! Chat room manager: the 1:1 mapping between an order and its room.
//!
//! Creation is idempotent under concurrency: the UNIQUE constraint on
//! order_id is the arbiter. A loser of the insert race re-selects the row
//! the winner created, so concurrent callers always converge on one room.

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::models::{parse_ts, parse_ts_opt, ChatRoom};
use crate::db::{acquire, DbPool};
use crate::error::{CoreError, Result};

#[derive(Clone)]
pub struct RoomManager {
    db: DbPool,
}

impl RoomManager {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Return the room for `order_id`, creating it if absent. At most one
    /// room ever exists per order, however many callers race.
    pub async fn get_or_create_for_order(
        &self,
        order_id: &str,
        buyer_id: &str,
        seller_id: &str,
    ) -> Result<ChatRoom> {
        if buyer_id == seller_id {
            return Err(CoreError::InvalidParticipants);
        }

        let db = self.db.clone();
        let order_id = order_id.to_string();
        let buyer_id = buyer_id.to_string();
        let seller_id = seller_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;

            if let Some(room) = find_by_order(&conn, &order_id)? {
                return Ok(room);
            }

            let insert = conn.execute(
                "INSERT OR IGNORE INTO chat_rooms (id, order_id, buyer_id, seller_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::now_v7().to_string(),
                    order_id,
                    buyer_id,
                    seller_id,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            if insert == 0 {
                tracing::debug!(order_id = %order_id, "Lost room-creation race, reusing winner");
            }

            // Read back whichever row the constraint let through.
            find_by_order(&conn, &order_id)?.ok_or(CoreError::NotFound)
        })
        .await?
    }

    /// Mark a room inactive. Subsequent appends fail with `RoomClosed`.
    /// Called by the order collaborator when the order reaches a terminal
    /// state.
    pub async fn deactivate(&self, room_id: &str) -> Result<()> {
        let db = self.db.clone();
        let room_id = room_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            let changed = conn.execute(
                "UPDATE chat_rooms SET active = 0 WHERE id = ?1",
                params![room_id],
            )?;
            if changed == 0 {
                return Err(CoreError::NotFound);
            }
            Ok(())
        })
        .await?
    }

    /// All rooms where the user is a participant, most recent activity
    /// first; rooms that never saw a message sort last by creation time.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ChatRoom>> {
        let db = self.db.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            let mut stmt = conn.prepare(
                "SELECT id, order_id, buyer_id, seller_id, active, last_message_at, created_at
                 FROM chat_rooms
                 WHERE buyer_id = ?1 OR seller_id = ?1
                 ORDER BY CASE WHEN last_message_at IS NULL THEN 1 ELSE 0 END,
                          last_message_at DESC,
                          created_at DESC",
            )?;
            let rows = stmt.query_map(params![user_id], row_to_room)?;

            let mut rooms = Vec::new();
            for row in rows {
                rooms.push(row?);
            }
            Ok(rooms)
        })
        .await?
    }

    pub async fn get(&self, room_id: &str) -> Result<ChatRoom> {
        let db = self.db.clone();
        let room_id = room_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = acquire(&db)?;
            get_room(&conn, &room_id)
        })
        .await?
    }
}

pub(crate) fn get_room(conn: &Connection, room_id: &str) -> Result<ChatRoom> {
    let room = conn.query_row(
        "SELECT id, order_id, buyer_id, seller_id, active, last_message_at, created_at
         FROM chat_rooms WHERE id = ?1",
        params![room_id],
        row_to_room,
    )?;
    Ok(room)
}

fn find_by_order(conn: &Connection, order_id: &str) -> Result<Option<ChatRoom>> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, buyer_id, seller_id, active, last_message_at, created_at
         FROM chat_rooms WHERE order_id = ?1",
    )?;
    let mut rows = stmt.query_map(params![order_id], row_to_room)?;
    match rows.next() {
        Some(room) => Ok(Some(room?)),
        None => Ok(None),
    }
}

fn row_to_room(row: &Row<'_>) -> rusqlite::Result<ChatRoom> {
    let active: i64 = row.get(4)?;
    let last_message_at: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(ChatRoom {
        id: row.get(0)?,
        order_id: row.get(1)?,
        buyer_id: row.get(2)?,
        seller_id: row.get(3)?,
        active: active != 0,
        last_message_at: parse_ts_opt(5, last_message_at)?,
        created_at: parse_ts(6, created_at)?,
    })
}
