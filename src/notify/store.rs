//! Durable notification records with read/unread bookkeeping.
//!
//! Methods are synchronous rusqlite calls; async callers run them under
//! `tokio::task::spawn_blocking`. The unread count is computed live rather
//! than cached — every read and write of a user's notifications goes through
//! the same connection mutex, so the derived count can never drift from the
//! true one.

use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::models::{parse_kind, parse_ts, parse_ts_opt, Notification, NotificationKind};
use crate::db::{acquire, DbPool};
use crate::error::Result;

/// Fields the dispatcher supplies when rendering an event.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub order_id: Option<String>,
    pub ticket_id: Option<String>,
}

#[derive(Clone)]
pub struct NotificationStore {
    db: DbPool,
}

impl NotificationStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Persist a new notification. The uuid-v7 ID makes records unique and
    /// time-ordered, which clients rely on for dedup.
    pub fn insert(&self, new: NewNotification) -> Result<Notification> {
        let conn = acquire(&self.db)?;
        let notification = Notification {
            id: Uuid::now_v7().to_string(),
            recipient_id: new.recipient_id,
            kind: new.kind,
            title: new.title,
            body: new.body,
            order_id: new.order_id,
            ticket_id: new.ticket_id,
            read_at: None,
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO notifications (id, recipient_id, kind, title, body, order_id, ticket_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                notification.id,
                notification.recipient_id,
                notification.kind.as_str(),
                notification.title,
                notification.body,
                notification.order_id,
                notification.ticket_id,
                notification.created_at.to_rfc3339(),
            ],
        )?;
        Ok(notification)
    }

    /// Newest-first listing for panel population and reconnect backfill.
    pub fn list_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>> {
        let conn = acquire(&self.db)?;
        let mut stmt = conn.prepare(
            "SELECT id, recipient_id, kind, title, body, order_id, ticket_id, read_at, created_at
             FROM notifications
             WHERE recipient_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    pub fn unread_count(&self, user_id: &str) -> Result<i64> {
        let conn = acquire(&self.db)?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND read_at IS NULL",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Set read_at once. Returns true if the notification transitioned to
    /// read, false if it was already read (no-op). The read_at guard in the
    /// UPDATE makes the transition monotonic: it is never overwritten.
    pub fn mark_read(&self, notification_id: &str, user_id: &str) -> Result<bool> {
        let conn = acquire(&self.db)?;
        let recipient_id: String = conn.query_row(
            "SELECT recipient_id FROM notifications WHERE id = ?1",
            params![notification_id],
            |row| row.get(0),
        )?;
        if recipient_id != user_id {
            return Err(crate::error::CoreError::Forbidden);
        }

        let changed = conn.execute(
            "UPDATE notifications SET read_at = ?1 WHERE id = ?2 AND read_at IS NULL",
            params![Utc::now().to_rfc3339(), notification_id],
        )?;
        Ok(changed > 0)
    }

    /// One logical operation: every currently-unread notification for the
    /// user becomes read, and the unread count drops to zero.
    pub fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let conn = acquire(&self.db)?;
        let changed = conn.execute(
            "UPDATE notifications SET read_at = ?1 WHERE recipient_id = ?2 AND read_at IS NULL",
            params![Utc::now().to_rfc3339(), user_id],
        )?;
        Ok(changed as u64)
    }
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind_raw: String = row.get(2)?;
    let read_at: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(Notification {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        kind: parse_kind(2, &kind_raw, NotificationKind::parse)?,
        title: row.get(3)?,
        body: row.get(4)?,
        order_id: row.get(5)?,
        ticket_id: row.get(6)?,
        read_at: parse_ts_opt(7, read_at)?,
        created_at: parse_ts(8, created_at)?,
    })
}
