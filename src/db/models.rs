//! Row types for the notifications, chat_rooms, and chat_messages tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs and
//! double as wire payloads (they serialize into WS frames and HTTP bodies).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification category, stored as its kebab-case wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderApproved,
    OrderRejected,
    OrderShipped,
    OrderDelivered,
    TicketStatusChanged,
    General,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderPlaced => "order-placed",
            NotificationKind::OrderApproved => "order-approved",
            NotificationKind::OrderRejected => "order-rejected",
            NotificationKind::OrderShipped => "order-shipped",
            NotificationKind::OrderDelivered => "order-delivered",
            NotificationKind::TicketStatusChanged => "ticket-status-changed",
            NotificationKind::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "order-placed" => Some(NotificationKind::OrderPlaced),
            "order-approved" => Some(NotificationKind::OrderApproved),
            "order-rejected" => Some(NotificationKind::OrderRejected),
            "order-shipped" => Some(NotificationKind::OrderShipped),
            "order-delivered" => Some(NotificationKind::OrderDelivered),
            "ticket-status-changed" => Some(NotificationKind::TicketStatusChanged),
            "general" => Some(NotificationKind::General),
            _ => None,
        }
    }
}

/// A persisted, user-addressed record of a domain event. Immutable except
/// for the read_at transition (null -> set, once).
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub order_id: Option<String>,
    pub ticket_id: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A 1:1 chat channel scoped to exactly one order. At most one room ever
/// exists per order_id.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRoom {
    pub id: String,
    pub order_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub active: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ChatRoom {
    /// The participant a message from `sender_id` is addressed to.
    /// None if the sender is not a participant at all.
    pub fn other_participant(&self, sender_id: &str) -> Option<&str> {
        if sender_id == self.buyer_id {
            Some(&self.seller_id)
        } else if sender_id == self.seller_id {
            Some(&self.buyer_id)
        } else {
            None
        }
    }
}

/// Chat message payload category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    #[serde(alias = "TEXT")]
    Text,
    #[serde(alias = "IMAGE")]
    Image,
    #[serde(alias = "FILE")]
    File,
    #[serde(alias = "SYSTEM")]
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
            MessageKind::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Some(MessageKind::Text),
            "image" => Some(MessageKind::Image),
            "file" => Some(MessageKind::File),
            "system" => Some(MessageKind::System),
            _ => None,
        }
    }
}

/// A message within a chat room. Append-only except for the read_at
/// transition and a sender-only content edit.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub kind: MessageKind,
    pub content: String,
    pub attachment: Option<String>,
    pub seq: i64,
    pub read_at: Option<DateTime<Utc>>,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parse an RFC 3339 text column into a DateTime, surfacing failures as a
/// rusqlite conversion error so row mappers can use `?`.
pub(crate) fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Same as `parse_ts` for nullable timestamp columns.
pub(crate) fn parse_ts_opt(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, s)).transpose()
}

/// Parse a stored kind column, surfacing unknown values as a conversion error.
pub(crate) fn parse_kind<T>(
    idx: usize,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown kind: {raw}").into(),
        )
    })
}
