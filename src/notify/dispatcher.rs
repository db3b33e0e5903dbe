//! Event-to-notification dispatch: render, persist, then best-effort push.
//!
//! Persistence success is the only contract `notify` makes to its caller.
//! The live push happens after the durable write and its outcome never
//! changes the result — an offline recipient discovers the notification on
//! the next backfill query.

use std::sync::Arc;

use crate::db::models::{Notification, NotificationKind};
use crate::error::Result;
use crate::events::{DomainEvent, OrderStatus};
use crate::notify::store::{NewNotification, NotificationStore};
use crate::ws::protocol::ServerFrame;
use crate::ws::registry::ConnectionRegistry;

pub struct NotificationDispatcher {
    store: NotificationStore,
    registry: Arc<ConnectionRegistry>,
}

impl NotificationDispatcher {
    pub fn new(store: NotificationStore, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Map a domain event to a notification record, persist it, and push it
    /// to every live connection of the recipient.
    pub async fn notify(&self, event: DomainEvent) -> Result<Notification> {
        let rendered = render(&event);
        let store = self.store.clone();
        let notification =
            tokio::task::spawn_blocking(move || store.insert(rendered)).await??;

        let delivered = self.registry.send(
            &notification.recipient_id,
            &ServerFrame::Notification {
                notification: notification.clone(),
            },
        );

        // Status changes additionally push their dedicated update frame so
        // clients can patch entity state without refetching.
        match &event {
            DomainEvent::OrderStatusChanged {
                order_id,
                buyer_id,
                new_status,
                old_status,
            } => {
                self.registry.send(
                    buyer_id,
                    &ServerFrame::OrderStatusUpdate {
                        order_id: order_id.clone(),
                        old_status: old_status.as_str().to_string(),
                        new_status: new_status.as_str().to_string(),
                    },
                );
            }
            DomainEvent::TicketStatusChanged {
                ticket_id,
                owner_id,
                new_status,
            } => {
                self.registry.send(
                    owner_id,
                    &ServerFrame::TicketStatusUpdate {
                        ticket_id: ticket_id.clone(),
                        status: new_status.clone(),
                    },
                );
            }
            DomainEvent::OrderPlaced { .. } => {}
        }

        tracing::debug!(
            notification_id = %notification.id,
            recipient = %notification.recipient_id,
            kind = notification.kind.as_str(),
            delivered = delivered,
            "Notification persisted and pushed"
        );
        Ok(notification)
    }

    pub async fn list_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<Notification>> {
        let store = self.store.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || store.list_for_user(&user_id, limit)).await?
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<i64> {
        let store = self.store.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || store.unread_count(&user_id)).await?
    }

    pub async fn mark_read(&self, notification_id: &str, user_id: &str) -> Result<bool> {
        let store = self.store.clone();
        let notification_id = notification_id.to_string();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || store.mark_read(&notification_id, &user_id)).await?
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let store = self.store.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || store.mark_all_read(&user_id)).await?
    }
}

/// The event-to-notification mapping table.
/// Order placed goes to the seller; status changes go to the buyer; ticket
/// changes go to the ticket owner.
fn render(event: &DomainEvent) -> NewNotification {
    match event {
        DomainEvent::OrderPlaced {
            order_id,
            seller_id,
            product_name,
            quantity,
            ..
        } => NewNotification {
            recipient_id: seller_id.clone(),
            kind: NotificationKind::OrderPlaced,
            title: "New order received".to_string(),
            body: format!("{product_name} x{quantity} was ordered"),
            order_id: Some(order_id.clone()),
            ticket_id: None,
        },
        DomainEvent::OrderStatusChanged {
            order_id,
            buyer_id,
            new_status,
            ..
        } => {
            let (kind, title) = match new_status {
                OrderStatus::Approved => (NotificationKind::OrderApproved, "Order approved"),
                OrderStatus::Rejected => (NotificationKind::OrderRejected, "Order rejected"),
                OrderStatus::Shipped => (NotificationKind::OrderShipped, "Order shipped"),
                OrderStatus::Delivered => (NotificationKind::OrderDelivered, "Order delivered"),
                // Placed arrives via OrderPlaced; a status change back to it
                // is unexpected but still worth telling the buyer about.
                OrderStatus::Placed => (NotificationKind::General, "Order updated"),
            };
            NewNotification {
                recipient_id: buyer_id.clone(),
                kind,
                title: title.to_string(),
                body: format!("Your order {order_id} is now {}", new_status.as_str()),
                order_id: Some(order_id.clone()),
                ticket_id: None,
            }
        }
        DomainEvent::TicketStatusChanged {
            ticket_id,
            owner_id,
            new_status,
        } => NewNotification {
            recipient_id: owner_id.clone(),
            kind: NotificationKind::TicketStatusChanged,
            title: "Ticket status updated".to_string(),
            body: format!("Your ticket {ticket_id} is now {new_status}"),
            order_id: None,
            ticket_id: Some(ticket_id.clone()),
        },
    }
}
