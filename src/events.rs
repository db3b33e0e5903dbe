//! Domain events and the in-process event bus.
//!
//! Events arrive as a closed tagged enum — collaborators cannot hand the
//! dispatcher a shape it was not built for. The bus is a fan-in mpsc
//! channel; a spawned loop drains it into the notification dispatcher so
//! collaborators never block on delivery.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::db::models::Notification;
use crate::error::Result;
use crate::notify::dispatcher::NotificationDispatcher;

/// Order lifecycle states as reported by the order collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Approved,
    Rejected,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }
}

/// Events raised by the order and ticket collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced {
        order_id: String,
        buyer_id: String,
        seller_id: String,
        product_name: String,
        quantity: u32,
    },
    OrderStatusChanged {
        order_id: String,
        buyer_id: String,
        new_status: OrderStatus,
        old_status: OrderStatus,
    },
    TicketStatusChanged {
        ticket_id: String,
        owner_id: String,
        new_status: String,
    },
}

/// On a retryable store failure, how many delivery attempts the bus makes.
const MAX_ATTEMPTS: u32 = 3;
/// Base backoff between attempts, doubled each retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Fan-in handle for collaborators. Cheap to clone into handlers.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            tracing::error!("Event bus receiver dropped; event lost");
        }
    }
}

/// Drain the bus into the dispatcher. Retryable store failures get a bounded
/// backoff-retry here (the bus is the caller); terminal errors are logged and
/// the event is dropped.
pub async fn run_event_loop(
    mut rx: mpsc::UnboundedReceiver<DomainEvent>,
    notifier: Arc<NotificationDispatcher>,
) {
    while let Some(event) = rx.recv().await {
        let send = |event: DomainEvent| {
            let notifier = notifier.clone();
            async move { notifier.notify(event).await }
        };
        match deliver_with_retry(event.clone(), send).await {
            Ok(notification) => {
                tracing::debug!(
                    notification_id = %notification.id,
                    recipient = %notification.recipient_id,
                    "Event dispatched"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, event = ?event, "Failed to dispatch event");
            }
        }
    }
}

/// Attempt delivery up to `MAX_ATTEMPTS` times, sleeping a doubling backoff
/// between attempts. Only retryable errors are retried; terminal errors
/// surface immediately.
async fn deliver_with_retry<F, Fut>(event: DomainEvent, mut send: F) -> Result<Notification>
where
    F: FnMut(DomainEvent) -> Fut,
    Fut: std::future::Future<Output = Result<Notification>>,
{
    let mut backoff = RETRY_BACKOFF;
    for attempt in 1..MAX_ATTEMPTS {
        match send(event.clone()).await {
            Ok(notification) => return Ok(notification),
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    "Retryable store failure dispatching event"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
    // Last attempt; whatever happens here is final.
    send(event).await
}
