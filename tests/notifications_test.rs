//! Integration tests for notification dispatch, backfill listing, and
//! unread-state bookkeeping.

mod common;

use std::time::Duration;

use pazar_realtime::events::{DomainEvent, OrderStatus};
use serde_json::json;

use common::spawn_app;

fn order_placed() -> DomainEvent {
    DomainEvent::OrderPlaced {
        order_id: "o1".to_string(),
        buyer_id: "u-buyer".to_string(),
        seller_id: "u-seller".to_string(),
        product_name: "Demo".to_string(),
        quantity: 15,
    }
}

#[tokio::test]
async fn order_placed_persists_for_offline_seller() {
    let app = spawn_app().await;

    // Seller has no open connection: delivery is a miss, not an error.
    assert_eq!(app.state.registry.connection_count("u-seller"), 0);

    let notification = app.state.notifier.notify(order_placed()).await.unwrap();
    assert_eq!(notification.recipient_id, "u-seller");
    assert!(notification.read_at.is_none());

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .get(format!(
            "{}/api/notifications/unread-count?user_id=u-seller",
            app.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["unread"], 1);
}

#[tokio::test]
async fn backfill_lists_newest_first_with_null_read_at() {
    let app = spawn_app().await;

    app.state.notifier.notify(order_placed()).await.unwrap();
    app.state
        .notifier
        .notify(DomainEvent::TicketStatusChanged {
            ticket_id: "t9".to_string(),
            owner_id: "u-seller".to_string(),
            new_status: "open".to_string(),
        })
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let listed: Vec<serde_json::Value> = client
        .get(format!(
            "{}/api/notifications?user_id=u-seller&limit=10",
            app.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(listed.len(), 2);
    // Newest first: the ticket notification precedes the order one.
    assert_eq!(listed[0]["kind"], "ticket-status-changed");
    assert_eq!(listed[1]["kind"], "order-placed");
    assert!(listed[1]["read_at"].is_null());
}

#[tokio::test]
async fn unread_count_tracks_reads_and_repeat_mark_is_noop() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let first = app.state.notifier.notify(order_placed()).await.unwrap();
    app.state
        .notifier
        .notify(DomainEvent::OrderStatusChanged {
            order_id: "o2".to_string(),
            buyer_id: "u-seller".to_string(),
            new_status: OrderStatus::Approved,
            old_status: OrderStatus::Placed,
        })
        .await
        .unwrap();

    let unread = |app_url: String| {
        let client = client.clone();
        async move {
            let v: serde_json::Value = client
                .get(format!(
                    "{app_url}/api/notifications/unread-count?user_id=u-seller"
                ))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            v["unread"].as_i64().unwrap()
        }
    };

    assert_eq!(unread(app.base_url.clone()).await, 2);

    let resp: serde_json::Value = client
        .post(format!(
            "{}/api/notifications/{}/read",
            app.base_url, first.id
        ))
        .json(&json!({ "user_id": "u-seller" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["newly_read"], true);
    assert_eq!(unread(app.base_url.clone()).await, 1);

    // Second mark of the same notification: no-op, counter stays put.
    let resp: serde_json::Value = client
        .post(format!(
            "{}/api/notifications/{}/read",
            app.base_url, first.id
        ))
        .json(&json!({ "user_id": "u-seller" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["newly_read"], false);
    assert_eq!(unread(app.base_url.clone()).await, 1);

    let status = client
        .post(format!("{}/api/notifications/read-all", app.base_url))
        .json(&json!({ "user_id": "u-seller" }))
        .send()
        .await
        .unwrap()
        .status();
    assert!(status.is_success());
    assert_eq!(unread(app.base_url.clone()).await, 0);
}

#[tokio::test]
async fn mark_read_enforces_ownership_and_existence() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let notification = app.state.notifier.notify(order_placed()).await.unwrap();

    // Someone else's notification: Forbidden.
    let status = client
        .post(format!(
            "{}/api/notifications/{}/read",
            app.base_url, notification.id
        ))
        .json(&json!({ "user_id": "u-intruder" }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::FORBIDDEN);

    // Unknown ID: NotFound.
    let status = client
        .post(format!(
            "{}/api/notifications/no-such-id/read",
            app.base_url
        ))
        .json(&json!({ "user_id": "u-seller" }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_intake_endpoint_feeds_the_bus() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let status = client
        .post(format!("{}/api/events", app.base_url))
        .json(&json!({
            "type": "order_placed",
            "order_id": "o7",
            "buyer_id": "u-buyer",
            "seller_id": "u-seller",
            "product_name": "Lamp",
            "quantity": 2
        }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::ACCEPTED);

    // The bus is asynchronous with respect to the caller; poll for the
    // durable write.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let v: serde_json::Value = client
            .get(format!(
                "{}/api/notifications/unread-count?user_id=u-seller",
                app.base_url
            ))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if v["unread"] == 1 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "event never became a notification"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
