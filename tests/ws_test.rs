//! Integration tests for the WebSocket surface: first-frame auth, live
//! notification push, multi-device fan-out, and chat frames.

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pazar_realtime::db::models::MessageKind;
use pazar_realtime::events::DomainEvent;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use common::{issue_token, spawn_app};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connect and complete the auth handshake for `user_id`.
async fn connect_authed(addr: std::net::SocketAddr, user_id: &str) -> WsStream {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect to WebSocket");
    let auth = json!({
        "type": "auth",
        "user_id": user_id,
        "token": issue_token(user_id),
    });
    ws.send(Message::Text(auth.to_string().into()))
        .await
        .expect("Failed to send auth frame");
    ws
}

/// Read the next JSON text frame, skipping transport frames.
async fn next_json(ws: &mut WsStream, wait: Duration) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .expect("timed out waiting for a frame");
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(text.as_str()).expect("frame is not JSON")
            }
            Ok(Some(Ok(_))) => continue,
            other => panic!("socket ended while waiting for a frame: {other:?}"),
        }
    }
}

/// Wait until the registry sees `count` connections for the user, so a push
/// after this cannot race the registration.
async fn wait_for_connections(app: &common::TestApp, user_id: &str, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while app.state.registry.connection_count(user_id) < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "connection never registered"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn authed_connection_receives_live_notification() {
    let app = spawn_app().await;
    let mut ws = connect_authed(app.addr, "u-seller").await;
    wait_for_connections(&app, "u-seller", 1).await;

    app.state
        .notifier
        .notify(DomainEvent::OrderPlaced {
            order_id: "o1".to_string(),
            buyer_id: "u-buyer".to_string(),
            seller_id: "u-seller".to_string(),
            product_name: "Demo".to_string(),
            quantity: 15,
        })
        .await
        .unwrap();

    let frame = next_json(&mut ws, Duration::from_secs(2)).await;
    assert_eq!(frame["type"], "notification");
    assert_eq!(frame["notification"]["kind"], "order-placed");
    assert_eq!(frame["notification"]["order_id"], "o1");
}

#[tokio::test]
async fn multi_device_users_get_every_push() {
    let app = spawn_app().await;
    let mut ws_a = connect_authed(app.addr, "u-seller").await;
    let mut ws_b = connect_authed(app.addr, "u-seller").await;
    wait_for_connections(&app, "u-seller", 2).await;

    app.state
        .notifier
        .notify(DomainEvent::TicketStatusChanged {
            ticket_id: "t1".to_string(),
            owner_id: "u-seller".to_string(),
            new_status: "resolved".to_string(),
        })
        .await
        .unwrap();

    for ws in [&mut ws_a, &mut ws_b] {
        let frame = next_json(ws, Duration::from_secs(2)).await;
        assert_eq!(frame["type"], "notification");
        // The dedicated status frame follows the notification.
        let frame = next_json(ws, Duration::from_secs(2)).await;
        assert_eq!(frame["type"], "ticket_status_update");
        assert_eq!(frame["status"], "resolved");
    }
}

#[tokio::test]
async fn keepalive_ping_before_auth_is_tolerated() {
    let app = spawn_app().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", app.addr))
        .await
        .unwrap();

    // A keepalive-enabled client may ping before it sends the auth frame.
    ws.send(Message::Ping(vec![9].into())).await.unwrap();
    let auth = json!({
        "type": "auth",
        "user_id": "u-seller",
        "token": issue_token("u-seller"),
    });
    ws.send(Message::Text(auth.to_string().into()))
        .await
        .unwrap();
    wait_for_connections(&app, "u-seller", 1).await;

    // The ping was answered rather than treated as a protocol violation.
    let pong = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("expected a pong")
        .expect("stream ended")
        .expect("transport error");
    assert!(matches!(pong, Message::Pong(data) if data.as_ref() == [9]));

    // And the connection works normally afterwards.
    app.state
        .notifier
        .notify(DomainEvent::OrderPlaced {
            order_id: "o1".to_string(),
            buyer_id: "u-buyer".to_string(),
            seller_id: "u-seller".to_string(),
            product_name: "Demo".to_string(),
            quantity: 1,
        })
        .await
        .unwrap();
    let frame = next_json(&mut ws, Duration::from_secs(2)).await;
    assert_eq!(frame["type"], "notification");
}

#[tokio::test]
async fn invalid_token_closes_before_registration() {
    let app = spawn_app().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", app.addr))
        .await
        .unwrap();

    let auth = json!({ "type": "auth", "user_id": "u-seller", "token": "garbage" });
    ws.send(Message::Text(auth.to_string().into()))
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("expected a close frame")
        .expect("stream ended")
        .expect("transport error");
    match msg {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4002),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(app.state.registry.connection_count("u-seller"), 0);
}

#[tokio::test]
async fn silent_socket_is_closed_after_grace_window() {
    let app = spawn_app().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", app.addr))
        .await
        .unwrap();

    // Send nothing; the test app's grace window is 500ms.
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("expected a close frame")
        .expect("stream ended")
        .expect("transport error");
    match msg {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4001),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn ws_new_message_reaches_the_other_participant_and_persists() {
    let app = spawn_app().await;

    let room = app
        .state
        .rooms
        .get_or_create_for_order("o1", "u-buyer", "u-seller")
        .await
        .unwrap();

    let mut buyer = connect_authed(app.addr, "u-buyer").await;
    let mut seller = connect_authed(app.addr, "u-seller").await;
    wait_for_connections(&app, "u-buyer", 1).await;
    wait_for_connections(&app, "u-seller", 1).await;

    let frame = json!({
        "type": "new_message",
        "room_id": room.id,
        "content": "Merhaba",
        "kind": "TEXT"
    });
    buyer
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();

    let received = next_json(&mut seller, Duration::from_secs(2)).await;
    assert_eq!(received["type"], "new_message");
    assert_eq!(received["message"]["content"], "Merhaba");
    assert_eq!(received["message"]["sender_id"], "u-buyer");

    // Sender's own device gets the echo too.
    let echo = next_json(&mut buyer, Duration::from_secs(2)).await;
    assert_eq!(echo["type"], "new_message");

    // Durable before push: backfill sees the same message.
    let listed = app.state.chat.list(&room.id, 10, 0).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "Merhaba");
    assert_eq!(
        app.state
            .chat
            .unread_count_for_room(&room.id, "u-seller")
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn edits_push_a_message_edited_frame_to_the_receiver() {
    let app = spawn_app().await;

    let room = app
        .state
        .rooms
        .get_or_create_for_order("o1", "u-buyer", "u-seller")
        .await
        .unwrap();
    let message = app
        .state
        .chat
        .append(&room.id, "u-buyer", "Merhaba", MessageKind::Text)
        .await
        .unwrap();

    let mut seller = connect_authed(app.addr, "u-seller").await;
    wait_for_connections(&app, "u-seller", 1).await;

    app.state
        .chat
        .edit(&message.id, "u-buyer", "Merhaba dünya")
        .await
        .unwrap();

    let frame = next_json(&mut seller, Duration::from_secs(2)).await;
    assert_eq!(frame["type"], "message_edited");
    assert_eq!(frame["message"]["content"], "Merhaba dünya");
    assert_eq!(frame["message"]["edited"], true);
}

#[tokio::test]
async fn disconnect_unregisters_and_backfill_recovers_the_miss() {
    let app = spawn_app().await;

    let ws = connect_authed(app.addr, "u-seller").await;
    wait_for_connections(&app, "u-seller", 1).await;
    drop(ws);

    // The actor notices the closed socket and unregisters.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while app.state.registry.connection_count("u-seller") > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "connection never unregistered"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // A notification while offline is still durable for backfill.
    app.state
        .notifier
        .notify(DomainEvent::OrderPlaced {
            order_id: "o9".to_string(),
            buyer_id: "u-buyer".to_string(),
            seller_id: "u-seller".to_string(),
            product_name: "Demo".to_string(),
            quantity: 1,
        })
        .await
        .unwrap();

    let listed = app.state.notifier.list_for_user("u-seller", 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].read_at.is_none());
}
