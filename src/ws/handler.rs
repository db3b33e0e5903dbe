use axum::extract::{ws::WebSocketUpgrade, State};
use axum::response::Response;

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. Authentication happens on the first frame
/// inside the actor: the socket must send an `auth` envelope within the
/// configured grace window or it is closed without ever being registered.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| actor::run_connection(socket, state))
}
