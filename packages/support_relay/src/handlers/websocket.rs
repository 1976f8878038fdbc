use axum::{
    extract::{State, ws::WebSocketUpgrade},
    response::IntoResponse,
};

use crate::server::RelayState;
use crate::ws::handle_relay_ws;

/// Upgrade to a relay WebSocket (customer or agent, decided by the first frame)
pub async fn relay_websocket_handler(
    State(state): State<RelayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_relay_ws(socket, state))
}
