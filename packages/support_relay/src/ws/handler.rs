//! WebSocket Handler
//!
//! Drives one relay connection: a writer half draining the outbound queue and
//! a reader half feeding frames into the session state machine.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::time::Duration;
use tokio::time::{Instant, Interval, interval_at};
use tracing::{debug, error, info};

use crate::server::RelayState;

use super::connection::{ConnectionHandle, ConnectionId};
use super::protocol::{ClientMessage, ProtocolError};
use super::router::Router;
use super::session::{Outcome, Session, SessionGuard};

fn ping_ticker(period: Option<Duration>) -> Option<Interval> {
    period.map(|p| interval_at(Instant::now() + p, p))
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Handle a relay WebSocket connection until either side closes it.
pub async fn handle_relay_ws(socket: WebSocket, state: RelayState) {
    let conn_id = ConnectionId::next();
    info!(conn_id = %conn_id, "New relay WebSocket connection");
    state.metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (conn, mut rx) = ConnectionHandle::channel(conn_id, state.config.send_queue_capacity);
    let mut ticker = ping_ticker(state.config.ping_interval);

    // Task to send messages to WebSocket
    let sender_task = async move {
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    let json = match serde_json::to_string(&msg) {
                        Ok(j) => j,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = next_tick(&mut ticker) => {
                    if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    };

    // Unregisters the session when dropped, even if this task unwinds
    let mut session = SessionGuard::new(
        Session::new(conn),
        Router::new(&state.registry, &state.metrics),
    );

    // Task to handle incoming messages
    let input_task = async {
        while let Some(msg) = ws_receiver.next().await {
            let parsed = match msg {
                Ok(Message::Text(text)) => {
                    state.metrics.frame_received();
                    ClientMessage::parse(text.as_str())
                }
                Ok(Message::Binary(_)) => {
                    state.metrics.frame_received();
                    Err(ProtocolError::Unsupported("binary"))
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!(conn_id = %conn_id, "WebSocket read error: {}", e);
                    break;
                }
            };

            match parsed {
                Ok(client_msg) => {
                    if let Outcome::Ignored(reason) = session.handle(client_msg) {
                        state.metrics.frame_ignored();
                        debug!(conn_id = %conn_id, reason, "Ignoring frame");
                    }
                }
                Err(e) => {
                    state.metrics.frame_malformed();
                    debug!(conn_id = %conn_id, "Dropping frame: {}", e);
                }
            }
        }
    };

    tokio::select! {
        _ = sender_task => {
            debug!(conn_id = %conn_id, "WebSocket sender ended");
        }
        _ = input_task => {
            debug!(conn_id = %conn_id, "WebSocket receiver ended");
        }
    }

    drop(session);
    state.metrics.connection_closed();
    info!(conn_id = %conn_id, "Relay WebSocket connection closed");
}
