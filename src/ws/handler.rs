//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::ConnectionId;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, Frame};

/// Frames queued for one socket before broadcasts start dropping
const OUTBOX_CAPACITY: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id: ConnectionId = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbox_tx, outbox_rx) = mpsc::channel::<Frame>(OUTBOX_CAPACITY);

    // Writer task: outbox -> WebSocket
    let writer_handle = tokio::spawn(run_writer(conn_id, ws_sink, outbox_rx));

    run_reader(conn_id, ws_stream, &outbox_tx, &state).await;

    // Cleanup on disconnect
    state.router.disconnect(conn_id).await;
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Drain the outbox into the socket. A failed write is logged; only the reader ends the session.
async fn run_writer(
    conn_id: ConnectionId,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbox_rx: mpsc::Receiver<Frame>,
) {
    while let Some(frame) = outbox_rx.recv().await {
        if let Err(e) = ws_sink.send(Message::Text(frame.to_string())).await {
            warn!(conn_id = %conn_id, error = %e, "WebSocket send failed");
        }
    }
    debug!(conn_id = %conn_id, "Outbox closed");
}

/// Reader loop: WebSocket -> message router
async fn run_reader(
    conn_id: ConnectionId,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    outbox_tx: &mpsc::Sender<Frame>,
    state: &AppState,
) {
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(client_msg) => {
                    if !admit(&client_msg, &rate_limiter) {
                        debug!(conn_id = %conn_id, "Rate limited input message");
                        continue;
                    }
                    state.router.route(conn_id, client_msg, outbox_tx).await;
                }
                Err(e) => {
                    debug!(conn_id = %conn_id, error = %e, "Dropping malformed message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Joins bypass the per-frame quota; gameplay frames spend it.
fn admit(msg: &ClientMsg, rate_limiter: &ConnectionRateLimiter) -> bool {
    match msg {
        ClientMsg::Join { .. } => true,
        _ => rate_limiter.check_input(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ClientMsg {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn join_is_admitted_after_quota_is_spent() {
        let limiter = ConnectionRateLimiter::new(1);
        let join = parse(r#"{"type":"join","room":"r1","nickname":"alice"}"#);
        let step = parse(
            r#"{"type":"move","room":"r1","playerId":"p1","x":1,"y":1,"facingRight":true}"#,
        );

        assert!(admit(&step, &limiter));
        assert!(!admit(&step, &limiter));

        assert!(admit(&join, &limiter));
        assert!(admit(&join, &limiter));
        assert!(!admit(&step, &limiter));
    }
}
