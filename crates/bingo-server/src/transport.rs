//! HTTP and WebSocket transport.
//!
//! `GET /ws` upgrades to the game protocol, `GET /health` and `GET /stats` are
//! for operators. Each socket gets a writer task draining its outbound queue,
//! while the accepting task reads frames and hands them to the driver one at a
//! time, so a connection's frames are processed in arrival order.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::{Outbound, ServerEvent, ServerStats, SharedState, execute_actions};

/// Routes served by the runtime.
pub(crate) fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn stats(State(state): State<Arc<SharedState>>) -> Json<ServerStats> {
    Json(state.driver.lock().await.stats())
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<SharedState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive a single WebSocket connection until either side closes it.
async fn handle_socket(socket: WebSocket, state: Arc<SharedState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(state.outbound_buffer);

    let connection_id = {
        let mut driver = state.driver.lock().await;
        let (connection_id, actions) = driver.open_connection();
        state.outbound.write().await.insert(connection_id, tx);
        execute_actions(&driver, actions, &state.outbound).await;
        connection_id
    };

    tracing::debug!(%connection_id, "websocket connected");

    let mut writer = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Text(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                },
                Outbound::Close(reason) => {
                    let frame = CloseFrame { code: close_code::POLICY, reason: reason.into() };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                },
            }
        }
    });

    let reason = loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let mut driver = state.driver.lock().await;
                    let event = ServerEvent::FrameReceived {
                        connection_id,
                        text: text.as_str().to_owned(),
                    };
                    match driver.process_event(event) {
                        Ok(actions) => execute_actions(&driver, actions, &state.outbound).await,
                        Err(e) => tracing::warn!(%connection_id, "frame processing error: {e}"),
                    }
                },
                Some(Ok(Message::Binary(_))) => {
                    tracing::debug!(%connection_id, "ignoring binary frame");
                },
                Some(Ok(Message::Close(_))) | None => break "closed by peer".to_string(),
                // Ping/pong are answered by axum
                Some(Ok(_)) => {},
                Some(Err(e)) => break format!("read error: {e}"),
            },
            _ = &mut writer => break "closed by server".to_string(),
        }
    };

    state.outbound.write().await.remove(&connection_id);
    writer.abort();

    let mut driver = state.driver.lock().await;
    match driver.process_event(ServerEvent::ConnectionClosed { connection_id, reason }) {
        Ok(actions) => execute_actions(&driver, actions, &state.outbound).await,
        Err(e) => tracing::warn!(%connection_id, "close processing error: {e}"),
    }
}
