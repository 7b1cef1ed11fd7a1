//! WebSocket transport adapter
//!
//! Upgrades HTTP requests on `/wss/websocket`, negotiates the STOMP
//! subprotocols, and pumps the socket into a [`Session`]. Origins are
//! not checked; deployment is expected behind a trusted gateway.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use crate::registry::{ClientHandle, MessageSink, SinkError};

use super::broker::Broker;
use super::config::STOMP_SUBPROTOCOLS;
use super::session::{Flow, Session};

/// Health probe: 200 with a bare `ok`
pub(crate) async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
pub(crate) async fn stomp_ws_handler(
    ws: WebSocketUpgrade,
    State(broker): State<Arc<Broker>>,
    headers: HeaderMap,
) -> Response {
    if !broker.is_running() {
        tracing::error!("upgrade refused: broker is not set up");
        return (StatusCode::SERVICE_UNAVAILABLE, "broker is not set up").into_response();
    }

    let config = broker.config();
    let read_buffer_size = config.read_buffer_size;
    let write_buffer_size = config.write_buffer_size;
    let max_message_size = config.max_message_size;

    ws.protocols(STOMP_SUBPROTOCOLS)
        .read_buffer_size(read_buffer_size)
        .write_buffer_size(write_buffer_size)
        .max_message_size(max_message_size)
        .on_failed_upgrade(|e| {
            tracing::warn!(error = %e, "failed to upgrade");
        })
        .on_upgrade(move |socket| run_session(socket, headers, broker))
        .into_response()
}

/// Drive one connection until it closes
async fn run_session(socket: WebSocket, headers: HeaderMap, broker: Arc<Broker>) {
    let (sink, mut stream) = socket.split();
    let id = broker.allocate_client_id();
    let client = Arc::new(ClientHandle::new(id, Arc::new(WsSink::new(sink))));

    tracing::info!(client = %id, "new websocket session");
    let mut session = Session::new(broker, client, headers);

    while let Some(next) = stream.next().await {
        let message = match next {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(client = %id, error = %e, "failed to read");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                if session.on_text(text.as_bytes()).await == Flow::Close {
                    break;
                }
            }
            Message::Close(_) => break,
            // Binary, ping and pong frames carry nothing at the STOMP
            // layer.
            _ => {}
        }
    }

    session.finish().await;
}

/// Write half of one WebSocket, shared with the registry for fan-out
struct WsSink {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Mutex::new(sink) }
    }
}

#[async_trait]
impl MessageSink for WsSink {
    async fn send_text(&self, payload: Bytes) -> Result<(), SinkError> {
        let text = String::from_utf8(payload.to_vec())
            .map_err(|_| "frame payload is not valid utf-8")?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(Into::into)
    }

    async fn close(&self) {
        let _ = self.sink.lock().await.send(Message::Close(None)).await;
    }
}
