//! Per-connection session
//!
//! One session owns one WebSocket. The transport glue feeds it text
//! payloads; the session decodes them, drives the lifecycle state
//! machine and dispatches the user handler pipeline. Keeping the
//! state machine free of socket types keeps it testable without a
//! network.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::protocol::{decode, Command, Frame};
use crate::registry::ClientHandle;

use super::broker::Broker;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Upgraded, waiting for a CONNECT frame
    AwaitingConnect,
    /// CONNECT accepted, client is in the registry
    Connected,
    /// Session is on its way out
    Closing,
    /// Teardown ran
    Closed,
}

/// Whether the read loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Close,
}

/// State for one client connection
pub(crate) struct Session {
    broker: Arc<Broker>,
    client: Arc<ClientHandle>,
    /// Headers from the HTTP upgrade request, passed to connect handlers
    upgrade_headers: HeaderMap,
    phase: SessionPhase,
}

impl Session {
    pub(crate) fn new(
        broker: Arc<Broker>,
        client: Arc<ClientHandle>,
        upgrade_headers: HeaderMap,
    ) -> Self {
        Self {
            broker,
            client,
            upgrade_headers,
            phase: SessionPhase::AwaitingConnect,
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Process one WebSocket text payload
    pub(crate) async fn on_text(&mut self, payload: &[u8]) -> Flow {
        let frame = match decode(payload) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                // Transport heartbeat; nothing happens at the STOMP layer.
                tracing::trace!(client = %self.client.id(), "heartbeat");
                return Flow::Continue;
            }
            Err(e) => {
                tracing::warn!(client = %self.client.id(), error = %e, "error parsing frame");
                self.phase = SessionPhase::Closing;
                return Flow::Close;
            }
        };

        self.on_frame(frame).await
    }

    async fn on_frame(&mut self, frame: Frame) -> Flow {
        match (self.phase, &frame.command) {
            (SessionPhase::AwaitingConnect, Command::Connect | Command::Stomp) => {
                self.on_connect(frame).await
            }
            (SessionPhase::Connected, Command::Send) => {
                let destination = frame.header("destination").unwrap_or("").to_string();
                self.broker
                    .handlers()
                    .run_message(&self.client, &destination, &frame);
                Flow::Continue
            }
            (SessionPhase::Connected, Command::Subscribe) => {
                let destination = frame.header("destination").unwrap_or("").to_string();
                if self
                    .broker
                    .handlers()
                    .run_subscribe(&self.client, &destination)
                    .is_admitted()
                {
                    self.broker
                        .registry()
                        .add_subscription(&self.client, &frame)
                        .await;
                } else {
                    tracing::info!(client = %self.client.id(), destination, "subscription rejected");
                }
                Flow::Continue
            }
            (SessionPhase::Connected, Command::Unsubscribe) => {
                let destination = frame.header("destination").unwrap_or("").to_string();
                self.broker
                    .handlers()
                    .run_unsubscribe(&self.client, &destination);
                self.broker
                    .registry()
                    .remove_subscription(self.client.id(), &frame)
                    .await;
                Flow::Continue
            }
            (SessionPhase::Connected, Command::Disconnect) => {
                tracing::debug!(client = %self.client.id(), "disconnect requested");
                self.phase = SessionPhase::Closing;
                Flow::Close
            }
            (phase, command) => {
                // ACK/NACK/BEGIN/COMMIT/ABORT are out of scope,
                // commands outside the STOMP set land here too, and
                // nothing but CONNECT means anything before CONNECT.
                tracing::debug!(client = %self.client.id(), %command, ?phase, "ignoring frame");
                Flow::Continue
            }
        }
    }

    async fn on_connect(&mut self, frame: Frame) -> Flow {
        if let Err(e) = self.client.send_frame(&Frame::connected()).await {
            tracing::warn!(client = %self.client.id(), error = %e, "unable to send CONNECTED");
            self.phase = SessionPhase::Closing;
            return Flow::Close;
        }

        let decision =
            self.broker
                .handlers()
                .run_connect(&self.client, &self.upgrade_headers, &frame);
        if !decision.is_admitted() {
            tracing::info!(client = %self.client.id(), "connect rejected");
            self.phase = SessionPhase::Closing;
            return Flow::Close;
        }

        self.broker.registry().add_client(self.client.clone()).await;
        self.phase = SessionPhase::Connected;
        tracing::info!(client = %self.client.id(), "client connected");
        Flow::Continue
    }

    /// Tear the session down: close the socket, run disconnect
    /// handlers, drop the client from the registry. Runs once; later
    /// calls are no-ops.
    pub(crate) async fn finish(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        self.phase = SessionPhase::Closed;

        self.client.close().await;
        self.broker.handlers().run_disconnect(&self.client);
        self.broker.registry().remove_client(self.client.id()).await;

        tracing::debug!(client = %self.client.id(), "session finished");
    }
}
