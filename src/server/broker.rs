//! The relay broker
//!
//! Owns the client registry, the handler pipeline and the lifecycle.
//! A broker is built in a configuring state, takes handler
//! registrations, and is frozen by a one-shot [`Broker::setup`];
//! after that it serves WebSocket sessions and accepts ingress
//! publishes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;

use crate::error::{RelayError, Result};
use crate::registry::{ClientId, ClientRegistry, DeliveryCheck};

use super::config::ServerConfig;
use super::handler::{
    ConnectHandler, Decision, DisconnectHandler, HandlerSet, MessageHandler, SubscribeHandler,
    UnsubscribeHandler,
};
use super::ws;

/// STOMP-over-WebSocket relay broker
pub struct Broker {
    config: ServerConfig,
    registry: ClientRegistry,
    handlers: RwLock<HandlerSet>,
    running: AtomicBool,
    next_client_id: AtomicU64,
}

impl Broker {
    /// Create a broker in the configuring state
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: ClientRegistry::new(),
            handlers: RwLock::new(HandlerSet::default()),
            running: AtomicBool::new(false),
            next_client_id: AtomicU64::new(1),
        }
    }

    /// The broker's configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The client registry
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Whether setup has run
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Freeze configuration and start accepting sessions
    ///
    /// One-shot: a second call warns and changes nothing. Handler
    /// registration is refused from this point on.
    pub fn setup(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("broker setup called twice");
            return;
        }

        tracing::info!(
            addr = %self.config.bind_addr,
            compression = self.config.compression,
            "broker set up"
        );
    }

    fn ensure_configuring(&self, kind: &'static str) -> Result<()> {
        if self.is_running() {
            return Err(RelayError::HandlerRegistration { kind });
        }
        Ok(())
    }

    /// Register a connect handler
    pub fn add_connect_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&crate::registry::ClientHandle, &axum::http::HeaderMap, &crate::protocol::Frame) -> Decision
            + Send
            + Sync
            + 'static,
    {
        self.ensure_configuring("connect")?;
        self.handlers
            .write()
            .unwrap()
            .connect
            .push(Arc::new(handler) as ConnectHandler);
        Ok(())
    }

    /// Register a disconnect handler
    pub fn add_disconnect_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&crate::registry::ClientHandle) + Send + Sync + 'static,
    {
        self.ensure_configuring("disconnect")?;
        self.handlers
            .write()
            .unwrap()
            .disconnect
            .push(Arc::new(handler) as DisconnectHandler);
        Ok(())
    }

    /// Register a subscribe handler
    pub fn add_subscribe_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&crate::registry::ClientHandle, &str) -> Decision + Send + Sync + 'static,
    {
        self.ensure_configuring("subscribe")?;
        self.handlers
            .write()
            .unwrap()
            .subscribe
            .push(Arc::new(handler) as SubscribeHandler);
        Ok(())
    }

    /// Register an unsubscribe handler
    pub fn add_unsubscribe_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&crate::registry::ClientHandle, &str) + Send + Sync + 'static,
    {
        self.ensure_configuring("unsubscribe")?;
        self.handlers
            .write()
            .unwrap()
            .unsubscribe
            .push(Arc::new(handler) as UnsubscribeHandler);
        Ok(())
    }

    /// Register a message handler
    pub fn add_message_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&crate::registry::ClientHandle, &str, &crate::protocol::Frame) + Send + Sync + 'static,
    {
        self.ensure_configuring("message")?;
        self.handlers
            .write()
            .unwrap()
            .message
            .push(Arc::new(handler) as MessageHandler);
        Ok(())
    }

    /// Snapshot the handler lists for dispatch
    pub(crate) fn handlers(&self) -> HandlerSet {
        self.handlers.read().unwrap().clone()
    }

    /// Allocate the next client id
    ///
    /// Ids are strictly increasing and never reused for the lifetime
    /// of the process.
    pub(crate) fn allocate_client_id(&self) -> ClientId {
        ClientId::new(self.next_client_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Fan a message out to every subscription on a topic
    ///
    /// Returns the number of MESSAGE frames written successfully.
    pub async fn send_message(
        &self,
        topic: &str,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> usize {
        self.send_message_with_check(topic, content_type, body, None)
            .await
    }

    /// Fan a message out, skipping subscribers the check refuses
    pub async fn send_message_with_check(
        &self,
        topic: &str,
        content_type: &str,
        body: impl Into<Bytes>,
        check: Option<&DeliveryCheck>,
    ) -> usize {
        self.registry
            .publish(topic, content_type, body.into(), check)
            .await
    }

    /// Build the HTTP router serving the upgrade and health endpoints
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/wss/websocket", get(ws::stomp_ws_handler))
            .route("/health", get(ws::health))
            .with_state(self)
    }

    /// Run the server
    ///
    /// This method blocks until the process is terminated.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "relay listening");

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "relay listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
