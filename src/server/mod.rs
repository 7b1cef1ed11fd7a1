//! Broker, sessions and the WebSocket transport
//!
//! The broker carries the registry, the handler pipeline and the
//! lifecycle; sessions drive one connection each; the transport
//! adapter turns HTTP requests into sessions.

pub mod broker;
pub mod config;
pub mod handler;
pub mod session;
pub(crate) mod ws;

pub use broker::Broker;
pub use config::{ServerConfig, STOMP_SUBPROTOCOLS};
pub use handler::{
    ConnectHandler, Decision, DisconnectHandler, MessageHandler, SubscribeHandler,
    UnsubscribeHandler,
};
pub use session::SessionPhase;
