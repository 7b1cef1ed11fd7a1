//! STOMP-over-WebSocket relay
//!
//! A one-way bridge from an external pub/sub source to WebSocket
//! clients speaking a subset of STOMP 1.2: backend processes publish
//! opaque payloads per topic, connected clients subscribe to STOMP
//! destinations, and the relay fans each publish out as one MESSAGE
//! frame per matching subscription.
//!
//! # Example
//!
//! ```no_run
//! use stomp_relay::{Broker, Decision, ServerConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> stomp_relay::Result<()> {
//! let broker = Broker::new(ServerConfig::default());
//!
//! broker.add_connect_handler(|client, _headers, _frame| {
//!     tracing::info!(client = %client.id(), "connect");
//!     Decision::Admit
//! })?;
//!
//! broker.setup();
//! let broker = Arc::new(broker);
//!
//! // An ingress adapter publishes; subscribed clients receive
//! // MESSAGE frames.
//! broker.send_message("/topic/orders", "application/json", "[1,2]").await;
//!
//! broker.run().await
//! # }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use error::{RelayError, Result};
pub use protocol::{Command, Frame, ParseError};
pub use registry::{ClientHandle, ClientId, ClientRegistry, DeliveryCheck, MessageSink, SinkError};
pub use server::{Broker, Decision, ServerConfig, SessionPhase, STOMP_SUBPROTOCOLS};
