//! Client registry for pub/sub routing
//!
//! The registry tracks connected clients and routes published
//! messages to every matching subscription.
//!
//! # Architecture
//!
//! ```text
//!                        ClientRegistry
//!                ┌────────────────────────────┐
//!                │ clients:                   │
//!                │   ClientId -> ClientHandle │
//!                │ subscriptions:             │
//!                │   topic -> ClientId        │
//!                │         -> {sub ids}       │
//!                └──────────────┬─────────────┘
//!                               │
//!            ┌──────────────────┼──────────────────┐
//!            │                  │                  │
//!            ▼                  ▼                  ▼
//!       [Session]          [Session]          [Ingress]
//!       SUBSCRIBE /        DISCONNECT         publish()
//!       UNSUBSCRIBE        remove_client()        │
//!            │                  │                 ▼
//!            └──► mutate index  └──► sweep   MESSAGE frame
//!                                            per subscription
//! ```
//!
//! # Locking
//!
//! Two `tokio::sync::Mutex`es: the client table and the subscription
//! index, always acquired in that order. Fan-out holds both across
//! its socket writes, which serializes publishes globally and keeps
//! removal from racing delivery.

pub mod client;
pub mod store;

pub use client::{ClientHandle, ClientId, MessageSink, SinkError};
pub use store::{ClientRegistry, DeliveryCheck};
