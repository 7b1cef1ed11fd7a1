//! Client identity and write dispatch
//!
//! The session owns its WebSocket; the registry only ever sees a
//! [`ClientHandle`], a non-owning handle that knows how to push an
//! encoded frame at the transport's write half.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::protocol::Frame;

/// Error produced by a sink write
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Write half of a client transport
///
/// Implemented by the WebSocket adapter; tests substitute an
/// in-memory sink.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Write one encoded frame as a WebSocket text message
    async fn send_text(&self, payload: Bytes) -> Result<(), SinkError>;

    /// Close the underlying transport. Idempotent.
    async fn close(&self);
}

/// Unique client identifier
///
/// Assigned at accept time from a per-broker counter: strictly
/// increasing, never reused for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Wrap a raw id value
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Write handle for one connected client
pub struct ClientHandle {
    id: ClientId,
    sink: Arc<dyn MessageSink>,
}

impl ClientHandle {
    /// Create a handle over a transport write half
    pub fn new(id: ClientId, sink: Arc<dyn MessageSink>) -> Self {
        Self { id, sink }
    }

    /// The client's id
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Encode and write one frame
    pub async fn send_frame(&self, frame: &Frame) -> Result<(), SinkError> {
        self.sink.send_text(frame.to_payload()).await
    }

    /// Close the transport
    pub async fn close(&self) {
        self.sink.close().await;
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sink used across the crate's unit tests

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Sink that records every payload it is asked to write
    #[derive(Default)]
    pub(crate) struct MockSink {
        payloads: Mutex<Vec<Bytes>>,
        closed: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl MockSink {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Make every subsequent write fail
        pub(crate) fn fail_writes(&self) {
            self.fail_writes.store(true, Ordering::SeqCst);
        }

        pub(crate) fn payloads(&self) -> Vec<Bytes> {
            self.payloads.lock().unwrap().clone()
        }

        /// Decode recorded payloads back into frames
        pub(crate) fn frames(&self) -> Vec<Frame> {
            self.payloads()
                .iter()
                .map(|p| crate::protocol::decode(p).unwrap().unwrap())
                .collect()
        }

        pub(crate) fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessageSink for MockSink {
        async fn send_text(&self, payload: Bytes) -> Result<(), SinkError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err("mock write failure".into());
            }
            self.payloads.lock().unwrap().push(payload);
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Build a client over a fresh mock sink
    pub(crate) fn mock_client(id: u64) -> (Arc<ClientHandle>, Arc<MockSink>) {
        let sink = MockSink::new();
        let client = Arc::new(ClientHandle::new(
            ClientId::new(id),
            sink.clone() as Arc<dyn MessageSink>,
        ));
        (client, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::mock_client;
    use super::*;

    #[test]
    fn test_client_id_display() {
        assert_eq!(ClientId::new(42).to_string(), "client-42");
    }

    #[test]
    fn test_client_id_ordering() {
        assert!(ClientId::new(1) < ClientId::new(2));
    }

    #[tokio::test]
    async fn test_send_frame_writes_encoded_payload() {
        let (client, sink) = mock_client(1);

        client.send_frame(&Frame::connected()).await.unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, crate::protocol::Command::Connected);
    }

    #[tokio::test]
    async fn test_close_marks_sink_closed() {
        let (client, sink) = mock_client(1);

        client.close().await;

        assert!(sink.is_closed());
    }
}
