//! Client registry implementation
//!
//! The central registry that tracks connected clients and the
//! topic-to-subscription index, and fans published messages out to
//! every matching subscriber.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::protocol::Frame;

use super::client::{ClientHandle, ClientId};

/// Per-subscriber delivery predicate for checked fan-out
pub type DeliveryCheck = dyn Fn(&ClientHandle) -> bool + Send + Sync;

/// Registry of connected clients and their subscriptions
///
/// Two locks guard the state: the client table and the subscription
/// index. Acquisition order is always client table first, then
/// subscription index; both are held across fan-out writes so a
/// client can never be removed between index lookup and socket write,
/// and so one publisher's messages reach each subscriber in publish
/// order.
pub struct ClientRegistry {
    /// Connected clients by id
    clients: Mutex<HashMap<ClientId, Arc<ClientHandle>>>,

    /// Topic to client to subscription ids
    subscriptions: Mutex<HashMap<String, HashMap<ClientId, HashSet<String>>>>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a client into the client table
    pub async fn add_client(&self, client: Arc<ClientHandle>) {
        let id = client.id();
        self.clients.lock().await.insert(id, client);
        tracing::debug!(client = %id, "client added");
    }

    /// Remove a client and sweep its subscriptions from every topic
    pub async fn remove_client(&self, id: ClientId) {
        let mut clients = self.clients.lock().await;
        let mut subscriptions = self.subscriptions.lock().await;

        clients.remove(&id);
        for bucket in subscriptions.values_mut() {
            bucket.remove(&id);
        }

        tracing::debug!(client = %id, "client removed");
    }

    /// Whether a client is currently in the client table
    pub async fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    /// Number of clients in the client table
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Register a subscription from a SUBSCRIBE frame
    ///
    /// Requires the `destination` and `id` headers; returns false
    /// without touching the index when either is missing. Re-using a
    /// (client, id) pair on the same topic overwrites silently.
    pub async fn add_subscription(&self, client: &ClientHandle, frame: &Frame) -> bool {
        let Some(topic) = frame.header("destination") else {
            return false;
        };
        let Some(sub_id) = frame.header("id") else {
            return false;
        };

        let _clients = self.clients.lock().await;
        let mut subscriptions = self.subscriptions.lock().await;

        subscriptions
            .entry(topic.to_string())
            .or_default()
            .entry(client.id())
            .or_default()
            .insert(sub_id.to_string());

        tracing::info!(client = %client.id(), topic, sub_id, "subscribed");
        true
    }

    /// Drop a subscription from an UNSUBSCRIBE frame
    ///
    /// Requires the `id` header; returns false when it is missing.
    /// When the frame carries `destination` only that topic bucket is
    /// touched; without it every bucket is swept, which keeps clients
    /// that omit the header on UNSUBSCRIBE working.
    pub async fn remove_subscription(&self, id: ClientId, frame: &Frame) -> bool {
        let Some(sub_id) = frame.header("id") else {
            return false;
        };

        let _clients = self.clients.lock().await;
        let mut subscriptions = self.subscriptions.lock().await;

        match frame.header("destination") {
            Some(topic) => {
                if let Some(bucket) = subscriptions.get_mut(topic) {
                    Self::drop_sub(bucket, id, sub_id);
                }
            }
            None => {
                for bucket in subscriptions.values_mut() {
                    Self::drop_sub(bucket, id, sub_id);
                }
            }
        }

        tracing::info!(client = %id, sub_id, "unsubscribed");
        true
    }

    fn drop_sub(bucket: &mut HashMap<ClientId, HashSet<String>>, id: ClientId, sub_id: &str) {
        if let Some(subs) = bucket.get_mut(&id) {
            subs.remove(sub_id);
            if subs.is_empty() {
                bucket.remove(&id);
            }
        }
    }

    /// Visit every active subscription on a topic
    ///
    /// The visitor runs under both registry locks; keep it cheap.
    pub async fn for_topic<F>(&self, topic: &str, mut visit: F)
    where
        F: FnMut(&Arc<ClientHandle>, &str),
    {
        let clients = self.clients.lock().await;
        let subscriptions = self.subscriptions.lock().await;

        let Some(bucket) = subscriptions.get(topic) else {
            return;
        };

        for (client_id, sub_ids) in bucket {
            let Some(client) = clients.get(client_id) else {
                continue;
            };
            for sub_id in sub_ids {
                visit(client, sub_id);
            }
        }
    }

    /// Number of active subscriptions on a topic
    pub async fn subscription_count(&self, topic: &str) -> usize {
        self.subscriptions
            .lock()
            .await
            .get(topic)
            .map(|bucket| bucket.values().map(HashSet::len).sum())
            .unwrap_or(0)
    }

    /// Fan a message out to every subscription on a topic
    ///
    /// One MESSAGE frame is built per subscription, carrying the
    /// subscription id so the client can demultiplex. A failing write
    /// is logged and does not stop delivery to the remaining
    /// subscribers. Returns the number of frames written successfully.
    ///
    /// Both registry locks are held for the duration of the fan-out,
    /// including the socket writes: a slow subscriber stalls other
    /// publishers, which is the accepted cost of the ordering and
    /// no-use-after-remove guarantees.
    pub async fn publish(
        &self,
        topic: &str,
        content_type: &str,
        body: Bytes,
        check: Option<&DeliveryCheck>,
    ) -> usize {
        let clients = self.clients.lock().await;
        let subscriptions = self.subscriptions.lock().await;

        let Some(bucket) = subscriptions.get(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for (client_id, sub_ids) in bucket {
            let Some(client) = clients.get(client_id) else {
                continue;
            };

            if let Some(check) = check {
                if !check(client) {
                    continue;
                }
            }

            for sub_id in sub_ids {
                let frame = Frame::message(topic, content_type, sub_id.clone(), body.clone());
                match client.send_frame(&frame).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        tracing::warn!(client = %client_id, topic, error = %e, "unable to write message");
                    }
                }
            }
        }

        delivered
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Command;
    use crate::registry::client::testing::mock_client;

    fn subscribe_frame(topic: &str, sub_id: &str) -> Frame {
        Frame::new(Command::Subscribe)
            .with_header("destination", topic)
            .with_header("id", sub_id)
    }

    fn unsubscribe_frame(sub_id: &str) -> Frame {
        Frame::new(Command::Unsubscribe).with_header("id", sub_id)
    }

    #[tokio::test]
    async fn test_add_remove_client() {
        let registry = ClientRegistry::new();
        let (client, _sink) = mock_client(1);
        let id = client.id();

        registry.add_client(client).await;
        assert!(registry.contains(id).await);
        assert_eq!(registry.client_count().await, 1);

        registry.remove_client(id).await;
        assert!(!registry.contains(id).await);
        assert_eq!(registry.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_subscription_requires_headers() {
        let registry = ClientRegistry::new();
        let (client, _sink) = mock_client(1);
        registry.add_client(client.clone()).await;

        let no_destination = Frame::new(Command::Subscribe).with_header("id", "s1");
        let no_id = Frame::new(Command::Subscribe).with_header("destination", "/topic/x");

        assert!(!registry.add_subscription(&client, &no_destination).await);
        assert!(!registry.add_subscription(&client, &no_id).await);
        assert_eq!(registry.subscription_count("/topic/x").await, 0);
    }

    #[tokio::test]
    async fn test_add_subscription_is_idempotent() {
        let registry = ClientRegistry::new();
        let (client, _sink) = mock_client(1);
        registry.add_client(client.clone()).await;

        let frame = subscribe_frame("/topic/x", "s1");
        assert!(registry.add_subscription(&client, &frame).await);
        assert!(registry.add_subscription(&client, &frame).await);

        assert_eq!(registry.subscription_count("/topic/x").await, 1);
    }

    #[tokio::test]
    async fn test_remove_client_sweeps_subscriptions() {
        let registry = ClientRegistry::new();
        let (client, _sink) = mock_client(1);
        let id = client.id();
        registry.add_client(client.clone()).await;

        registry
            .add_subscription(&client, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry
            .add_subscription(&client, &subscribe_frame("/topic/y", "s2"))
            .await;

        registry.remove_client(id).await;

        assert_eq!(registry.subscription_count("/topic/x").await, 0);
        assert_eq!(registry.subscription_count("/topic/y").await, 0);
    }

    #[tokio::test]
    async fn test_remove_subscription_requires_id() {
        let registry = ClientRegistry::new();
        let (client, _sink) = mock_client(1);
        registry.add_client(client.clone()).await;
        registry
            .add_subscription(&client, &subscribe_frame("/topic/x", "s1"))
            .await;

        let missing_id = Frame::new(Command::Unsubscribe).with_header("destination", "/topic/x");
        assert!(!registry.remove_subscription(client.id(), &missing_id).await);
        assert_eq!(registry.subscription_count("/topic/x").await, 1);
    }

    #[tokio::test]
    async fn test_remove_subscription_scoped_to_destination() {
        let registry = ClientRegistry::new();
        let (client, _sink) = mock_client(1);
        registry.add_client(client.clone()).await;
        registry
            .add_subscription(&client, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry
            .add_subscription(&client, &subscribe_frame("/topic/y", "s1"))
            .await;

        let frame = unsubscribe_frame("s1").with_header("destination", "/topic/x");
        assert!(registry.remove_subscription(client.id(), &frame).await);

        assert_eq!(registry.subscription_count("/topic/x").await, 0);
        // The other topic's subscription with the same id survives.
        assert_eq!(registry.subscription_count("/topic/y").await, 1);
    }

    #[tokio::test]
    async fn test_remove_subscription_sweeps_without_destination() {
        let registry = ClientRegistry::new();
        let (client, _sink) = mock_client(1);
        registry.add_client(client.clone()).await;
        registry
            .add_subscription(&client, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry
            .add_subscription(&client, &subscribe_frame("/topic/y", "s1"))
            .await;

        assert!(
            registry
                .remove_subscription(client.id(), &unsubscribe_frame("s1"))
                .await
        );

        assert_eq!(registry.subscription_count("/topic/x").await, 0);
        assert_eq!(registry.subscription_count("/topic/y").await, 0);
    }

    #[tokio::test]
    async fn test_publish_covers_every_subscription() {
        let registry = ClientRegistry::new();
        let (a, sink_a) = mock_client(1);
        let (b, sink_b) = mock_client(2);
        registry.add_client(a.clone()).await;
        registry.add_client(b.clone()).await;
        registry
            .add_subscription(&a, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry
            .add_subscription(&b, &subscribe_frame("/topic/x", "s2"))
            .await;

        let delivered = registry
            .publish(
                "/topic/x",
                "application/json",
                Bytes::from_static(b"[1,2]"),
                None,
            )
            .await;

        assert_eq!(delivered, 2);

        let frames_a = sink_a.frames();
        assert_eq!(frames_a.len(), 1);
        assert_eq!(frames_a[0].command, Command::Message);
        assert_eq!(frames_a[0].header("subscription"), Some("s1"));
        assert_eq!(frames_a[0].header("destination"), Some("/topic/x"));
        assert_eq!(frames_a[0].header("content-type"), Some("application/json"));
        assert_eq!(frames_a[0].header("content-length"), Some("5"));
        assert_eq!(&frames_a[0].body[..], b"[1,2]");

        assert_eq!(sink_b.frames()[0].header("subscription"), Some("s2"));
    }

    #[tokio::test]
    async fn test_publish_unknown_topic_is_a_no_op() {
        let registry = ClientRegistry::new();

        let delivered = registry
            .publish("/topic/ghost", "text/plain", Bytes::from_static(b"hi"), None)
            .await;

        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_publish_skips_on_predicate() {
        let registry = ClientRegistry::new();
        let (a, sink_a) = mock_client(1);
        let (b, sink_b) = mock_client(2);
        registry.add_client(a.clone()).await;
        registry.add_client(b.clone()).await;
        registry
            .add_subscription(&a, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry
            .add_subscription(&b, &subscribe_frame("/topic/x", "s2"))
            .await;

        let only_a = a.id();
        let check = move |client: &ClientHandle| client.id() == only_a;
        let delivered = registry
            .publish("/topic/x", "text/plain", Bytes::from_static(b"hi"), Some(&check))
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(sink_a.frames().len(), 1);
        assert!(sink_b.frames().is_empty());
    }

    #[tokio::test]
    async fn test_publish_continues_past_failing_writer() {
        let registry = ClientRegistry::new();
        let (a, sink_a) = mock_client(1);
        let (b, sink_b) = mock_client(2);
        sink_a.fail_writes();
        registry.add_client(a.clone()).await;
        registry.add_client(b.clone()).await;
        registry
            .add_subscription(&a, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry
            .add_subscription(&b, &subscribe_frame("/topic/x", "s2"))
            .await;

        let delivered = registry
            .publish("/topic/x", "text/plain", Bytes::from_static(b"hi"), None)
            .await;

        assert_eq!(delivered, 1);
        assert!(sink_a.frames().is_empty());
        assert_eq!(sink_b.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_after_client_removed_delivers_nothing() {
        let registry = ClientRegistry::new();
        let (a, sink_a) = mock_client(1);
        registry.add_client(a.clone()).await;
        registry
            .add_subscription(&a, &subscribe_frame("/topic/x", "s1"))
            .await;

        registry.remove_client(a.id()).await;

        let delivered = registry
            .publish("/topic/x", "text/plain", Bytes::from_static(b"hi"), None)
            .await;

        assert_eq!(delivered, 0);
        assert!(sink_a.frames().is_empty());
    }

    #[tokio::test]
    async fn test_for_topic_visits_each_subscription_once() {
        let registry = ClientRegistry::new();
        let (a, _sink) = mock_client(1);
        registry.add_client(a.clone()).await;
        registry
            .add_subscription(&a, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry
            .add_subscription(&a, &subscribe_frame("/topic/x", "s2"))
            .await;

        let mut seen = Vec::new();
        registry
            .for_topic("/topic/x", |client, sub_id| {
                seen.push((client.id(), sub_id.to_string()));
            })
            .await;

        seen.sort();
        assert_eq!(
            seen,
            vec![(a.id(), "s1".to_string()), (a.id(), "s2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_subscriptions_always_reference_live_clients() {
        // Interleave adds and removes and verify no subscription ever
        // points at a client missing from the client table.
        let registry = ClientRegistry::new();
        let (a, _sa) = mock_client(1);
        let (b, _sb) = mock_client(2);
        registry.add_client(a.clone()).await;
        registry.add_client(b.clone()).await;

        registry
            .add_subscription(&a, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry
            .add_subscription(&b, &subscribe_frame("/topic/x", "s1"))
            .await;
        registry.remove_client(a.id()).await;
        registry
            .add_subscription(&b, &subscribe_frame("/topic/y", "s2"))
            .await;

        let mut visited = Vec::new();
        registry
            .for_topic("/topic/x", |client, _| visited.push(client.id()))
            .await;
        registry
            .for_topic("/topic/y", |client, _| visited.push(client.id()))
            .await;

        assert!(!visited.is_empty());
        for id in visited {
            assert!(registry.contains(id).await);
        }
    }
}
