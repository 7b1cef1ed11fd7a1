//! User handler pipeline
//!
//! Five ordered handler lists run at the protocol events: connect,
//! disconnect, subscribe, unsubscribe and message. Connect and
//! subscribe handlers return an admission [`Decision`] and the first
//! rejection short-circuits the rest of the list; the other three
//! always run to completion. A panicking handler never takes the
//! session down with it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::protocol::Frame;
use crate::registry::ClientHandle;

/// Admission decision returned by connect and subscribe handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the connection or subscription proceed
    Admit,
    /// Veto it
    Reject,
}

impl Decision {
    /// Whether this decision admits
    pub const fn is_admitted(self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// Runs when a CONNECT frame passes decode; receives the upgrade
/// request headers and the frame. Rejecting closes the session before
/// the client enters the registry.
pub type ConnectHandler = Arc<dyn Fn(&ClientHandle, &HeaderMap, &Frame) -> Decision + Send + Sync>;

/// Runs once per session on any exit path
pub type DisconnectHandler = Arc<dyn Fn(&ClientHandle) + Send + Sync>;

/// Runs on SUBSCRIBE with the destination; rejecting skips the
/// registration but keeps the session alive.
pub type SubscribeHandler = Arc<dyn Fn(&ClientHandle, &str) -> Decision + Send + Sync>;

/// Runs on UNSUBSCRIBE with the destination
pub type UnsubscribeHandler = Arc<dyn Fn(&ClientHandle, &str) + Send + Sync>;

/// Runs on SEND with the destination and the frame. The relay does
/// not forward SEND frames anywhere else.
pub type MessageHandler = Arc<dyn Fn(&ClientHandle, &str, &Frame) + Send + Sync>;

/// The five ordered handler lists
#[derive(Default, Clone)]
pub(crate) struct HandlerSet {
    pub(crate) connect: Vec<ConnectHandler>,
    pub(crate) disconnect: Vec<DisconnectHandler>,
    pub(crate) subscribe: Vec<SubscribeHandler>,
    pub(crate) unsubscribe: Vec<UnsubscribeHandler>,
    pub(crate) message: Vec<MessageHandler>,
}

impl HandlerSet {
    /// Run the connect list; the first rejection wins
    pub(crate) fn run_connect(
        &self,
        client: &ClientHandle,
        headers: &HeaderMap,
        frame: &Frame,
    ) -> Decision {
        for handler in &self.connect {
            match catch_unwind(AssertUnwindSafe(|| handler(client, headers, frame))) {
                Ok(Decision::Admit) => {}
                Ok(Decision::Reject) => return Decision::Reject,
                Err(_) => {
                    tracing::error!(client = %client.id(), "connect handler panicked, rejecting");
                    return Decision::Reject;
                }
            }
        }
        Decision::Admit
    }

    /// Run the subscribe list; the first rejection wins
    pub(crate) fn run_subscribe(&self, client: &ClientHandle, destination: &str) -> Decision {
        for handler in &self.subscribe {
            match catch_unwind(AssertUnwindSafe(|| handler(client, destination))) {
                Ok(Decision::Admit) => {}
                Ok(Decision::Reject) => return Decision::Reject,
                Err(_) => {
                    tracing::error!(client = %client.id(), destination, "subscribe handler panicked, rejecting");
                    return Decision::Reject;
                }
            }
        }
        Decision::Admit
    }

    /// Run the unsubscribe list to completion
    pub(crate) fn run_unsubscribe(&self, client: &ClientHandle, destination: &str) {
        for handler in &self.unsubscribe {
            if catch_unwind(AssertUnwindSafe(|| handler(client, destination))).is_err() {
                tracing::error!(client = %client.id(), destination, "unsubscribe handler panicked");
            }
        }
    }

    /// Run the message list to completion
    pub(crate) fn run_message(&self, client: &ClientHandle, destination: &str, frame: &Frame) {
        for handler in &self.message {
            if catch_unwind(AssertUnwindSafe(|| handler(client, destination, frame))).is_err() {
                tracing::error!(client = %client.id(), destination, "message handler panicked");
            }
        }
    }

    /// Run the disconnect list to completion
    pub(crate) fn run_disconnect(&self, client: &ClientHandle) {
        for handler in &self.disconnect {
            if catch_unwind(AssertUnwindSafe(|| handler(client))).is_err() {
                tracing::error!(client = %client.id(), "disconnect handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::protocol::Command;
    use crate::registry::client::testing::mock_client;

    #[test]
    fn test_connect_runs_in_order() {
        let (client, _sink) = mock_client(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut set = HandlerSet::default();

        for tag in ["first", "second"] {
            let order = order.clone();
            set.connect.push(Arc::new(move |_, _, _| {
                order.lock().unwrap().push(tag);
                Decision::Admit
            }));
        }

        let decision = set.run_connect(&client, &HeaderMap::new(), &Frame::new(Command::Connect));

        assert_eq!(decision, Decision::Admit);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_first_veto_short_circuits() {
        let (client, _sink) = mock_client(1);
        let ran_last = Arc::new(Mutex::new(false));
        let mut set = HandlerSet::default();

        set.subscribe.push(Arc::new(|_, _| Decision::Reject));
        let ran = ran_last.clone();
        set.subscribe.push(Arc::new(move |_, _| {
            *ran.lock().unwrap() = true;
            Decision::Admit
        }));

        let decision = set.run_subscribe(&client, "/topic/x");

        assert_eq!(decision, Decision::Reject);
        assert!(!*ran_last.lock().unwrap());
    }

    #[test]
    fn test_panicking_connect_handler_rejects() {
        let (client, _sink) = mock_client(1);
        let mut set = HandlerSet::default();
        set.connect.push(Arc::new(|_, _, _| panic!("boom")));

        let decision = set.run_connect(&client, &HeaderMap::new(), &Frame::new(Command::Connect));

        assert_eq!(decision, Decision::Reject);
    }

    #[test]
    fn test_panicking_message_handler_does_not_stop_the_list() {
        let (client, _sink) = mock_client(1);
        let reached = Arc::new(Mutex::new(false));
        let mut set = HandlerSet::default();

        set.message.push(Arc::new(|_, _, _| panic!("boom")));
        let flag = reached.clone();
        set.message.push(Arc::new(move |_, _, _| {
            *flag.lock().unwrap() = true;
        }));

        set.run_message(&client, "/q", &Frame::new(Command::Send));

        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn test_disconnect_runs_all_handlers() {
        let (client, _sink) = mock_client(1);
        let count = Arc::new(Mutex::new(0));
        let mut set = HandlerSet::default();

        for _ in 0..3 {
            let count = count.clone();
            set.disconnect.push(Arc::new(move |_| {
                *count.lock().unwrap() += 1;
            }));
        }

        set.run_disconnect(&client);

        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn test_decision_is_admitted() {
        assert!(Decision::Admit.is_admitted());
        assert!(!Decision::Reject.is_admitted());
    }
}
