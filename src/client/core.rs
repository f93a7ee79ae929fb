//! Stream client factory.
//!
//! A [`StreamClient`] holds a validated endpoint, a reconnect policy and a
//! connector. Each call to [`StreamClient::connect`] spawns an independent
//! connection with its own retry budget.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::protocol::InboundEvent;
use crate::transport::{ConnectionHandle, Connector, ReconnectPolicy, StateChange};

use super::builder::ClientBuilder;

// ============================================================================
// StreamClient
// ============================================================================

/// Configured entry point for opening bingo room connections.
///
/// Cheap to clone; clones share the connector.
#[derive(Clone)]
pub struct StreamClient {
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    /// Creates a client from validated parts.
    pub(crate) fn new(
        endpoint: Endpoint,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            endpoint,
            policy,
            connector,
        }
    }

    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the endpoint connections are opened to.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the reconnect policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Opens a connection with both handlers registered up front.
    ///
    /// Returns immediately; see [`crate::transport::connect`] for the
    /// delivery contract. Must be called from within a tokio runtime.
    pub fn connect<E, S>(&self, on_event: E, on_state: S) -> ConnectionHandle
    where
        E: Fn(InboundEvent) + Send + Sync + 'static,
        S: Fn(StateChange) + Send + Sync + 'static,
    {
        debug!(endpoint = %self.endpoint, "Opening stream connection");
        ConnectionHandle::spawn(
            self.endpoint.clone(),
            self.policy,
            Arc::clone(&self.connector),
            Some(Box::new(on_event)),
            Some(Box::new(on_state)),
        )
    }

    /// Opens a connection without handlers.
    ///
    /// Register them with [`ConnectionHandle::set_event_handler`] and
    /// [`ConnectionHandle::set_state_handler`]; messages arriving before
    /// then are dropped.
    pub fn connect_detached(&self) -> ConnectionHandle {
        debug!(endpoint = %self.endpoint, "Opening stream connection");
        ConnectionHandle::spawn(
            self.endpoint.clone(),
            self.policy,
            Arc::clone(&self.connector),
            None,
            None,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::endpoint::Channel;

    fn client() -> StreamClient {
        // Port 1 is never served on loopback, so every attempt is refused.
        StreamClient::builder()
            .room("127.0.0.1:1", false, Channel::Game, "room1")
            .max_retries(0)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .expect("build")
    }

    #[test]
    fn test_builder_shortcut() {
        let client = client();
        assert_eq!(
            client.endpoint().as_str(),
            "ws://127.0.0.1:1/ws/bingo/game/room1/"
        );
        assert_eq!(client.policy().max_retries, 0);
    }

    #[test]
    fn test_debug_hides_connector() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("StreamClient"));
        assert!(debug.contains("endpoint"));
    }

    #[tokio::test]
    async fn test_connect_detached_without_budget_stops() {
        let handle = client().connect_detached();
        timeout(Duration::from_secs(5), handle.stopped())
            .await
            .expect("worker stopped");
        assert!(handle.is_exhausted());
        assert!(!handle.state().is_open());
    }

    #[tokio::test]
    async fn test_each_connect_is_independent() {
        let client = client();
        let first = client.connect(|_| {}, |_| {});
        let second = client.connect_detached();
        first.close();

        timeout(Duration::from_secs(5), second.stopped())
            .await
            .expect("worker stopped");
        assert!(second.is_exhausted());
    }
}
