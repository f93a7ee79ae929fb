//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`StreamClient`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use bingo_stream::{Channel, StreamClient};
//!
//! # fn example() -> bingo_stream::Result<()> {
//! let client = StreamClient::builder()
//!     .page("https://bingo.example/play/", Channel::Game, "room42")
//!     .max_retries(5)
//!     .retry_delay(Duration::from_secs(3))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::{Channel, Endpoint};
use crate::error::{Error, Result};
use crate::transport::{Connector, ReconnectPolicy, WsConnector};

use super::core::StreamClient;

// ============================================================================
// EndpointSource
// ============================================================================

/// Where the builder takes its endpoint from.
#[derive(Debug, Clone)]
enum EndpointSource {
    Ready(Endpoint),
    Url(String),
    Page {
        page_url: String,
        channel: Channel,
        room: String,
    },
    Room {
        host: String,
        secure: bool,
        channel: Channel,
        room: String,
    },
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`StreamClient`] instance.
///
/// Use [`StreamClient::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct ClientBuilder {
    /// Endpoint input, resolved in `build`.
    endpoint: Option<EndpointSource>,
    /// Reconnect policy.
    policy: ReconnectPolicy,
    /// Transport override.
    connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with the default reconnect policy.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an already validated endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(EndpointSource::Ready(endpoint));
        self
    }

    /// Uses an explicit `ws://` or `wss://` URL.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(EndpointSource::Url(url.into()));
        self
    }

    /// Derives the endpoint from the URL of the page hosting the client.
    ///
    /// # Arguments
    ///
    /// * `page_url` - Page URL; `https` selects `wss`
    /// * `channel` - Room socket to attach to
    /// * `room` - Room name
    #[inline]
    #[must_use]
    pub fn page(
        mut self,
        page_url: impl Into<String>,
        channel: Channel,
        room: impl Into<String>,
    ) -> Self {
        self.endpoint = Some(EndpointSource::Page {
            page_url: page_url.into(),
            channel,
            room: room.into(),
        });
        self
    }

    /// Builds the endpoint from a host, scheme flag, channel and room.
    #[inline]
    #[must_use]
    pub fn room(
        mut self,
        host: impl Into<String>,
        secure: bool,
        channel: Channel,
        room: impl Into<String>,
    ) -> Self {
        self.endpoint = Some(EndpointSource::Room {
            host: host.into(),
            secure,
            channel,
            room: room.into(),
        });
        self
    }

    /// Replaces the whole reconnect policy.
    #[inline]
    #[must_use]
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the number of consecutive reconnect attempts.
    #[inline]
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Sets the fixed delay before each reconnect attempt.
    #[inline]
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.policy.retry_delay = delay;
        self
    }

    /// Sets the per-attempt connection timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.policy.connect_timeout = timeout;
        self
    }

    /// Replaces the tokio-tungstenite connector.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no endpoint was set or the policy is invalid
    /// - [`Error::InvalidEndpoint`] or [`Error::Url`] if the endpoint is invalid
    pub fn build(self) -> Result<StreamClient> {
        let endpoint = self.resolve_endpoint()?;
        self.policy.validate()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector) as Arc<dyn Connector>);

        Ok(StreamClient::new(endpoint, self.policy, connector))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Resolves the configured endpoint input.
    fn resolve_endpoint(&self) -> Result<Endpoint> {
        let source = self.endpoint.as_ref().ok_or_else(|| {
            Error::config(
                "An endpoint is required. Use .page(), .room(), .url() or .endpoint().\n\
                 Example: StreamClient::builder().room(\"127.0.0.1:8000\", false, Channel::Game, \"room1\")",
            )
        })?;

        match source {
            EndpointSource::Ready(endpoint) => Ok(endpoint.clone()),
            EndpointSource::Url(url) => Endpoint::parse(url),
            EndpointSource::Page {
                page_url,
                channel,
                room,
            } => Endpoint::from_page(page_url, *channel, room),
            EndpointSource::Room {
                host,
                secure,
                channel,
                room,
            } => Endpoint::for_room(host, *secure, *channel, room),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
