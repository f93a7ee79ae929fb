//! Error types for the bingo event-stream client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Fallible setup operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use bingo_stream::{Channel, Endpoint, Result};
//!
//! fn example() -> Result<()> {
//!     let endpoint = Endpoint::new("bingo.example", Channel::Game, "room42")?;
//!     println!("{}", endpoint.url());
//!     Ok(())
//! }
//! ```
//!
//! Transport failures after `connect` are never returned to the caller.
//! They drive the reconnect loop and are reported through logs and
//! [`StateChange`](crate::StateChange) notifications instead.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidEndpoint`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint could not be derived from the page context.
    #[error("Invalid endpoint: {message}")]
    InvalidEndpoint {
        /// Description of what was wrong with the endpoint.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The connection task has stopped and no longer accepts commands.
    #[error("Connection closed")]
    ConnectionClosed,

    /// An action was submitted while the connection was not open.
    #[error("Not connected (state: {state})")]
    NotConnected {
        /// Connection state observed at submission time.
        state: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Payload did not have the expected shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(state: impl ToString) -> Self {
        Self::NotConnected {
            state: state.to_string(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected { .. }
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_not_connected_display() {
        let err = Error::not_connected("closed");
        assert_eq!(err.to_string(), "Not connected (state: closed)");
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::connection_timeout(5000).is_timeout());
        assert!(!Error::connection("x").is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("x").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::not_connected("closed").is_connection_error());
        assert!(!Error::config("x").is_connection_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
    }
}
