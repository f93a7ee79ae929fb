//! Connection state and lifecycle notifications.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Observable state of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// The transport is open; actions can be sent.
    Open,
    /// No transport. A retry may be scheduled unless the handle was closed
    /// or the retry budget is spent.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if actions can be sent.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

// ============================================================================
// CloseReason
// ============================================================================

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The caller invoked `close()`.
    Requested,
    /// The server sent a close frame.
    Remote {
        /// Close code, if the frame carried one.
        code: Option<u16>,
        /// Close reason text.
        reason: String,
    },
    /// The transport failed or ended without a close frame.
    Transport(String),
    /// The connection attempt itself failed.
    ConnectFailed(String),
}

impl CloseReason {
    /// Returns `true` unless the close was caller-initiated.
    #[inline]
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        !matches!(self, Self::Requested)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("closed by caller"),
            Self::Remote { code: Some(code), reason } => {
                write!(f, "closed by server ({code}): {reason}")
            }
            Self::Remote { code: None, reason } => write!(f, "closed by server: {reason}"),
            Self::Transport(message) => write!(f, "transport lost: {message}"),
            Self::ConnectFailed(message) => write!(f, "connect failed: {message}"),
        }
    }
}

// ============================================================================
// StateChange
// ============================================================================

/// Notification delivered to the state handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// The transport opened. The retry counter has been reset.
    Open,
    /// The transport closed or a connection attempt failed.
    Closed {
        /// What caused the close.
        reason: CloseReason,
        /// Whether a reconnect has been scheduled.
        will_retry: bool,
    },
    /// The retry budget is spent; the handle stays closed for good.
    RetriesExhausted {
        /// Consecutive reconnect attempts made before giving up.
        attempts: u32,
    },
}

impl StateChange {
    /// Returns the connection state this notification leaves behind.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match self {
            Self::Open => ConnectionState::Open,
            Self::Closed { .. } | Self::RetriesExhausted { .. } => ConnectionState::Closed,
        }
    }

    /// Returns `true` for the terminal exhaustion notice.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    #[test]
    fn test_close_reason_display() {
        let reason = CloseReason::Remote {
            code: Some(1011),
            reason: "restart".into(),
        };
        assert_eq!(reason.to_string(), "closed by server (1011): restart");
        assert!(reason.is_unexpected());
        assert!(!CloseReason::Requested.is_unexpected());
    }

    #[test]
    fn test_state_change_state() {
        assert_eq!(StateChange::Open.state(), ConnectionState::Open);
        let exhausted = StateChange::RetriesExhausted { attempts: 5 };
        assert_eq!(exhausted.state(), ConnectionState::Closed);
        assert!(exhausted.is_terminal());
    }
}
