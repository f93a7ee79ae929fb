//! WebSocket transport layer.
//!
//! This module keeps one logical connection to a bingo room socket alive
//! and exposes a stable send/receive surface across reconnects.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Application     │                              │  Bingo server   │
//! │                  │         WebSocket            │                 │
//! │ ConnectionHandle │◄────────────────────────────►│  /ws/bingo/...  │
//! │  → Worker task   │   reconnect: 5 × 3000 ms     │                 │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `connect` - Spawn the worker; state is `Connecting`
//! 2. Transport opens - state `Open`, retry counter reset
//! 3. Unexpected close - state `Closed`, reconnect after the fixed delay
//! 4. Budget spent - `RetriesExhausted`, the worker stops
//! 5. `ConnectionHandle::close` - Cancel everything, no reconnect
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection handle and event loop |
//! | `connector` | Transport seam and tokio-tungstenite implementation |
//! | `policy` | Reconnect policy |
//! | `state` | Connection state and notifications |

// ============================================================================
// Submodules
// ============================================================================

/// Connection handle and event loop.
pub mod connection;

/// Transport seam and WebSocket implementation.
pub mod connector;

/// Reconnect policy.
pub mod policy;

/// Connection state and lifecycle notifications.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ConnectionHandle, EventHandler, StateHandler, connect};
pub use connector::{Connector, Frame, Transport, WsConnector, WsTransport};
pub use policy::ReconnectPolicy;
pub use state::{CloseReason, ConnectionState, StateChange};
