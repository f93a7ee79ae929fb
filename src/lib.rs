//! Bingo Stream - Resilient event-stream client for bingo game rooms.
//!
//! This library keeps a WebSocket connection to a bingo room socket alive,
//! delivers server events to a callback and sends player actions back.
//!
//! # Architecture
//!
//! Each connection is owned by one background task:
//!
//! - **Handle (caller side)**: `send`, `close` and state queries
//! - **Worker (tokio task)**: connects, reads frames, schedules reconnects
//!
//! Key design principles:
//!
//! - A fixed delay (3000 ms by default) separates reconnect attempts
//! - At most 5 consecutive attempts; a successful open resets the budget
//! - An intentional close never triggers a reconnect
//! - Malformed messages are logged and skipped
//!
//! # Quick Start
//!
//! ```no_run
//! use bingo_stream::{Channel, Endpoint, GameEvent, OutboundAction, StateChange, connect};
//!
//! #[tokio::main]
//! async fn main() -> bingo_stream::Result<()> {
//!     let endpoint = Endpoint::for_room("127.0.0.1:8000", false, Channel::Game, "room1")?;
//!
//!     let handle = connect(
//!         endpoint,
//!         |event| match event.parse() {
//!             GameEvent::NumberCalled { letter, number, .. } => println!("Called {letter}{number}"),
//!             other => println!("{other:?}"),
//!         },
//!         |change| {
//!             if let StateChange::RetriesExhausted { attempts } = change {
//!                 eprintln!("Gave up after {attempts} attempts");
//!             }
//!         },
//!     );
//!
//!     handle.send(&OutboundAction::get_state());
//!     handle.stopped().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client factory and configuration |
//! | [`endpoint`] | Room socket address derivation |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Inbound events and outbound actions |
//! | [`transport`] | Connection lifecycle and reconnect loop |

// ============================================================================
// Modules
// ============================================================================

/// Client factory and configuration.
///
/// Use [`StreamClient::builder()`] to create a configured client.
pub mod client;

/// Room socket address derivation and validation.
pub mod endpoint;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Wire message types.
///
/// Decoding of server events and encoding of player actions.
pub mod protocol;

/// WebSocket transport layer.
///
/// Connection handle, worker loop and reconnect policy.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ClientBuilder, StreamClient};

// Endpoint types
pub use endpoint::{Channel, Endpoint};

// Error types
pub use error::{Error, Result};

// Protocol types
pub use protocol::{
    CardCell, Discriminator, GameEvent, InboundEvent, OutboundAction, bingo_letter,
};

// Transport types
pub use transport::{
    CloseReason, ConnectionHandle, ConnectionState, Connector, Frame, ReconnectPolicy,
    StateChange, Transport, WsConnector, connect,
};
