//! Client factory and configuration.
//!
//! Use [`StreamClient::builder()`] to create a configured client, then
//! [`StreamClient::connect`] to open a resilient connection.
//!
//! # Example
//!
//! ```no_run
//! use bingo_stream::{Channel, GameEvent, OutboundAction, StreamClient};
//!
//! # async fn example() -> bingo_stream::Result<()> {
//! let client = StreamClient::builder()
//!     .room("127.0.0.1:8000", false, Channel::Game, "room1")
//!     .build()?;
//!
//! let handle = client.connect(
//!     |event| {
//!         if let GameEvent::NumberCalled { letter, number, .. } = event.parse() {
//!             println!("{letter}{number}");
//!         }
//!     },
//!     |change| println!("{change:?}"),
//! );
//!
//! handle.send(&OutboundAction::start_countdown("room1"));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent configuration API |
//! | `core` | Client factory |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for client configuration.
pub mod builder;

/// Client factory implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::StreamClient;
