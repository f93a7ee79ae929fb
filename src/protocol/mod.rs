//! WebSocket protocol message types.
//!
//! This module defines the messages exchanged with the bingo server.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `OutboundAction` | Client → Server | Player action (select card, declare bingo) |
//! | `InboundEvent` | Server → Client | Game notification (number called, game ended) |
//!
//! Both directions are JSON text frames carrying a discriminator field.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `action` | Outbound action envelope and typed constructors |
//! | `event` | Inbound event envelope and typed parsing |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound action types.
pub mod action;

/// Inbound event types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use action::{CardCell, Discriminator, OutboundAction};
pub use event::{GameEvent, InboundEvent, bingo_letter};
