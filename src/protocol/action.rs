//! Outbound action types.
//!
//! Actions are flat JSON objects sent from the client to the server. The
//! server routes on one discriminator field whose key depends on the
//! socket and action family:
//!
//! | Key | Actions |
//! |-----|---------|
//! | `action` | `declare_bingo`, `start_countdown` |
//! | `type` | `select_card`, `deselect_card`, `card_activated`, `get_state`, `request_active_cards`, `start_new_game`, `card_selected` (legacy) |
//! | `command` | `joined` |

// ============================================================================
// Imports
// ============================================================================

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::Result;

// ============================================================================
// Discriminator
// ============================================================================

/// Field that carries the action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discriminator {
    /// `{"action": ...}`
    Action,
    /// `{"type": ...}`
    Type,
    /// `{"command": ...}`
    Command,
}

impl Discriminator {
    /// Returns the JSON key for this discriminator.
    #[inline]
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Type => "type",
            Self::Command => "command",
        }
    }
}

// ============================================================================
// CardCell
// ============================================================================

/// One cell of a 5x5 card in a bingo declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardCell {
    /// The free centre square, sent as `"*"`.
    Free,
    /// A number the player marked.
    Marked(u32),
    /// A cell the player did not mark, sent as `null`.
    Unmarked,
}

impl From<CardCell> for Value {
    fn from(cell: CardCell) -> Self {
        match cell {
            CardCell::Free => Value::from("*"),
            CardCell::Marked(number) => Value::from(number),
            CardCell::Unmarked => Value::Null,
        }
    }
}

impl Serialize for CardCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Value::from(*self).serialize(serializer)
    }
}

// ============================================================================
// OutboundAction
// ============================================================================

/// A tagged message submitted for transmission.
///
/// # Format
///
/// ```json
/// {
///   "action": "start_countdown",
///   "room_name": "room42"
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundAction {
    discriminator: Discriminator,
    name: String,
    fields: Map<String, Value>,
}

impl OutboundAction {
    /// Creates an action with no payload fields.
    #[inline]
    #[must_use]
    pub fn new(discriminator: Discriminator, name: impl Into<String>) -> Self {
        Self {
            discriminator,
            name: name.into(),
            fields: Map::new(),
        }
    }

    /// Adds a payload field.
    ///
    /// A field named like the discriminator key is ignored on the wire.
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the action name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the discriminator this action is tagged with.
    #[inline]
    #[must_use]
    pub fn discriminator(&self) -> Discriminator {
        self.discriminator
    }

    /// Returns a payload field.
    #[inline]
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Serializes the action to JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for OutboundAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let key = self.discriminator.key();
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(key, &self.name)?;
        for (field, value) in &self.fields {
            if field != key {
                map.serialize_entry(field, value)?;
            }
        }
        map.end()
    }
}

// ============================================================================
// Game Actions
// ============================================================================

impl OutboundAction {
    /// Claims bingo with the player's marked card.
    ///
    /// `card_numbers` lists the 25 cells row by row.
    #[must_use]
    pub fn declare_bingo(
        username: impl Into<String>,
        room_name: impl Into<String>,
        card_numbers: &[CardCell],
    ) -> Self {
        let cells = card_numbers
            .iter()
            .copied()
            .map(Value::from)
            .collect::<Vec<_>>();

        Self::new(Discriminator::Action, "declare_bingo")
            .with("username", username.into())
            .with("room_name", room_name.into())
            .with("card_numbers", cells)
    }

    /// Asks the server to start the pre-game countdown.
    #[must_use]
    pub fn start_countdown(room_name: impl Into<String>) -> Self {
        Self::new(Discriminator::Action, "start_countdown").with("room_name", room_name.into())
    }
}

// ============================================================================
// Card Selection Actions
// ============================================================================

impl OutboundAction {
    /// Reserves a card for the current player.
    ///
    /// The server releases the player's previous card, if any, and
    /// broadcasts `card_selected`.
    #[must_use]
    pub fn select_card(card_id: u32) -> Self {
        Self::new(Discriminator::Type, "select_card").with("card_id", card_id)
    }

    /// Releases a reserved card.
    #[must_use]
    pub fn deselect_card(card_id: u32) -> Self {
        Self::new(Discriminator::Type, "deselect_card").with("card_id", card_id)
    }

    /// Commits the selected card for the coming game.
    #[must_use]
    pub fn activate_card(card_number: u32) -> Self {
        Self::new(Discriminator::Type, "card_activated").with("card_number", card_number)
    }

    /// Announces that `user` picked `card_number` on the older lobby socket.
    #[must_use]
    pub fn legacy_card_selected(card_number: u32, user: impl Into<String>) -> Self {
        Self::new(Discriminator::Type, "card_selected")
            .with("card_number", card_number)
            .with("user", user.into())
    }

    /// Requests the current room state; usually sent right after opening.
    #[must_use]
    pub fn get_state() -> Self {
        Self::new(Discriminator::Type, "get_state")
    }

    /// Requests the list of cards already taken.
    #[must_use]
    pub fn request_active_cards() -> Self {
        Self::new(Discriminator::Type, "request_active_cards")
    }

    /// Asks the server to reset the room for a new game.
    #[must_use]
    pub fn start_new_game() -> Self {
        Self::new(Discriminator::Type, "start_new_game")
    }

    /// Legacy join notice for the selection socket.
    #[must_use]
    pub fn joined(user: impl Into<String>) -> Self {
        let user = user.into();
        Self::new(Discriminator::Command, "joined")
            .with("info", format!("{user} just Joined"))
            .with("user", user)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn to_value(action: &OutboundAction) -> Value {
        serde_json::from_str(&action.to_json().expect("serialize")).expect("valid json")
    }

    #[test]
    fn test_start_countdown_wire_format() {
        let action = OutboundAction::start_countdown("room42");
        assert_eq!(
            to_value(&action),
            json!({ "action": "start_countdown", "room_name": "room42" })
        );
    }

    #[test]
    fn test_declare_bingo_cells() {
        let mut cells = vec![CardCell::Unmarked; 25];
        cells[0] = CardCell::Marked(7);
        cells[12] = CardCell::Free;

        let value = to_value(&OutboundAction::declare_bingo("ana", "room42", &cells));

        assert_eq!(value["action"], "declare_bingo");
        assert_eq!(value["username"], "ana");
        let sent = value["card_numbers"].as_array().expect("array");
        assert_eq!(sent.len(), 25);
        assert_eq!(sent[0], json!(7));
        assert_eq!(sent[1], Value::Null);
        assert_eq!(sent[12], json!("*"));
    }

    #[test]
    fn test_card_selection_wire_format() {
        assert_eq!(
            to_value(&OutboundAction::select_card(18)),
            json!({ "type": "select_card", "card_id": 18 })
        );
        assert_eq!(
            to_value(&OutboundAction::deselect_card(18)),
            json!({ "type": "deselect_card", "card_id": 18 })
        );
        assert_eq!(
            to_value(&OutboundAction::activate_card(18)),
            json!({ "type": "card_activated", "card_number": 18 })
        );
    }

    #[test]
    fn test_legacy_card_selected_uses_type_key() {
        let action = OutboundAction::legacy_card_selected(18, "bo");
        assert_eq!(action.discriminator(), Discriminator::Type);
        assert_eq!(
            to_value(&action),
            json!({ "type": "card_selected", "card_number": 18, "user": "bo" })
        );
    }

    #[test]
    fn test_joined_uses_command_key() {
        let value = to_value(&OutboundAction::joined("cy"));
        assert_eq!(value["command"], "joined");
        assert_eq!(value["info"], "cy just Joined");
    }

    #[test]
    fn test_discriminator_field_cannot_be_overridden() {
        let action = OutboundAction::new(Discriminator::Type, "get_state").with("type", "spoofed");
        assert_eq!(to_value(&action), json!({ "type": "get_state" }));
    }

    #[test]
    fn test_card_cell_serialization() {
        let cells = [CardCell::Free, CardCell::Marked(3), CardCell::Unmarked];
        assert_eq!(
            serde_json::to_value(cells).expect("serialize"),
            json!(["*", 3, null])
        );
    }

    #[test]
    fn test_card_cell_value_matches_serialization() {
        for cell in [CardCell::Free, CardCell::Marked(42), CardCell::Unmarked] {
            assert_eq!(
                Value::from(cell),
                serde_json::to_value(cell).expect("serialize")
            );
        }
    }
}
