//! Inbound event types.
//!
//! Events are JSON objects pushed by the bingo server. Each carries a
//! discriminator in its `type` field; the older selection socket uses
//! `command` instead. The client performs no schema validation: every
//! object is delivered as an [`InboundEvent`], and [`InboundEvent::parse`]
//! maps the known kinds onto [`GameEvent`].
//!
//! # Event Kinds
//!
//! | Channel | Kinds |
//! |---------|-------|
//! | game | `number_called`, `countdown_update`, `game_started`, `game_ended`, `game_reset`, `player_count_update`, `play_sound`, `toast`, `error` |
//! | card-selection | `card_selected`, `card_deselected`, `card_activated`, `card_released`, `selected_cards_update`, `taken_cards_update`, `active_cards_update`, `active_cards_response`, `game_state` |
//! | legacy | `clicked` (tagged by `command`) |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// InboundEvent
// ============================================================================

/// A tagged message received from the server.
///
/// # Format
///
/// ```json
/// {
///   "type": "number_called",
///   "number": 17,
///   "called_numbers": [4, 17]
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Discriminator taken from `type`, falling back to `command`.
    kind: String,
    /// The full message object, discriminator included.
    payload: Map<String, Value>,
}

impl InboundEvent {
    /// Decodes a text frame into an event.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not valid JSON
    /// - [`Error::Protocol`] if the JSON is not an object
    pub fn from_text(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(payload) => Ok(Self::from_payload(payload)),
            other => Err(Error::protocol(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Builds an event from an already decoded object.
    #[must_use]
    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .or_else(|| payload.get("command").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        Self { kind, payload }
    }

    /// Returns the event discriminator, or `""` when the message has none.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the raw message object.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Returns a field of the message.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> GameEvent {
        self.parse_internal()
    }
}

// ============================================================================
// GameEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A number was drawn.
    NumberCalled {
        /// The drawn number (1-75).
        number: u32,
        /// Display form such as `B7`, when the server sends one.
        display: Option<String>,
        /// Column letter for the number.
        letter: char,
        /// Every number called so far, oldest first.
        called_numbers: Vec<u32>,
    },

    /// Pre-game countdown tick.
    CountdownUpdate {
        /// Seconds remaining.
        time_left: u32,
        /// Optional status text.
        message: Option<String>,
    },

    /// The game has started; card selection is closed.
    GameStarted {
        /// Optional status text.
        message: Option<String>,
    },

    /// The game ended with a winner.
    GameEnded {
        /// Winning player's username.
        winner: Option<String>,
        /// Winning card number.
        card_number: Option<u32>,
        /// Numbers called during the game.
        called_numbers: Vec<u32>,
        /// Prize amount as sent by the server.
        bonus: Option<String>,
        /// Optional status text.
        message: Option<String>,
    },

    /// The room was reset for a new game.
    GameReset {
        /// Optional status text.
        message: Option<String>,
    },

    /// Number of players in the room changed.
    PlayerCountUpdate {
        /// Current player count.
        count: u32,
    },

    /// The server asks clients to play a sound effect.
    PlaySound {
        /// Sound effect name.
        sound: String,
    },

    /// Informational notice for the player.
    Toast {
        /// Notice text.
        message: String,
    },

    /// The server rejected an action.
    Error {
        /// Error text.
        message: String,
    },

    /// A player picked a card.
    CardSelected {
        /// Selected card number.
        card_number: u32,
        /// Player who picked it.
        username: Option<String>,
    },

    /// A player released their card.
    CardDeselected {
        /// Released card number.
        card_number: u32,
        /// Player who released it.
        username: Option<String>,
    },

    /// A player committed their card for the coming game.
    CardActivated {
        /// Committed card number.
        card_number: u32,
    },

    /// A card became available again.
    CardReleased {
        /// Released card number.
        card_number: u32,
    },

    /// Full list of cards currently selected in the lobby.
    SelectedCardsUpdate {
        /// Selected card numbers.
        cards: Vec<u32>,
    },

    /// Cards that are taken and must not be offered.
    ///
    /// Covers `taken_cards_update`, `active_cards_update` and
    /// `active_cards_response`.
    TakenCardsUpdate {
        /// Taken card numbers.
        cards: Vec<u32>,
    },

    /// Room state snapshot.
    GameState {
        /// The snapshot fields, discriminator removed.
        state: Map<String, Value>,
    },

    /// Another player marked a cell (legacy selection socket).
    Clicked {
        /// The marked cell.
        dataset: String,
        /// Player who marked it.
        user: String,
    },

    /// Unknown event kind.
    Unknown {
        /// Event discriminator.
        kind: String,
        /// Raw message object.
        payload: Map<String, Value>,
    },
}

// ============================================================================
// Event Parsing Implementation
// ============================================================================

impl InboundEvent {
    /// Internal parsing implementation.
    fn parse_internal(&self) -> GameEvent {
        match self.kind.as_str() {
            "number_called" => {
                let number = self.get_number("number").unwrap_or_default();
                GameEvent::NumberCalled {
                    number,
                    display: self.get_optional_string("display"),
                    letter: self
                        .get_optional_string("letter")
                        .and_then(|s| s.chars().next())
                        .unwrap_or_else(|| bingo_letter(number)),
                    called_numbers: self.get_numbers("called_numbers"),
                }
            }

            "countdown_update" => GameEvent::CountdownUpdate {
                time_left: self.get_number("time_left").unwrap_or_default(),
                message: self.get_optional_string("message"),
            },

            "game_started" => GameEvent::GameStarted {
                message: self.get_optional_string("message"),
            },

            "game_ended" => GameEvent::GameEnded {
                winner: self.get_optional_string("winner"),
                card_number: self.get_number("card_number"),
                called_numbers: self.get_numbers("called_numbers"),
                bonus: self.get_text("bonus"),
                message: self.get_optional_string("message"),
            },

            "game_reset" => GameEvent::GameReset {
                message: self.get_optional_string("message"),
            },

            "player_count_update" => GameEvent::PlayerCountUpdate {
                count: self.get_number("count").unwrap_or_default(),
            },

            "play_sound" => GameEvent::PlaySound {
                sound: self.get_string("sound"),
            },

            "toast" => GameEvent::Toast {
                message: self.get_string("message"),
            },

            "error" => GameEvent::Error {
                message: self.get_string("message"),
            },

            "card_selected" => GameEvent::CardSelected {
                card_number: self.get_number("card_number").unwrap_or_default(),
                username: self
                    .get_optional_string("username")
                    .or_else(|| self.get_optional_string("user")),
            },

            "card_deselected" => GameEvent::CardDeselected {
                card_number: self.get_number("card_number").unwrap_or_default(),
                username: self.get_optional_string("username"),
            },

            "card_activated" => GameEvent::CardActivated {
                card_number: self.get_number("card_number").unwrap_or_default(),
            },

            "card_released" => GameEvent::CardReleased {
                card_number: self.get_number("card_number").unwrap_or_default(),
            },

            "selected_cards_update" => GameEvent::SelectedCardsUpdate {
                cards: self.get_numbers("selected_cards"),
            },

            "taken_cards_update" | "active_cards_update" | "active_cards_response" => {
                let cards = if self.payload.contains_key("taken_cards") {
                    self.get_numbers("taken_cards")
                } else {
                    self.get_numbers("active_cards")
                };
                GameEvent::TakenCardsUpdate { cards }
            }

            "game_state" => {
                let mut state = self.payload.clone();
                state.remove("type");
                GameEvent::GameState { state }
            }

            "clicked" => GameEvent::Clicked {
                dataset: self.get_text("dataset").unwrap_or_default(),
                user: self.get_string("user"),
            },

            _ => GameEvent::Unknown {
                kind: self.kind.clone(),
                payload: self.payload.clone(),
            },
        }
    }

    /// Gets a string field, empty when absent.
    #[inline]
    fn get_string(&self, key: &str) -> String {
        self.get_optional_string(key).unwrap_or_default()
    }

    /// Gets an optional string field.
    #[inline]
    fn get_optional_string(&self, key: &str) -> Option<String> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Gets a scalar field rendered as text (strings and numbers).
    fn get_text(&self, key: &str) -> Option<String> {
        match self.payload.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Gets a number that may arrive as an integer or a digit string.
    #[inline]
    fn get_number(&self, key: &str) -> Option<u32> {
        self.payload.get(key).and_then(number_from_value)
    }

    /// Gets a list of numbers, skipping entries that are not numbers.
    fn get_numbers(&self, key: &str) -> Vec<u32> {
        self.payload
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(number_from_value).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns the column letter for a called number.
///
/// Columns span 15 numbers each: B 1-15, I 16-30, N 31-45, G 46-60, O 61-75.
#[must_use]
pub fn bingo_letter(number: u32) -> char {
    match number {
        0..=15 => 'B',
        16..=30 => 'I',
        31..=45 => 'N',
        46..=60 => 'G',
        _ => 'O',
    }
}

fn number_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================
