//! WebSocket endpoint derivation.
//!
//! The bingo server exposes one socket per room and channel:
//!
//! | Channel | Path |
//! |---------|------|
//! | [`Channel::Game`] | `/ws/bingo/game/{room}/` |
//! | [`Channel::CardSelection`] | `/ws/bingo/card-selection/{room}/` |
//!
//! The scheme follows the page that hosts the client: `wss` when the page
//! was served over `https`, `ws` otherwise.
//!
//! # Example
//!
//! ```
//! use bingo_stream::{Channel, Endpoint};
//!
//! let endpoint = Endpoint::from_page("https://bingo.example/play/", Channel::Game, "room42")?;
//! assert_eq!(endpoint.as_str(), "wss://bingo.example/ws/bingo/game/room42/");
//! # Ok::<(), bingo_stream::Error>(())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Room names accepted by the server's socket routing.
static ROOM_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("room name pattern is valid"));

// ============================================================================
// Channel
// ============================================================================

/// Server socket a client attaches to within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Live game: called numbers, countdown, bingo declarations.
    Game,
    /// Lobby card picking before a game starts.
    CardSelection,
}

impl Channel {
    /// Returns the path segment used in the socket URL.
    #[inline]
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::CardSelection => "card-selection",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// A validated `ws://` or `wss://` URL the client connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Builds a plain-text (`ws://`) room endpoint.
    ///
    /// # Arguments
    ///
    /// * `host` - Host with optional port (e.g., "127.0.0.1:8000")
    /// * `channel` - Room socket to attach to
    /// * `room` - Room name, word characters only
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the host or room is invalid.
    pub fn new(host: &str, channel: Channel, room: &str) -> Result<Self> {
        Self::for_room(host, false, channel, room)
    }

    /// Builds a room endpoint, choosing `wss` when `secure` is set.
    pub fn for_room(host: &str, secure: bool, channel: Channel, room: &str) -> Result<Self> {
        validate_host(host)?;
        validate_room(room)?;

        let scheme = if secure { "wss" } else { "ws" };
        let url = Url::parse(&format!(
            "{scheme}://{host}/ws/bingo/{}/{room}/",
            channel.path_segment()
        ))?;

        Ok(Self { url })
    }

    /// Derives a room endpoint from the URL of the page hosting the client.
    ///
    /// Host and port are taken from the page. An `https` page yields `wss`.
    pub fn from_page(page_url: &str, channel: Channel, room: &str) -> Result<Self> {
        let page = Url::parse(page_url)?;

        let secure = match page.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(Error::invalid_endpoint(format!(
                    "page scheme must be http or https, got '{other}'"
                )));
            }
        };

        let host = page
            .host_str()
            .ok_or_else(|| Error::invalid_endpoint("page URL has no host"))?;
        let authority = match page.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Self::for_room(&authority, secure, channel, room)
    }

    /// Wraps an explicit socket URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] unless the scheme is `ws` or `wss`.
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url.trim())?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self { url }),
            other => Err(Error::invalid_endpoint(format!(
                "socket scheme must be ws or wss, got '{other}'"
            ))),
        }
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the endpoint as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns `true` for `wss` endpoints.
    #[inline]
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Checks a room name against the server routing pattern.
pub fn validate_room(room: &str) -> Result<()> {
    if ROOM_NAME_PATTERN.is_match(room) {
        Ok(())
    } else {
        Err(Error::invalid_endpoint(format!(
            "room name '{room}' must be non-empty and contain only word characters"
        )))
    }
}

fn validate_host(host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(Error::invalid_endpoint("host is empty"));
    }
    if host
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
    {
        return Err(Error::invalid_endpoint(format!(
            "host '{host}' must not contain a path, query, or credentials"
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_endpoint() {
        let endpoint = Endpoint::new("127.0.0.1:8000", Channel::Game, "room1").expect("endpoint");
        assert_eq!(endpoint.as_str(), "ws://127.0.0.1:8000/ws/bingo/game/room1/");
        assert!(!endpoint.is_secure());
    }

    #[test]
    fn test_card_selection_endpoint() {
        let endpoint =
            Endpoint::for_room("bingo.example", true, Channel::CardSelection, "lobby_10")
                .expect("endpoint");
        assert_eq!(
            endpoint.as_str(),
            "wss://bingo.example/ws/bingo/card-selection/lobby_10/"
        );
        assert!(endpoint.is_secure());
    }

    #[test]
    fn test_from_page_picks_scheme_and_port() {
        let secure =
            Endpoint::from_page("https://bingo.example/game/7/", Channel::Game, "r7").expect("ok");
        assert_eq!(secure.as_str(), "wss://bingo.example/ws/bingo/game/r7/");

        let plain = Endpoint::from_page("http://localhost:8000/x", Channel::Game, "r7")
            .expect("ok");
        assert_eq!(plain.as_str(), "ws://localhost:8000/ws/bingo/game/r7/");
    }

    #[test]
    fn test_from_page_rejects_other_schemes() {
        let err = Endpoint::from_page("file:///tmp/page.html", Channel::Game, "r1").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_invalid_room_names() {
        for room in ["", "room 1", "room/1", "room-1", "r?x"] {
            assert!(
                Endpoint::new("localhost", Channel::Game, room).is_err(),
                "room {room:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_hosts() {
        assert!(Endpoint::new("", Channel::Game, "r").is_err());
        assert!(Endpoint::new("host/path", Channel::Game, "r").is_err());
        assert!(Endpoint::new("user@host", Channel::Game, "r").is_err());
    }

    #[test]
    fn test_parse_requires_socket_scheme() {
        assert!(Endpoint::parse("ws://localhost:9000/socket").is_ok());
        assert!(Endpoint::parse("wss://localhost/socket  ").is_ok());
        assert!(matches!(
            Endpoint::parse("http://localhost/socket"),
            Err(Error::InvalidEndpoint { .. })
        ));
        assert!(matches!(Endpoint::parse("::"), Err(Error::Url(_))));
    }
}
