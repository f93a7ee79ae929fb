//! Watch a bingo room and print every game event.
//!
//! Demonstrates:
//! - Building a client from a room socket URL
//! - Typed event handling with `GameEvent`
//! - Re-requesting room state from the state handler on every open
//! - Reacting to the terminal `RetriesExhausted` notice
//!
//! Usage:
//!   cargo run --example watch_game -- ws://127.0.0.1:8000/ws/bingo/game/room1/
//!   cargo run --example watch_game -- ws://127.0.0.1:8000/ws/bingo/game/room1/ --debug

// ============================================================================
// Imports
// ============================================================================

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bingo_stream::{GameEvent, OutboundAction, StateChange, StreamClient};

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    url: String,
    debug: bool,
}

impl Args {
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let url = args
            .iter()
            .find(|a| !a.starts_with("--"))
            .cloned()
            .context("usage: watch_game <ws-url> [--debug]")?;
        Ok(Self {
            url,
            debug: args.iter().any(|a| a == "--debug"),
        })
    }
}

// ============================================================================
// Functions
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "bingo_stream=debug"
    } else {
        "bingo_stream=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

fn print_event(event: GameEvent) {
    match event {
        GameEvent::NumberCalled { letter, number, .. } => println!("  -> {letter}-{number}"),
        GameEvent::CountdownUpdate { time_left, .. } => println!("  starting in {time_left}s"),
        GameEvent::GameStarted { .. } => println!("  game started"),
        GameEvent::GameEnded {
            winner,
            card_number,
            ..
        } => println!(
            "  game over: {} wins with card {}",
            winner.as_deref().unwrap_or("nobody"),
            card_number.map_or_else(|| "?".to_string(), |n| n.to_string())
        ),
        GameEvent::PlayerCountUpdate { count } => println!("  {count} players"),
        GameEvent::Toast { message } | GameEvent::Error { message } => println!("  {message}"),
        other => println!("  {other:?}"),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse()?;
    init_logging(args.debug);

    let client = StreamClient::builder().url(&args.url).build()?;
    info!(endpoint = %client.endpoint(), "Watching room");

    let handle = client.connect_detached();
    handle.set_event_handler(Box::new(|event| print_event(event.parse())));

    // Holding a clone keeps the worker alive until `close()`.
    let sender = handle.clone();
    handle.set_state_handler(Box::new(move |change| match change {
        StateChange::Open => {
            println!("[connected]");
            // Refresh the room snapshot after every (re)connect.
            sender.send(&OutboundAction::get_state());
        }
        StateChange::Closed { reason, will_retry } => {
            println!("[disconnected: {reason}, retrying: {will_retry}]");
        }
        StateChange::RetriesExhausted { attempts } => {
            println!("[gave up after {attempts} attempts]");
        }
    }));

    // The first open may have happened before the handler was installed.
    if handle.state().is_open() {
        handle.send(&OutboundAction::get_state());
    }

    tokio::select! {
        _ = handle.stopped() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("Closing...");
            handle.close();
            handle.stopped().await;
        }
    }

    Ok(())
}
