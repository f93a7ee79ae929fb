//! Resilient WebSocket connection and event loop.
//!
//! This module owns one logical connection to a bingo room socket and
//! keeps it alive across drops.
//!
//! # Event Loop
//!
//! [`connect`] spawns a tokio task that handles:
//!
//! - Connection attempts, bounded by the policy's connect timeout
//! - Incoming frames, decoded and handed to the event handler in order
//! - Outgoing actions queued by [`ConnectionHandle::send`]
//! - The reconnect timer after an unexpected close
//!
//! The task is the only owner of the transport, the retry counter and the
//! timer, so at most one connection attempt and one pending reconnect
//! exist per handle.
//!
//! # Reconnection
//!
//! 1. On an unexpected close, if `retry_count < max_retries`, wait
//!    `retry_delay`, increment `retry_count` and connect again.
//! 2. A successful open resets `retry_count` to 0.
//! 3. Once the budget is spent the handle stays closed and the state
//!    handler receives [`StateChange::RetriesExhausted`].
//!
//! [`ConnectionHandle::close`] disarms all of the above.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::protocol::{InboundEvent, OutboundAction};

use super::connector::{Connector, Frame, Transport, WsConnector};
use super::policy::ReconnectPolicy;
use super::state::{CloseReason, ConnectionState, StateChange};

// ============================================================================
// Constants
// ============================================================================

/// Longest slice of a malformed message echoed into logs.
const MAX_LOGGED_PAYLOAD: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Called on the connection task once per inbound message, in arrival order.
/// The handler must not block and must not register another handler.
pub type EventHandler = Box<dyn Fn(InboundEvent) + Send + Sync>;

/// State handler callback type.
///
/// Called on the connection task for every [`StateChange`].
/// The handler must not block and must not register another handler.
pub type StateHandler = Box<dyn Fn(StateChange) + Send + Sync>;

type SharedHandler<T> = Arc<Mutex<Option<T>>>;

/// State shared between the handle and the connection task.
#[derive(Debug)]
struct Shared {
    state: ConnectionState,
    retry_count: u32,
    /// Set by `close()`; an intentional close never reconnects.
    closing: bool,
    exhausted: bool,
}

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Transmit an already serialized action.
    Send(String),
    /// Tear down and stop reconnecting.
    Close,
}

/// How one session or attempt ended.
enum SessionEnd {
    /// `close()` was called or every handle was dropped.
    Requested,
    /// The transport went away without being asked to.
    Lost(CloseReason),
}

// ============================================================================
// connect
// ============================================================================

/// Opens a resilient connection with the default policy and connector.
///
/// Returns immediately; the first attempt runs on a spawned task.
/// `on_event` receives every inbound message and `on_state` every
/// lifecycle change. Transport errors never reach the caller.
///
/// Must be called from within a tokio runtime.
pub fn connect<E, S>(endpoint: Endpoint, on_event: E, on_state: S) -> ConnectionHandle
where
    E: Fn(InboundEvent) + Send + Sync + 'static,
    S: Fn(StateChange) + Send + Sync + 'static,
{
    ConnectionHandle::spawn(
        endpoint,
        ReconnectPolicy::default(),
        Arc::new(WsConnector),
        Some(Box::new(on_event)),
        Some(Box::new(on_state)),
    )
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Handle to a resilient connection.
///
/// Cloning yields another handle to the same connection. The connection
/// task stops after [`close`](Self::close), after the retry budget is
/// spent, or once every handle has been dropped.
///
/// # Thread Safety
///
/// `ConnectionHandle` is `Send + Sync`; `send` and `state` never block on
/// I/O.
pub struct ConnectionHandle {
    endpoint: Endpoint,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    shared: Arc<Mutex<Shared>>,
    event_handler: SharedHandler<EventHandler>,
    state_handler: SharedHandler<StateHandler>,
    stopped: watch::Receiver<bool>,
}

impl Clone for ConnectionHandle {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            command_tx: self.command_tx.clone(),
            shared: Arc::clone(&self.shared),
            event_handler: Arc::clone(&self.event_handler),
            state_handler: Arc::clone(&self.state_handler),
            stopped: self.stopped.clone(),
        }
    }
}

impl ConnectionHandle {
    /// Spawns the connection task.
    pub(crate) fn spawn(
        endpoint: Endpoint,
        policy: ReconnectPolicy,
        connector: Arc<dyn Connector>,
        event_handler: Option<EventHandler>,
        state_handler: Option<StateHandler>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (stopped_tx, stopped) = watch::channel(false);
        let shared = Arc::new(Mutex::new(Shared {
            state: ConnectionState::Connecting,
            retry_count: 0,
            closing: false,
            exhausted: false,
        }));
        let event_handler = Arc::new(Mutex::new(event_handler));
        let state_handler = Arc::new(Mutex::new(state_handler));

        let worker = Worker {
            endpoint: endpoint.clone(),
            policy,
            connector,
            command_rx,
            shared: Arc::clone(&shared),
            event_handler: Arc::clone(&event_handler),
            state_handler: Arc::clone(&state_handler),
        };

        tokio::spawn(async move {
            worker.run().await;
            let _ = stopped_tx.send(true);
        });

        Self {
            endpoint,
            command_tx,
            shared,
            event_handler,
            state_handler,
            stopped,
        }
    }

    /// Returns the endpoint this handle connects to.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Returns the number of consecutive reconnect attempts so far.
    #[inline]
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.shared.lock().retry_count
    }

    /// Returns `true` once the retry budget is spent.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.shared.lock().exhausted
    }

    /// Sets the event handler callback.
    pub fn set_event_handler(&self, handler: EventHandler) {
        *self.event_handler.lock() = Some(handler);
    }

    /// Clears the event handler. Later messages are decoded and dropped.
    pub fn clear_event_handler(&self) {
        *self.event_handler.lock() = None;
    }

    /// Sets the state handler callback.
    pub fn set_state_handler(&self, handler: StateHandler) {
        *self.state_handler.lock() = Some(handler);
    }

    /// Clears the state handler.
    pub fn clear_state_handler(&self) {
        *self.state_handler.lock() = None;
    }

    /// Submits an action for transmission.
    ///
    /// Returns `true` if transmission was attempted, which requires the
    /// connection to be open. Otherwise the action is dropped and a warning
    /// is logged.
    pub fn send(&self, action: &OutboundAction) -> bool {
        match self.try_send(action) {
            Ok(()) => true,
            Err(e) => {
                warn!(action = action.name(), error = %e, "Dropping outbound action");
                false
            }
        }
    }

    /// Submits an action, reporting why it could not be sent.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the connection is not open
    /// - [`Error::Json`] if the action cannot be serialized
    /// - [`Error::ConnectionClosed`] if the connection task has stopped
    pub fn try_send(&self, action: &OutboundAction) -> Result<()> {
        let state = self.state();
        if !state.is_open() {
            return Err(Error::not_connected(state));
        }

        let text = action.to_json()?;
        self.command_tx
            .send(ConnectionCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)?;

        trace!(action = action.name(), "Action queued");
        Ok(())
    }

    /// Closes the connection and disarms reconnection.
    ///
    /// Cancels a pending reconnect timer or an in-flight attempt. Calling
    /// it more than once has no further effect.
    pub fn close(&self) {
        {
            let mut shared = self.shared.lock();
            if shared.closing {
                return;
            }
            shared.closing = true;
        }

        debug!(endpoint = %self.endpoint, "Close requested");
        let _ = self.command_tx.send(ConnectionCommand::Close);
    }

    /// Waits until the connection task has stopped.
    ///
    /// Resolves after `close()`, after retry exhaustion, or once every
    /// handle is dropped.
    pub async fn stopped(&self) {
        let mut stopped = self.stopped.clone();
        let _ = stopped.wait_for(|done| *done).await;
    }
}

// ============================================================================
// Worker
// ============================================================================

/// The connection task. Owns the transport and the retry loop.
struct Worker {
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    shared: Arc<Mutex<Shared>>,
    event_handler: SharedHandler<EventHandler>,
    state_handler: SharedHandler<StateHandler>,
}

impl Worker {
    /// Supervisor loop: connect, run the session, decide whether to retry.
    async fn run(mut self) {
        loop {
            if self.shared.lock().closing {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            let attempt = self.shared.lock().retry_count;
            debug!(endpoint = %self.endpoint, attempt, "Connecting");

            let end = match self.open_transport().await {
                Ok(Some(transport)) => {
                    {
                        let mut shared = self.shared.lock();
                        shared.retry_count = 0;
                        shared.state = ConnectionState::Open;
                    }
                    info!(endpoint = %self.endpoint, "Connection open");
                    self.notify(StateChange::Open);
                    self.run_session(transport).await
                }
                Ok(None) => SessionEnd::Requested,
                Err(e) => {
                    warn!(endpoint = %self.endpoint, attempt, error = %e, "Connection attempt failed");
                    SessionEnd::Lost(CloseReason::ConnectFailed(e.to_string()))
                }
            };

            let reason = match end {
                SessionEnd::Requested => break,
                SessionEnd::Lost(_) if self.shared.lock().closing => break,
                SessionEnd::Lost(reason) => reason,
            };

            let retry_count = self.shared.lock().retry_count;
            let will_retry = self.policy.should_retry(retry_count);

            self.set_state(ConnectionState::Closed);
            self.notify(StateChange::Closed {
                reason: reason.clone(),
                will_retry,
            });

            if !will_retry {
                self.shared.lock().exhausted = true;
                warn!(
                    endpoint = %self.endpoint,
                    attempts = retry_count,
                    "Retry budget exhausted, giving up"
                );
                self.notify(StateChange::RetriesExhausted {
                    attempts: retry_count,
                });
                return;
            }

            debug!(
                %reason,
                retry = retry_count + 1,
                max_retries = self.policy.max_retries,
                delay_ms = self.policy.retry_delay.as_millis() as u64,
                "Scheduling reconnect"
            );

            if !self.wait_retry_delay().await {
                debug!(endpoint = %self.endpoint, "Pending reconnect cancelled");
                return;
            }

            self.shared.lock().retry_count += 1;
        }

        self.finish_requested_close();
    }

    /// Makes one connection attempt.
    ///
    /// Returns `Ok(None)` if a close was requested while connecting.
    async fn open_transport(&mut self) -> Result<Option<Box<dyn Transport>>> {
        let connect_timeout = self.policy.connect_timeout;
        let attempt = timeout(connect_timeout, self.connector.connect(&self.endpoint));
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok(Ok(transport)) => Ok(Some(transport)),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(Error::connection_timeout(connect_timeout.as_millis() as u64)),
                    };
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(_)) => {
                            warn!("Dropping action queued before connection opened");
                        }
                        Some(ConnectionCommand::Close) | None => return Ok(None),
                    }
                }
            }
        }
    }

    /// Pumps frames and commands until the transport ends or close is
    /// requested.
    async fn run_session(&mut self, mut transport: Box<dyn Transport>) -> SessionEnd {
        loop {
            tokio::select! {
                // Incoming frames from the server
                frame = transport.recv() => {
                    match frame {
                        Ok(Frame::Text(text)) => self.dispatch(&text),

                        Ok(Frame::Close { code, reason }) => {
                            debug!(?code, %reason, "WebSocket closed by remote");
                            return SessionEnd::Lost(CloseReason::Remote { code, reason });
                        }

                        Err(e) => {
                            warn!(error = %e, "WebSocket transport lost");
                            return SessionEnd::Lost(CloseReason::Transport(e.to_string()));
                        }
                    }
                }

                // Commands from the handle
                command = self.command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(text)) => {
                            if let Err(e) = transport.send_text(text).await {
                                warn!(error = %e, "Failed to send action");
                                return SessionEnd::Lost(CloseReason::Transport(e.to_string()));
                            }
                        }

                        Some(ConnectionCommand::Close) | None => {
                            transport.close().await;
                            return SessionEnd::Requested;
                        }
                    }
                }
            }
        }
    }

    /// Waits out the retry delay.
    ///
    /// Returns `false` if a close was requested meanwhile.
    async fn wait_retry_delay(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.policy.retry_delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,

                command = self.command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(_)) => {
                            warn!("Dropping action queued before connection closed");
                        }
                        Some(ConnectionCommand::Close) | None => return false,
                    }
                }
            }
        }
    }

    /// Decodes one text frame and hands it to the event handler.
    fn dispatch(&self, text: &str) {
        match InboundEvent::from_text(text) {
            Ok(event) => {
                trace!(kind = event.kind(), "Event received");
                let handler = self.event_handler.lock();
                if let Some(ref handler) = *handler {
                    handler(event);
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    text = %truncate(text, MAX_LOGGED_PAYLOAD),
                    "Failed to parse incoming message"
                );
            }
        }
    }

    /// Records the final state after an intentional close.
    fn finish_requested_close(&self) {
        let previous = {
            let mut shared = self.shared.lock();
            std::mem::replace(&mut shared.state, ConnectionState::Closed)
        };

        if previous != ConnectionState::Closed {
            self.notify(StateChange::Closed {
                reason: CloseReason::Requested,
                will_retry: false,
            });
        }

        debug!(endpoint = %self.endpoint, "Event loop terminated");
    }

    fn set_state(&self, state: ConnectionState) {
        self.shared.lock().state = state;
    }

    fn notify(&self, change: StateChange) {
        let handler = self.state_handler.lock();
        if let Some(ref handler) = *handler {
            handler(change);
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    // ------------------------------------------------------------------------
    // Scripted transport
    // ------------------------------------------------------------------------

    /// What the next connection attempt should do.
    enum Script {
        /// Fail immediately.
        Refuse,
        /// Open; the test drives the server side through `ServerSide`.
        Accept,
    }

    /// Server end of an accepted scripted transport.
    struct ServerSide {
        to_client: mpsc::UnboundedSender<Result<Frame>>,
        from_client: mpsc::UnboundedReceiver<String>,
    }

    impl ServerSide {
        fn push(&self, text: &str) {
            let _ = self.to_client.send(Ok(Frame::Text(text.to_string())));
        }

        fn drop_connection(&self) {
            let _ = self
                .to_client
                .send(Err(Error::connection("connection reset")));
        }
    }

    struct ScriptedTransport {
        incoming: mpsc::UnboundedReceiver<Result<Frame>>,
        outgoing: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send_text(&mut self, text: String) -> Result<()> {
            self.outgoing
                .send(text)
                .map_err(|_| Error::connection("peer gone"))
        }

        async fn recv(&mut self) -> Result<Frame> {
            match self.incoming.recv().await {
                Some(frame) => frame,
                None => Err(Error::ConnectionClosed),
            }
        }

        async fn close(&mut self) {}
    }

    #[derive(Default)]
    struct ScriptState {
        script: VecDeque<Script>,
        attempts: Vec<Instant>,
        servers: VecDeque<ServerSide>,
    }

    /// Connector that follows a script; attempts past the end are refused.
    #[derive(Clone, Default)]
    struct ScriptedConnector {
        state: Arc<Mutex<ScriptState>>,
    }

    impl ScriptedConnector {
        fn with_script(script: impl IntoIterator<Item = Script>) -> Self {
            let connector = Self::default();
            connector.state.lock().script = script.into_iter().collect();
            connector
        }

        fn attempts(&self) -> Vec<Instant> {
            self.state.lock().attempts.clone()
        }

        fn attempt_count(&self) -> usize {
            self.state.lock().attempts.len()
        }

        fn take_server(&self) -> ServerSide {
            self.state
                .lock()
                .servers
                .pop_front()
                .expect("an accepted connection")
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
            let mut state = self.state.lock();
            state.attempts.push(Instant::now());

            match state.script.pop_front().unwrap_or(Script::Refuse) {
                Script::Refuse => Err(Error::connection("connection refused")),
                Script::Accept => {
                    let (to_client, incoming) = mpsc::unbounded_channel();
                    let (outgoing, from_client) = mpsc::unbounded_channel();
                    state.servers.push_back(ServerSide {
                        to_client,
                        from_client,
                    });
                    Ok(Box::new(ScriptedTransport { incoming, outgoing }))
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Harness
    // ------------------------------------------------------------------------

    struct Harness {
        handle: ConnectionHandle,
        connector: ScriptedConnector,
        events: mpsc::UnboundedReceiver<InboundEvent>,
        changes: mpsc::UnboundedReceiver<StateChange>,
    }

    fn endpoint() -> Endpoint {
        Endpoint::parse("ws://bingo.test/ws/bingo/game/room1/").expect("endpoint")
    }

    fn start(script: impl IntoIterator<Item = Script>) -> Harness {
        let connector = ScriptedConnector::with_script(script);
        let (event_tx, events) = mpsc::unbounded_channel();
        let (change_tx, changes) = mpsc::unbounded_channel();

        let handle = ConnectionHandle::spawn(
            endpoint(),
            ReconnectPolicy::default(),
            Arc::new(connector.clone()),
            Some(Box::new(move |event| {
                let _ = event_tx.send(event);
            })),
            Some(Box::new(move |change| {
                let _ = change_tx.send(change);
            })),
        );

        Harness {
            handle,
            connector,
            events,
            changes,
        }
    }

    impl Harness {
        async fn next_change(&mut self) -> StateChange {
            self.changes.recv().await.expect("state change")
        }

        async fn expect_open(&mut self) {
            assert_eq!(self.next_change().await, StateChange::Open);
        }

        /// Collects state changes until the terminal notice.
        async fn until_exhausted(&mut self) -> Vec<StateChange> {
            let mut seen = Vec::new();
            loop {
                let change = self.next_change().await;
                let terminal = change.is_terminal();
                seen.push(change);
                if terminal {
                    return seen;
                }
            }
        }
    }

    fn retry_delay() -> Duration {
        ReconnectPolicy::default().retry_delay
    }

    // ------------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_drop_below_budget() {
        let mut h = start([Script::Accept, Script::Refuse, Script::Refuse, Script::Accept]);

        h.expect_open().await;
        h.connector.take_server().drop_connection();

        // Two failed retries, then success on the third.
        h.expect_open_after_failures(3).await;
        assert_eq!(h.handle.state(), ConnectionState::Open);
        assert_eq!(h.handle.retry_count(), 0);

        let attempts = h.connector.attempts();
        assert_eq!(attempts.len(), 4);
        for pair in attempts[1..].windows(2) {
            assert!(pair[1] - pair[0] >= retry_delay());
        }
        assert!(attempts[1] - attempts[0] >= retry_delay());
    }

    impl Harness {
        /// Expects `closes` Closed notifications followed by Open.
        async fn expect_open_after_failures(&mut self, closes: usize) {
            for _ in 0..closes {
                match self.next_change().await {
                    StateChange::Closed { will_retry, .. } => assert!(will_retry),
                    other => panic!("expected Closed, got {other:?}"),
                }
            }
            self.expect_open().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let mut h = start([Script::Accept]);

        h.expect_open().await;
        h.connector.take_server().drop_connection();

        let seen = h.until_exhausted().await;
        assert_eq!(seen.last(), Some(&StateChange::RetriesExhausted { attempts: 5 }));

        // The drop plus five failed retries, only the last without a retry.
        let closes: Vec<bool> = seen
            .iter()
            .filter_map(|c| match c {
                StateChange::Closed { will_retry, .. } => Some(*will_retry),
                _ => None,
            })
            .collect();
        assert_eq!(closes, vec![true, true, true, true, true, false]);

        // Initial connect plus exactly five retries; no sixth retry later.
        assert_eq!(h.connector.attempt_count(), 6);
        tokio::time::sleep(retry_delay() * 10).await;
        assert_eq!(h.connector.attempt_count(), 6);

        assert!(h.handle.is_exhausted());
        assert_eq!(h.handle.state(), ConnectionState::Closed);
        h.handle.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_tries_attempt_after_budget_even_if_reachable() {
        // Reachable again on the notional sixth retry.
        let mut h = start([
            Script::Accept,
            Script::Refuse,
            Script::Refuse,
            Script::Refuse,
            Script::Refuse,
            Script::Refuse,
            Script::Accept,
        ]);

        h.expect_open().await;
        h.connector.take_server().drop_connection();

        let seen = h.until_exhausted().await;
        assert!(!seen.contains(&StateChange::Open));
        assert_eq!(h.connector.attempt_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_resets_retry_budget() {
        // Fail once, reconnect, then fail five more times.
        let mut h = start([Script::Accept, Script::Refuse, Script::Accept]);

        h.expect_open().await;
        h.connector.take_server().drop_connection();
        h.expect_open_after_failures(2).await;
        assert_eq!(h.connector.attempt_count(), 3);

        h.connector.take_server().drop_connection();
        let seen = h.until_exhausted().await;
        assert_eq!(seen.last(), Some(&StateChange::RetriesExhausted { attempts: 5 }));

        // Five more attempts, not four.
        assert_eq!(h.connector.attempt_count(), 3 + 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_connect_failure_enters_retry_path() {
        let mut h = start([Script::Refuse, Script::Accept]);

        match h.next_change().await {
            StateChange::Closed {
                reason: CloseReason::ConnectFailed(_),
                will_retry: true,
            } => {}
            other => panic!("expected failed connect, got {other:?}"),
        }
        h.expect_open().await;
        assert_eq!(h.connector.attempt_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_closed_returns_false() {
        let mut h = start([Script::Refuse]);

        let _ = h.next_change().await;
        assert_eq!(h.handle.state(), ConnectionState::Closed);

        let action = OutboundAction::start_countdown("room1");
        assert!(!h.handle.send(&action));
        assert!(matches!(
            h.handle.try_send(&action),
            Err(Error::NotConnected { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_open_reaches_server() {
        let mut h = start([Script::Accept]);
        h.expect_open().await;
        let mut server = h.connector.take_server();

        assert!(h.handle.send(&OutboundAction::get_state()));

        let text = server.from_client.recv().await.expect("frame");
        assert_eq!(text, r#"{"type":"get_state"}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_handler_can_send_on_every_open() {
        let connector = ScriptedConnector::with_script([Script::Accept, Script::Accept]);
        let handle = ConnectionHandle::spawn(
            endpoint(),
            ReconnectPolicy::default(),
            Arc::new(connector.clone()),
            None,
            None,
        );

        let (change_tx, mut changes) = mpsc::unbounded_channel();
        let sender = handle.clone();
        handle.set_state_handler(Box::new(move |change| {
            if change == StateChange::Open {
                assert!(sender.send(&OutboundAction::get_state()));
            }
            let _ = change_tx.send(change);
        }));

        assert_eq!(changes.recv().await, Some(StateChange::Open));
        let mut first = connector.take_server();
        assert_eq!(
            first.from_client.recv().await.as_deref(),
            Some(r#"{"type":"get_state"}"#)
        );

        first.drop_connection();
        assert!(matches!(
            changes.recv().await,
            Some(StateChange::Closed { will_retry: true, .. })
        ));

        assert_eq!(changes.recv().await, Some(StateChange::Open));
        let mut second = connector.take_server();
        assert_eq!(
            second.from_client.recv().await.as_deref(),
            Some(r#"{"type":"get_state"}"#)
        );

        handle.close();
        handle.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_reconnect() {
        let mut h = start([Script::Accept, Script::Accept]);

        h.expect_open().await;
        h.connector.take_server().drop_connection();

        match h.next_change().await {
            StateChange::Closed { will_retry, .. } => assert!(will_retry),
            other => panic!("expected Closed, got {other:?}"),
        }

        // Timer is pending now.
        h.handle.close();
        h.handle.stopped().await;

        tokio::time::sleep(retry_delay() * 3).await;
        assert_eq!(h.connector.attempt_count(), 1);
        assert_eq!(h.handle.state(), ConnectionState::Closed);
        assert!(!h.handle.is_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_open_does_not_reconnect() {
        let mut h = start([Script::Accept, Script::Accept]);
        h.expect_open().await;
        let _server = h.connector.take_server();

        h.handle.close();
        assert_eq!(
            h.next_change().await,
            StateChange::Closed {
                reason: CloseReason::Requested,
                will_retry: false,
            }
        );
        h.handle.stopped().await;

        tokio::time::sleep(retry_delay() * 3).await;
        assert_eq!(h.connector.attempt_count(), 1);
        assert!(!h.handle.send(&OutboundAction::get_state()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_close_triggers_reconnect() {
        let mut h = start([Script::Accept, Script::Accept]);
        h.expect_open().await;

        let server = h.connector.take_server();
        let _ = server.to_client.send(Ok(Frame::Close {
            code: Some(1001),
            reason: "going away".into(),
        }));

        match h.next_change().await {
            StateChange::Closed {
                reason: CloseReason::Remote { code, .. },
                will_retry,
            } => {
                assert_eq!(code, Some(1001));
                assert!(will_retry);
            }
            other => panic!("expected remote close, got {other:?}"),
        }
        h.expect_open().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_message_does_not_stop_delivery() {
        let mut h = start([Script::Accept]);
        h.expect_open().await;
        let server = h.connector.take_server();

        server.push(r#"{"type": "toast", "message": "first"}"#);
        server.push("{this is not json");
        server.push("42");
        server.push(r#"{"type": "toast", "message": "second"}"#);

        let first = h.events.recv().await.expect("first event");
        let second = h.events.recv().await.expect("second event");
        assert_eq!(first.get("message"), Some(&"first".into()));
        assert_eq!(second.get("message"), Some(&"second".into()));
        assert_eq!(h.handle.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_delivered_in_arrival_order() {
        let mut h = start([Script::Accept]);
        h.expect_open().await;
        let server = h.connector.take_server();

        for n in 1..=20 {
            server.push(&format!(r#"{{"type": "number_called", "number": {n}}}"#));
        }

        for n in 1..=20u32 {
            let event = h.events.recv().await.expect("event");
            assert_eq!(event.get("number"), Some(&n.into()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_connect_attempt() {
        struct Hanging;

        #[async_trait]
        impl Connector for Hanging {
            async fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
                std::future::pending().await
            }
        }

        let (change_tx, mut changes) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::spawn(
            endpoint(),
            ReconnectPolicy::default().with_connect_timeout(Duration::from_secs(600)),
            Arc::new(Hanging),
            None,
            Some(Box::new(move |change| {
                let _ = change_tx.send(change);
            })),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), ConnectionState::Connecting);

        handle.close();
        handle.stopped().await;
        assert_eq!(
            changes.recv().await,
            Some(StateChange::Closed {
                reason: CloseReason::Requested,
                will_retry: false,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_counts_as_failure() {
        struct Hanging;

        #[async_trait]
        impl Connector for Hanging {
            async fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
                std::future::pending().await
            }
        }

        let (change_tx, mut changes) = mpsc::unbounded_channel();
        let _handle = ConnectionHandle::spawn(
            endpoint(),
            ReconnectPolicy::fixed(1, Duration::from_secs(1))
                .with_connect_timeout(Duration::from_secs(2)),
            Arc::new(Hanging),
            None,
            Some(Box::new(move |change| {
                let _ = change_tx.send(change);
            })),
        );

        match changes.recv().await {
            Some(StateChange::Closed {
                reason: CloseReason::ConnectFailed(message),
                will_retry: true,
            }) => assert!(message.contains("timeout")),
            other => panic!("expected timed out attempt, got {other:?}"),
        }
        assert!(matches!(
            changes.recv().await,
            Some(StateChange::Closed { will_retry: false, .. })
        ));
        assert_eq!(
            changes.recv().await,
            Some(StateChange::RetriesExhausted { attempts: 1 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_every_handle_stops_task() {
        let mut h = start([Script::Accept]);
        h.expect_open().await;
        let _server = h.connector.take_server();

        drop(h.handle);
        assert_eq!(
            h.changes.recv().await,
            Some(StateChange::Closed {
                reason: CloseReason::Requested,
                will_retry: false,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_registration() {
        let mut h = start([Script::Accept]);
        h.expect_open().await;
        let server = h.connector.take_server();

        h.handle.clear_event_handler();
        server.push(r#"{"type": "toast", "message": "unseen"}"#);
        tokio::time::sleep(Duration::from_millis(1)).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.handle.set_event_handler(Box::new(move |event| {
            let _ = tx.send(event.kind().to_string());
        }));
        server.push(r#"{"type": "game_reset"}"#);

        assert_eq!(rx.recv().await.as_deref(), Some("game_reset"));
        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("héllo", 2), "h");
    }
}
