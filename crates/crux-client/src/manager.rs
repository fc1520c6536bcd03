//! The connection manager: owns the one logical connection to the server.
//!
//! It is responsible for:
//! - Starting connection attempts, never more than one live at a time
//! - Driving the lifecycle through the [`transition`] table
//! - Decoding inbound snapshots and publishing them to the shared state
//! - Writing outbound position updates while the connection is open
//!
//! # Tasks and generations
//!
//! Each attempt runs on its own Tokio task (the "link task"), which owns
//! the transport connection. Callers never touch the transport; they talk
//! to the link task through an unbounded channel.
//!
//! Every attempt is tagged with a generation number. `connect()`,
//! `disconnect()` and `shutdown()` all bump it. The link task reports
//! events together with its generation, and anything reported under an
//! old generation is ignored. A superseded attempt can finish opening,
//! fail, or deliver a frame late, and none of it reaches the shared state.
//!
//! ```text
//!  connect() ──spawn──→ link task (gen N) ──on_open/on_frame/...──→ Inner
//!                          ↑                                         │
//!  send_position() ──Outbound::Position──┘      gen == N ? apply : ignore
//! ```

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crux_protocol::{decode_game_state, encode_position, Position, POSITION_WIRE_SIZE};
use crux_transport::{Connection, ConnectionId, Connector, Frame, WebSocketConnector};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::machine::{transition, Action, LinkEvent, Transition};
use crate::state::SharedState;
use crate::{ClientConfig, ClientError, ConnectionState, PositionSink, StateReader, ThrottleConfig};

/// Tag identifying one connection attempt.
///
/// Returned by [`ConnectionManager::connect`]. Calling `connect()` while
/// an attempt is live returns the live attempt's generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// Commands from callers to the link task.
enum Outbound {
    Position([u8; POSITION_WIRE_SIZE]),
    Close,
}

/// The caller side of a live link task. Dropping it ends the task.
struct Link {
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// Everything guarded by the control lock.
struct Control {
    state: ConnectionState,
    generation: u64,
    link: Option<Link>,
}

/// State shared between the manager handles and the link task.
///
/// The link task only holds a `Weak` to this, so dropping the last
/// manager handle drops the `Link`, which in turn ends the task.
struct Inner {
    config: ClientConfig,
    control: Mutex<Control>,
    shared: SharedState,
}

impl Inner {
    /// Applies one row of the transition table and mirrors the new state
    /// into the shared state.
    fn step(&self, control: &mut Control, event: LinkEvent) -> Transition {
        self.apply(control, event, None)
    }

    /// [`step`](Self::step), publishing `error` together with the new state
    /// when the row says to record it. Opening and clearing the last error
    /// also go out as one update.
    fn apply(
        &self,
        control: &mut Control,
        event: LinkEvent,
        error: Option<String>,
    ) -> Transition {
        let t = transition(control.state, event);
        if t.next != control.state {
            debug!(
                from = %control.state,
                to = %t.next,
                ?event,
                generation = control.generation,
                "connection state change"
            );
            control.state = t.next;
        }
        match (t.action, error) {
            (Action::RecordError, Some(message)) => self.shared.fail(t.next, message),
            (Action::MarkOpen, _) => self.shared.mark_open(),
            _ => self.shared.set_connection(t.next),
        }
        t
    }

    /// The transport finished opening. Returns `false` if this attempt was
    /// superseded and the connection should be closed again.
    fn on_open(&self, generation: u64, id: ConnectionId) -> bool {
        let mut control = self.control.lock();
        if control.generation != generation {
            debug!(%id, generation, "open from superseded attempt");
            return false;
        }
        if self.step(&mut control, LinkEvent::Opened).action != Action::MarkOpen {
            return false;
        }
        info!(%id, generation, url = %self.config.url, "connected");
        true
    }

    fn on_frame(&self, generation: u64, frame: Frame) {
        match frame {
            Frame::Binary(data) => {
                // Decoding is pure, so do it before taking the lock.
                let decoded = decode_game_state(&data);

                let mut control = self.control.lock();
                if control.generation != generation {
                    trace!(generation, bytes = data.len(), "frame from superseded attempt");
                    return;
                }
                if self.step(&mut control, LinkEvent::BinaryFrame).action
                    != Action::DecodeSnapshot
                {
                    return;
                }
                match decoded {
                    Ok(state) => {
                        debug!(
                            bytes = data.len(),
                            planets = state.planets().len(),
                            players = state.players().len(),
                            "snapshot received"
                        );
                        self.shared.publish_game_state(Arc::new(state));
                    }
                    Err(e) => {
                        // The previous snapshot stays published.
                        let err = ClientError::from(e);
                        warn!(bytes = data.len(), error = %err, "dropping undecodable snapshot");
                        self.shared.record_error(err.to_string());
                    }
                }
            }
            Frame::Text(text) => {
                let mut control = self.control.lock();
                if control.generation != generation {
                    return;
                }
                if self.step(&mut control, LinkEvent::TextFrame).action == Action::LogText {
                    info!(generation, message = %text, "server message");
                }
            }
        }
    }

    fn on_failed(&self, generation: u64, err: ClientError) {
        let mut control = self.control.lock();
        if control.generation != generation {
            debug!(generation, error = %err, "error from superseded attempt");
            return;
        }
        let t = self.apply(&mut control, LinkEvent::Failed, Some(err.to_string()));
        if t.action == Action::RecordError {
            control.link = None;
            warn!(generation, error = %err, "connection failed");
        }
    }

    fn on_closed(&self, generation: u64) {
        let mut control = self.control.lock();
        if control.generation != generation {
            return;
        }
        if self.step(&mut control, LinkEvent::Closed).action == Action::ReleaseLink {
            control.link = None;
            info!(generation, "connection closed by server");
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`ConnectionManager`].
///
/// # Example
///
/// ```rust,no_run
/// use crux_client::ConnectionManager;
///
/// # async fn run() -> Result<(), crux_client::ClientError> {
/// let manager = ConnectionManager::builder()
///     .url("ws://localhost:8080")
///     .build()?;
/// manager.connect()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionManagerBuilder {
    config: ClientConfig,
    runtime: Option<Handle>,
}

impl ConnectionManagerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the server URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Sets the pause before each attempt opens the transport.
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.config.connect_delay = delay;
        self
    }

    /// Sets the outbound throttle limits.
    pub fn throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.config.throttle = throttle;
        self
    }

    /// Runs link tasks on `handle` instead of the ambient runtime.
    ///
    /// Lets a render or UI thread that is not itself inside Tokio own the
    /// manager.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds a manager that connects over WebSocket.
    pub fn build(self) -> Result<ConnectionManager<WebSocketConnector>, ClientError> {
        self.build_with(WebSocketConnector::new())
    }

    /// Builds a manager that opens connections with `connector`.
    ///
    /// # Errors
    /// [`ClientError::NoRuntime`] if no runtime handle was given and this
    /// is not called from within a Tokio runtime.
    pub fn build_with<C: Connector>(
        self,
        connector: C,
    ) -> Result<ConnectionManager<C>, ClientError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| ClientError::NoRuntime)?,
        };

        Ok(ConnectionManager {
            connector: Arc::new(connector),
            runtime,
            inner: Arc::new(Inner {
                config: self.config.validated(),
                control: Mutex::new(Control {
                    state: ConnectionState::Idle,
                    generation: 0,
                    link: None,
                }),
                shared: SharedState::new(),
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Owns the client's single connection to the simulation server.
///
/// Cloning is cheap and every clone controls the same connection.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ Connecting ──→ Open ──→ (server closes / error) ──→ Idle
///                   │            │
///                   └── disconnect() / reconnect() ──→ Idle (──→ Connecting)
/// ```
pub struct ConnectionManager<C: Connector = WebSocketConnector> {
    connector: Arc<C>,
    runtime: Handle,
    inner: Arc<Inner>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            runtime: self.runtime.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConnectionManager<WebSocketConnector> {
    /// Creates a new builder.
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Starts a connection attempt unless one is already live.
    ///
    /// Returns immediately; the attempt runs in the background. Watch a
    /// [`StateReader`] to learn when it opens or fails.
    ///
    /// # Errors
    /// [`ClientError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn connect(&self) -> Result<Generation, ClientError> {
        let mut control = self.inner.control.lock();
        self.connect_locked(&mut control)
    }

    /// Closes the live connection or abandons the live attempt.
    ///
    /// The state becomes `Idle` immediately; the transport finishes closing
    /// in the background. Does nothing if there is nothing to close.
    pub fn disconnect(&self) {
        let mut control = self.inner.control.lock();
        if self.close_locked(&mut control, LinkEvent::Disconnect) {
            info!(generation = control.generation, "disconnected");
        }
    }

    /// Force-closes whatever is live, then connects again.
    ///
    /// Safe to call repeatedly: each call supersedes the previous attempt,
    /// whose socket is closed, so at most one attempt is ever live.
    pub fn reconnect(&self) -> Result<Generation, ClientError> {
        let mut control = self.inner.control.lock();
        self.close_locked(&mut control, LinkEvent::Disconnect);
        let generation = self.connect_locked(&mut control)?;
        info!(%generation, url = %self.inner.config.url, "reconnecting");
        Ok(generation)
    }

    /// Tears the client down for good.
    ///
    /// Closes any live connection, clears the shared state, and moves to
    /// `Closed`. Later `connect()` calls fail with [`ClientError::ShutDown`].
    pub fn shutdown(&self) {
        let mut control = self.inner.control.lock();
        if self.close_locked(&mut control, LinkEvent::Shutdown) {
            self.inner.shared.reset(ConnectionState::Closed);
            info!("connection manager shut down");
        }
    }

    /// Sends one position update if, and only if, the connection is open.
    ///
    /// Returns `true` when the 12-byte update was handed to the transport.
    /// When the connection is not open the sample is dropped, not queued,
    /// and this returns `false`.
    pub fn send_position(&self, x: f32, y: f32, z: f32) -> bool {
        let control = self.inner.control.lock();
        if !control.state.is_open() {
            trace!(state = %control.state, "not open, dropping position");
            return false;
        }
        let Some(link) = &control.link else {
            return false;
        };
        link.outbound
            .send(Outbound::Position(encode_position(x, y, z)))
            .is_ok()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.control.lock().state
    }

    /// `true` iff the state is `Open`.
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Generation of the most recent attempt (or close).
    pub fn generation(&self) -> Generation {
        Generation(self.inner.control.lock().generation)
    }

    /// A read-only view of the shared state for presentation code.
    pub fn reader(&self) -> StateReader {
        self.inner.shared.reader()
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    fn connect_locked(&self, control: &mut Control) -> Result<Generation, ClientError> {
        match self.inner.step(control, LinkEvent::Connect).action {
            Action::StartAttempt => {
                control.generation += 1;
                let generation = control.generation;
                let (tx, rx) = mpsc::unbounded_channel();
                control.link = Some(Link { outbound: tx });

                debug!(generation, url = %self.inner.config.url, "starting connection attempt");
                self.runtime.spawn(run_link(
                    Arc::clone(&self.connector),
                    Arc::downgrade(&self.inner),
                    generation,
                    rx,
                ));
                Ok(Generation(generation))
            }
            Action::Refuse => Err(ClientError::ShutDown),
            _ => {
                trace!(state = %control.state, "connection already live");
                Ok(Generation(control.generation))
            }
        }
    }

    /// Returns `true` if something was closed.
    fn close_locked(&self, control: &mut Control, event: LinkEvent) -> bool {
        if self.inner.step(control, event).action != Action::CloseLink {
            return false;
        }
        control.generation += 1;
        if let Some(link) = control.link.take() {
            // The task may already be gone; that's fine.
            let _ = link.outbound.send(Outbound::Close);
        }
        true
    }
}

impl<C: Connector> PositionSink for ConnectionManager<C> {
    fn send(&self, position: Position) -> bool {
        self.send_position(position.x, position.y, position.z)
    }
}

impl<C: Connector> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let control = self.inner.control.lock();
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.config.url)
            .field("state", &control.state)
            .field("generation", &control.generation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Link task
// ---------------------------------------------------------------------------

fn notify(inner: &Weak<Inner>, f: impl FnOnce(&Inner)) {
    if let Some(inner) = inner.upgrade() {
        f(&inner);
    }
}

/// Runs one connection attempt from open to close.
///
/// Frames are handled one at a time in arrival order, so a snapshot is
/// never overwritten by one that arrived before it.
async fn run_link<C: Connector>(
    connector: Arc<C>,
    inner: Weak<Inner>,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let Some((url, delay)) = inner
        .upgrade()
        .map(|i| (i.config.url.clone(), i.config.connect_delay))
    else {
        return;
    };

    let opening = async {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        connector.connect(&url).await
    };

    // Before the connection opens the only possible command is Close (or
    // the link being dropped), so either one abandons the attempt.
    let result = tokio::select! {
        result = opening => result,
        _ = outbound.recv() => {
            debug!(generation, "connection attempt abandoned");
            return;
        }
    };

    let conn = match result {
        Ok(conn) => conn,
        Err(e) => {
            notify(&inner, |i| i.on_failed(generation, e.into()));
            return;
        }
    };

    let id = conn.id();
    let accepted = inner
        .upgrade()
        .is_some_and(|i| i.on_open(generation, id));
    if !accepted {
        if let Err(e) = conn.close().await {
            debug!(%id, error = %e, "close of superseded connection failed");
        }
        return;
    }

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Position(bytes)) => {
                    if let Err(e) = conn.send(&bytes).await {
                        notify(&inner, |i| i.on_failed(generation, e.into()));
                        break;
                    }
                    trace!(%id, "position update sent");
                }
                Some(Outbound::Close) | None => {
                    debug!(%id, generation, "closing transport");
                    if let Err(e) = conn.close().await {
                        debug!(%id, error = %e, "close failed");
                    }
                    break;
                }
            },
            frame = conn.recv() => match frame {
                Ok(Some(frame)) => notify(&inner, |i| i.on_frame(generation, frame)),
                Ok(None) => {
                    notify(&inner, |i| i.on_closed(generation));
                    break;
                }
                Err(e) => {
                    notify(&inner, |i| i.on_failed(generation, e.into()));
                    break;
                }
            },
        }
    }
}
