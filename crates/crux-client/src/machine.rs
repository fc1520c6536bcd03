//! Connection lifecycle state machine.
//!
//! Every lifecycle change goes through [`transition`], a single table of
//! `(state, event) → (next state, action)`. The connection manager looks
//! up the row, stores the new state, and carries out the action. There
//! are no other places where the state is changed.
//!
//! ```text
//!            connect()                on_open
//!   Idle ───────────────→ Connecting ─────────→ Open
//!    ↑                        │                  │
//!    ├──── on_error ──────────┤                  │
//!    ├──── disconnect() ──────┘                  │
//!    └──── on_close / on_error / disconnect() ───┘
//!
//!   any state ── shutdown() ──→ Closed   (terminal)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the single logical connection currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Idle,
    /// An attempt is in flight; the transport is not usable yet.
    Connecting,
    /// The transport is open. Snapshots arrive, positions may be sent.
    Open,
    /// The manager was shut down and will never connect again.
    Closed,
}

impl ConnectionState {
    /// `true` only for [`ConnectionState::Open`]. This is the "connected"
    /// flag presentation code shows.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// `true` while an attempt or a connection exists.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Something that happened to the connection.
///
/// The first three come from callers, the rest from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// `connect()` or the second half of `reconnect()`.
    Connect,
    /// `disconnect()` or the first half of `reconnect()`.
    Disconnect,
    /// `shutdown()`.
    Shutdown,
    /// The transport finished opening.
    Opened,
    /// A binary frame arrived.
    BinaryFrame,
    /// A text frame arrived.
    TextFrame,
    /// The transport reported an error.
    Failed,
    /// The transport closed (either side).
    Closed,
}

/// What the manager must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing.
    None,
    /// Bump the generation and spawn a new attempt.
    StartAttempt,
    /// An attempt or connection is already live; hand back its generation.
    ReuseAttempt,
    /// Refuse: the manager is shut down.
    Refuse,
    /// Mark connected and clear the last error.
    MarkOpen,
    /// Decode the payload and publish the snapshot.
    DecodeSnapshot,
    /// Log the text payload.
    LogText,
    /// Record the error and drop the link.
    RecordError,
    /// Drop the link; the transport is already gone.
    ReleaseLink,
    /// Bump the generation and close the transport.
    CloseLink,
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ConnectionState,
    pub action: Action,
}

/// Looks up the transition for `event` in `state`.
///
/// Events that make no sense in a state (a frame while `Idle`, an open
/// while already `Open`) leave the state alone and do nothing.
pub fn transition(state: ConnectionState, event: LinkEvent) -> Transition {
    use ConnectionState::{Closed, Connecting, Idle, Open};

    let (next, action) = match (state, event) {
        (Closed, LinkEvent::Connect) => (Closed, Action::Refuse),
        (Closed, _) => (Closed, Action::None),
        (_, LinkEvent::Shutdown) => (Closed, Action::CloseLink),

        (Idle, LinkEvent::Connect) => (Connecting, Action::StartAttempt),
        (Connecting | Open, LinkEvent::Connect) => (state, Action::ReuseAttempt),

        (Connecting, LinkEvent::Opened) => (Open, Action::MarkOpen),
        (Open, LinkEvent::BinaryFrame) => (Open, Action::DecodeSnapshot),
        (Open, LinkEvent::TextFrame) => (Open, Action::LogText),

        (Connecting | Open, LinkEvent::Failed) => (Idle, Action::RecordError),
        (Connecting | Open, LinkEvent::Closed) => (Idle, Action::ReleaseLink),
        (Connecting | Open, LinkEvent::Disconnect) => (Idle, Action::CloseLink),

        (state, _) => (state, Action::None),
    };

    Transition { next, action }
}
