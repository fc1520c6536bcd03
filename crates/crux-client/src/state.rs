//! Process-wide client state: one writer, many readers.
//!
//! [`SharedState`] is the only place the current snapshot, the connected
//! flag, and the last error live. Its mutating methods are crate-private,
//! so only the connection manager can write. Everyone else gets a
//! [`StateReader`].
//!
//! The status lives in a `tokio::sync::watch` channel and is swapped as a
//! whole, so a reader sees it either before or after a write. Readers can
//! `await` the next change instead of polling every frame.
//!
//! The snapshot itself is an `Arc<GameState>`. Readers share it and can
//! only read it; a newer snapshot arrives as a brand new `Arc`, so a frame
//! that is still rendering the old one is not affected.

use std::sync::Arc;

use crux_protocol::GameState;
use tokio::sync::watch;

use crate::ConnectionState;

/// Everything presentation code may observe about the client, captured
/// at one instant.
#[derive(Debug, Clone, Default)]
pub struct ClientStatus {
    /// The latest decoded snapshot, if any arrived yet.
    pub game_state: Option<Arc<GameState>>,
    /// Current lifecycle state.
    pub connection: ConnectionState,
    /// The most recent error, as display text.
    pub last_error: Option<String>,
}

impl ClientStatus {
    /// The "connected" flag: `true` iff the connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }
}

// ---------------------------------------------------------------------------
// SharedState (writer side)
// ---------------------------------------------------------------------------

/// The writer half. Owned by the connection manager.
#[derive(Debug)]
pub(crate) struct SharedState {
    tx: watch::Sender<ClientStatus>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ClientStatus::default());
        Self { tx }
    }

    pub(crate) fn reader(&self) -> StateReader {
        StateReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Replaces the published snapshot wholesale.
    pub(crate) fn publish_game_state(&self, state: Arc<GameState>) {
        self.tx.send_modify(|s| s.game_state = Some(state));
    }

    pub(crate) fn set_connection(&self, connection: ConnectionState) {
        self.tx.send_if_modified(|s| {
            let changed = s.connection != connection;
            s.connection = connection;
            changed
        });
    }

    pub(crate) fn record_error(&self, message: String) {
        self.tx.send_modify(|s| s.last_error = Some(message));
    }

    /// Publishes a failure: the new connection state and its error in one
    /// update.
    pub(crate) fn fail(&self, connection: ConnectionState, message: String) {
        self.tx.send_modify(|s| {
            s.connection = connection;
            s.last_error = Some(message);
        });
    }

    /// Publishes a freshly opened connection: `Open` with no error, in one
    /// update.
    pub(crate) fn mark_open(&self) {
        self.tx.send_modify(|s| {
            s.connection = ConnectionState::Open;
            s.last_error = None;
        });
    }

    /// Drops everything and publishes `connection` as the only fact left.
    pub(crate) fn reset(&self, connection: ConnectionState) {
        self.tx.send_replace(ClientStatus {
            game_state: None,
            connection,
            last_error: None,
        });
    }
}

// ---------------------------------------------------------------------------
// StateReader (read-only projection)
// ---------------------------------------------------------------------------

/// A read-only, cloneable view of the shared client state.
///
/// Cheap to clone; hand one to every system that needs to render or
/// display connection status.
#[derive(Debug, Clone)]
pub struct StateReader {
    rx: watch::Receiver<ClientStatus>,
}

impl StateReader {
    /// A consistent copy of everything at once.
    pub fn status(&self) -> ClientStatus {
        self.rx.borrow().clone()
    }

    /// The latest snapshot, if one has been decoded.
    pub fn game_state(&self) -> Option<Arc<GameState>> {
        self.rx.borrow().game_state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.rx.borrow().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.rx.borrow().connection
    }

    pub fn last_error(&self) -> Option<String> {
        self.rx.borrow().last_error.clone()
    }

    /// Waits until something changes since this reader last looked.
    ///
    /// Returns `false` once the connection manager is gone and nothing
    /// will ever change again.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until `predicate` holds for the current status (checked
    /// immediately, then after every change) and returns that status.
    ///
    /// Returns `None` if the connection manager is dropped first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&ClientStatus) -> bool,
    ) -> Option<ClientStatus> {
        self.rx
            .wait_for(|s| predicate(s))
            .await
            .ok()
            .map(|s| (*s).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_protocol::Position;

    fn empty_state(at: f32) -> Arc<GameState> {
        Arc::new(GameState::new(Vec::new(), Vec::new(), Position::new(at, at, at)))
    }

    #[test]
    fn test_initial_status_is_empty() {
        let shared = SharedState::new();
        let reader = shared.reader();
        assert!(reader.game_state().is_none());
        assert!(!reader.is_connected());
        assert_eq!(reader.connection_state(), ConnectionState::Idle);
        assert!(reader.last_error().is_none());
    }

    #[test]
    fn test_publish_replaces_snapshot_wholesale() {
        let shared = SharedState::new();
        let reader = shared.reader();

        shared.publish_game_state(empty_state(1.0));
        let first = reader.game_state().unwrap();

        shared.publish_game_state(empty_state(2.0));
        let second = reader.game_state().unwrap();

        // The old Arc a reader still holds is untouched.
        assert_eq!(first.initial_player_location(), Position::new(1.0, 1.0, 1.0));
        assert_eq!(second.initial_player_location(), Position::new(2.0, 2.0, 2.0));
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_connected_flag_follows_state() {
        let shared = SharedState::new();
        let reader = shared.reader();
        shared.set_connection(ConnectionState::Connecting);
        assert!(!reader.is_connected());
        shared.set_connection(ConnectionState::Open);
        assert!(reader.is_connected());
        assert!(reader.status().is_connected());
    }

    #[test]
    fn test_mark_open_clears_error_with_state() {
        let shared = SharedState::new();
        let reader = shared.reader();
        shared.set_connection(ConnectionState::Connecting);
        shared.record_error("connection refused".into());
        assert_eq!(reader.last_error().as_deref(), Some("connection refused"));

        shared.mark_open();
        let status = reader.status();
        assert_eq!(status.connection, ConnectionState::Open);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn test_fail_sets_state_and_error_together() {
        let shared = SharedState::new();
        let reader = shared.reader();
        shared.set_connection(ConnectionState::Open);
        shared.fail(ConnectionState::Idle, "connection reset".into());
        let status = reader.status();
        assert_eq!(status.connection, ConnectionState::Idle);
        assert_eq!(status.last_error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_reset_drops_everything() {
        let shared = SharedState::new();
        let reader = shared.reader();
        shared.publish_game_state(empty_state(1.0));
        shared.set_connection(ConnectionState::Open);
        shared.record_error("boom".into());

        shared.reset(ConnectionState::Closed);
        let status = reader.status();
        assert!(status.game_state.is_none());
        assert!(status.last_error.is_none());
        assert_eq!(status.connection, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_changed_wakes_on_publish() {
        let shared = SharedState::new();
        let mut reader = shared.reader();
        shared.publish_game_state(empty_state(3.0));
        assert!(reader.changed().await);
        assert!(reader.game_state().is_some());
    }

    #[tokio::test]
    async fn test_setting_same_state_does_not_notify() {
        let shared = SharedState::new();
        let mut reader = shared.reader();
        shared.set_connection(ConnectionState::Idle);
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            reader.changed(),
        )
        .await;
        assert!(waited.is_err(), "no change should have been signalled");
    }

    #[tokio::test]
    async fn test_wait_for_returns_none_when_writer_dropped() {
        let shared = SharedState::new();
        let mut reader = shared.reader();
        drop(shared);
        assert!(reader.wait_for(|s| s.is_connected()).await.is_none());
    }
}
