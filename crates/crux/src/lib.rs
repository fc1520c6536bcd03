//! # Crux
//!
//! Client-side network core for the Crux space simulation.
//!
//! Crux keeps one WebSocket connection to the simulation server, decodes
//! the binary world snapshots it receives, publishes them for rendering
//! code to read, and sends the local player's position back, throttled
//! so only meaningful movement goes out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crux::prelude::*;
//!
//! # async fn run() -> Result<(), CruxError> {
//! let manager = ConnectionManager::builder()
//!     .url("ws://localhost:8080")
//!     .build()?;
//! let mut reader = manager.reader();
//! manager.connect()?;
//!
//! let status = reader.wait_for(|s| s.game_state.is_some()).await;
//! if let Some(world) = status.and_then(|s| s.game_state) {
//!     println!("{} planets", world.planets().len());
//! }
//!
//! let mut throttle = PositionThrottle::default();
//! throttle.offer_now(&manager, Position::new(1.0, 0.0, 0.0), true);
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::CruxError;

/// Re-exports of everything a client usually needs.
pub mod prelude {
    pub use crate::CruxError;
    pub use crux_client::{
        ClientConfig, ClientError, ClientStatus, ConnectionManager, ConnectionState,
        PositionSink, PositionThrottle, StateReader, ThrottleConfig, ThrottleDecision,
    };
    pub use crux_protocol::{
        Color, DecodeError, GameState, Planet, Player, Position, decode_game_state,
        encode_position,
    };
    pub use crux_transport::{Connection, Connector, Frame, TransportError};
}
