//! Client-side connection core for Crux.
//!
//! This crate sits between the transport and whatever renders the world:
//!
//! 1. **Connection lifecycle**: one logical connection driven through an
//!    explicit state machine ([`ConnectionManager`], [`ConnectionState`])
//! 2. **Shared state**: the latest snapshot, the connected flag, and the
//!    last error, readable from anywhere ([`StateReader`])
//! 3. **Outbound throttle**: decides which local position samples are
//!    worth sending ([`PositionThrottle`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Presentation (above)  ← reads StateReader, offers positions, calls reconnect()
//!     ↕
//! Client layer (this crate)  ← lifecycle, snapshot publishing, throttling
//!     ↕
//! Protocol + Transport (below)  ← bytes ↔ GameState, frames over a socket
//! ```

mod config;
mod error;
mod machine;
mod manager;
mod state;
mod throttle;

pub use config::{ClientConfig, ThrottleConfig, DEFAULT_SERVER_URL};
pub use error::ClientError;
pub use machine::{transition, Action, ConnectionState, LinkEvent, Transition};
pub use manager::{ConnectionManager, ConnectionManagerBuilder, Generation};
pub use state::{ClientStatus, StateReader};
pub use throttle::{
    throttle_check, LastSent, PositionSink, PositionThrottle, Suppression, ThrottleDecision,
};
