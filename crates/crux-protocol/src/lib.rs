//! Wire protocol for Crux.
//!
//! This crate defines what a Crux server and client exchange:
//!
//! - **Types** ([`GameState`], [`Planet`], [`Player`], [`Position`],
//!   [`Color`]): the world snapshot model.
//! - **Codec** ([`decode_game_state`], [`encode_position`], and their
//!   server-side counterparts): how those values map to bytes.
//! - **Errors** ([`DecodeError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or connection state.
//! It turns bytes into values and values into bytes, nothing more.
//!
//! ```text
//! Transport (frames) → Protocol (GameState) → Client (shared state)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use codec::{
    decode_game_state, decode_position, encode_game_state, encode_position,
    COLOR_WIRE_SIZE, MIN_GAME_STATE_WIRE_SIZE, MIN_PLAYER_WIRE_SIZE,
    PLANET_WIRE_SIZE, POSITION_WIRE_SIZE,
};
pub use error::DecodeError;
pub use types::{Color, GameState, Planet, Player, Position};
