//! World-state types carried by the Crux wire format.
//!
//! These are the values a snapshot decodes into. The split between
//! mutable and immutable data is expressed in the types themselves:
//!
//! - [`Position`] and [`Color`] are small `Copy` values. Handing one out
//!   hands out a copy, so nobody can change the original through it.
//! - [`Planet`] keeps its fields private. Once built it can only be read,
//!   which matches how geography behaves during a session.
//! - [`Player`] is plain data. A newer snapshot replaces the whole player
//!   list; individual entries are never patched in place.
//! - [`GameState`] only exposes shared slices, so holders of an
//!   `Arc<GameState>` can read everything and change nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scalar value types
// ---------------------------------------------------------------------------

/// A point in world space: three IEEE-754 single-precision floats.
///
/// No range checks are applied anywhere in the codec. NaN and infinities
/// are carried through unchanged, bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    /// The origin `(0, 0, 0)`.
    pub const ORIGIN: Position = Position::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance between two positions.
    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Raw bit patterns of the three components.
    ///
    /// `PartialEq` on floats treats `NaN != NaN` and `0.0 == -0.0`; compare
    /// bits when you need to know that a value survived the wire exactly.
    pub fn to_bits(&self) -> [u32; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits()]
    }
}

impl From<[f32; 3]> for Position {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// An RGB color with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGB({},{},{})", self.r, self.g, self.b)
    }
}

// ---------------------------------------------------------------------------
// Planet
// ---------------------------------------------------------------------------

/// A planet in the world.
///
/// Planets never change during a session, so the fields are private and
/// only readable through accessors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    size: f32,
    colors: [Color; 3],
    module_type: u8,
    position: Position,
}

impl Planet {
    pub const fn new(
        size: f32,
        colors: [Color; 3],
        module_type: u8,
        position: Position,
    ) -> Self {
        Self {
            size,
            colors,
            module_type,
            position,
        }
    }

    /// Radius-like scale factor. Not validated; may be zero or negative.
    pub fn size(&self) -> f32 {
        self.size
    }

    /// The three surface colors, in wire order.
    ///
    /// Renderers treat them as ocean, land, and mountain respectively.
    pub fn colors(&self) -> &[Color; 3] {
        &self.colors
    }

    /// Opaque module discriminant. Its meaning belongs to the consumer.
    pub fn module_type(&self) -> u8 {
        self.module_type
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Server-assigned id, unique within one snapshot.
    pub id: u32,
    pub name: String,
    pub level: u32,
    pub position: Position,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// One full world snapshot.
///
/// A new snapshot replaces the previous one wholesale; there is no merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    planets: Vec<Planet>,
    players: Vec<Player>,
    initial_player_location: Position,
}

impl GameState {
    pub fn new(
        planets: Vec<Planet>,
        players: Vec<Player>,
        initial_player_location: Position,
    ) -> Self {
        Self {
            planets,
            players,
            initial_player_location,
        }
    }

    /// Planets in server send order.
    pub fn planets(&self) -> &[Planet] {
        &self.planets
    }

    /// Players in server send order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Where the local player should spawn.
    pub fn initial_player_location(&self) -> Position {
        self.initial_player_location
    }

    /// Looks up a player by server id.
    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}
