//! Binary codec for world snapshots and position updates.
//!
//! The format is positional and length-prefixed. There are no tags and no
//! field names on the wire, so both sides must agree on the exact layout:
//!
//! ```text
//! GameState  = u64 planet_count, Planet * planet_count,
//!              u64 player_count, Player * player_count,
//!              Position initial_player_location
//! Planet     = f32 size, Color * 3, u8 module_type, Position      (26 bytes)
//! Color      = u8 r, u8 g, u8 b                                    (3 bytes)
//! Player     = u32 id, u64 name_len, name_len * u8 (UTF-8),
//!              u32 level, Position                            (28 + name bytes)
//! Position   = f32 x, f32 y, f32 z                                (12 bytes)
//! ```
//!
//! Every scalar is little-endian. The only message a client ever sends is
//! a bare [`Position`] (12 bytes, no header).
//!
//! All functions here are pure: no I/O, no shared state. The same input
//! always yields the same output or the same error.

use crate::{Color, DecodeError, GameState, Planet, Player, Position};

/// Size of an encoded [`Position`], and of every outbound position update.
pub const POSITION_WIRE_SIZE: usize = 12;

/// Size of an encoded [`Color`].
pub const COLOR_WIRE_SIZE: usize = 3;

/// Size of an encoded [`Planet`].
pub const PLANET_WIRE_SIZE: usize = 4 + 3 * COLOR_WIRE_SIZE + 1 + POSITION_WIRE_SIZE;

/// Size of an encoded [`Player`] with an empty name.
pub const MIN_PLAYER_WIRE_SIZE: usize = 4 + 8 + 4 + POSITION_WIRE_SIZE;

/// Size of the smallest valid snapshot: two zero counts and a position.
pub const MIN_GAME_STATE_WIRE_SIZE: usize = 8 + 8 + POSITION_WIRE_SIZE;

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes one full world snapshot.
///
/// The buffer is consumed in a single linear pass. Declared counts and
/// string lengths are checked against the bytes that remain *before*
/// anything is allocated, so a hostile `planet_count = u64::MAX` fails
/// fast with [`DecodeError::Truncated`].
///
/// Bytes after `initial_player_location` are ignored.
///
/// # Errors
/// - [`DecodeError::Truncated`] if the buffer ends early.
/// - [`DecodeError::InvalidText`] if a player name is not UTF-8.
///
/// # Example
///
/// ```rust
/// use crux_protocol::{decode_game_state, encode_game_state, GameState, Position};
///
/// let state = GameState::new(Vec::new(), Vec::new(), Position::new(5.0, 5.0, 5.0));
/// let bytes = encode_game_state(&state);
/// assert_eq!(decode_game_state(&bytes).unwrap(), state);
/// ```
pub fn decode_game_state(buffer: &[u8]) -> Result<GameState, DecodeError> {
    let mut reader = Reader::new(buffer);

    let planet_count = reader.count(PLANET_WIRE_SIZE)?;
    let mut planets = Vec::with_capacity(planet_count);
    for _ in 0..planet_count {
        planets.push(reader.planet()?);
    }

    let player_count = reader.count(MIN_PLAYER_WIRE_SIZE)?;
    let mut players = Vec::with_capacity(player_count);
    for _ in 0..player_count {
        players.push(reader.player()?);
    }

    let initial_player_location = reader.position()?;

    Ok(GameState::new(planets, players, initial_player_location))
}

/// Decodes a 12-byte position update (the server's view of what
/// [`encode_position`] produced).
///
/// # Errors
/// Returns [`DecodeError::Truncated`] if fewer than 12 bytes are given.
pub fn decode_position(buffer: &[u8]) -> Result<Position, DecodeError> {
    Reader::new(buffer).position()
}

/// A forward-only cursor over a byte slice.
///
/// Every read goes through [`Reader::take`], which is the single place
/// bounds are checked.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn truncated(&self, needed: u64) -> DecodeError {
        DecodeError::Truncated {
            offset: self.pos,
            needed,
            available: self.remaining(),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(self.truncated(n as u64));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        self.array().map(u64::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, DecodeError> {
        self.array().map(f32::from_le_bytes)
    }

    /// Reads a u64 count and checks that `count` records of at least
    /// `min_record_size` bytes could still fit in the buffer.
    fn count(&mut self, min_record_size: usize) -> Result<usize, DecodeError> {
        let count = self.u64()?;
        let needed = count.saturating_mul(min_record_size as u64);
        if needed > self.remaining() as u64 {
            return Err(self.truncated(needed));
        }
        // Bounded by `remaining()`, so it fits in usize.
        Ok(count as usize)
    }

    fn text(&mut self) -> Result<String, DecodeError> {
        let len = self.u64()?;
        if len > self.remaining() as u64 {
            return Err(self.truncated(len));
        }
        let offset = self.pos;
        let bytes = self.take(len as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|source| DecodeError::InvalidText { offset, source })
    }

    fn position(&mut self) -> Result<Position, DecodeError> {
        Ok(Position {
            x: self.f32()?,
            y: self.f32()?,
            z: self.f32()?,
        })
    }

    fn color(&mut self) -> Result<Color, DecodeError> {
        let [r, g, b] = self.array()?;
        Ok(Color { r, g, b })
    }

    fn planet(&mut self) -> Result<Planet, DecodeError> {
        let size = self.f32()?;
        let colors = [self.color()?, self.color()?, self.color()?];
        let module_type = self.u8()?;
        let position = self.position()?;
        Ok(Planet::new(size, colors, module_type, position))
    }

    fn player(&mut self) -> Result<Player, DecodeError> {
        Ok(Player {
            id: self.u32()?,
            name: self.text()?,
            level: self.u32()?,
            position: self.position()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a position update: three little-endian f32s, x then y then z.
///
/// This is the entire outbound wire format. The fixed-size return type
/// makes the 12-byte contract part of the signature.
///
/// ```rust
/// use crux_protocol::encode_position;
///
/// let bytes = encode_position(1.5, -2.25, 0.0);
/// assert_eq!(
///     bytes,
///     [0x00, 0x00, 0xC0, 0x3F, 0x00, 0x00, 0x10, 0xC0, 0x00, 0x00, 0x00, 0x00]
/// );
/// ```
pub fn encode_position(x: f32, y: f32, z: f32) -> [u8; POSITION_WIRE_SIZE] {
    let mut out = [0u8; POSITION_WIRE_SIZE];
    out[0..4].copy_from_slice(&x.to_le_bytes());
    out[4..8].copy_from_slice(&y.to_le_bytes());
    out[8..12].copy_from_slice(&z.to_le_bytes());
    out
}

/// Encodes a full snapshot in the layout [`decode_game_state`] reads.
///
/// Clients never send this; it exists for servers, test fixtures, and
/// tools that synthesize snapshots.
pub fn encode_game_state(state: &GameState) -> Vec<u8> {
    let names: usize = state.players().iter().map(|p| p.name.len()).sum();
    let mut buf = Vec::with_capacity(
        MIN_GAME_STATE_WIRE_SIZE
            + state.planets().len() * PLANET_WIRE_SIZE
            + state.players().len() * MIN_PLAYER_WIRE_SIZE
            + names,
    );

    buf.extend_from_slice(&(state.planets().len() as u64).to_le_bytes());
    for planet in state.planets() {
        buf.extend_from_slice(&planet.size().to_le_bytes());
        for color in planet.colors() {
            buf.extend_from_slice(&[color.r, color.g, color.b]);
        }
        buf.push(planet.module_type());
        put_position(&mut buf, planet.position());
    }

    buf.extend_from_slice(&(state.players().len() as u64).to_le_bytes());
    for player in state.players() {
        buf.extend_from_slice(&player.id.to_le_bytes());
        buf.extend_from_slice(&(player.name.len() as u64).to_le_bytes());
        buf.extend_from_slice(player.name.as_bytes());
        buf.extend_from_slice(&player.level.to_le_bytes());
        put_position(&mut buf, player.position);
    }

    put_position(&mut buf, state.initial_player_location());
    buf
}

fn put_position(buf: &mut Vec<u8>, p: Position) {
    buf.extend_from_slice(&encode_position(p.x, p.y, p.z));
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The planet used throughout: size 10, blue/green/grey, module 2 at (1,2,3).
    fn reference_planet() -> Planet {
        Planet::new(
            10.0,
            [
                Color::new(0, 0, 255),
                Color::new(0, 255, 0),
                Color::new(128, 128, 128),
            ],
            2,
            Position::new(1.0, 2.0, 3.0),
        )
    }

    fn player(id: u32, name: &str) -> Player {
        Player {
            id,
            name: name.into(),
            level: id * 10,
            position: Position::new(id as f32, -(id as f32), 0.5),
        }
    }

    /// Builds the reference buffer by hand, byte by byte, independent of
    /// `encode_game_state`.
    fn handmade_reference_buffer() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&1u64.to_le_bytes());
        b.extend_from_slice(&10.0f32.to_le_bytes());
        b.extend_from_slice(&[0, 0, 255, 0, 255, 0, 128, 128, 128]);
        b.push(2);
        for v in [1.0f32, 2.0, 3.0] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        b.extend_from_slice(&0u64.to_le_bytes());
        for v in [5.0f32, 5.0, 5.0] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        b
    }

    // =====================================================================
    // Layout constants
    // =====================================================================

    #[test]
    fn test_wire_sizes() {
        assert_eq!(POSITION_WIRE_SIZE, 12);
        assert_eq!(PLANET_WIRE_SIZE, 26);
        assert_eq!(MIN_PLAYER_WIRE_SIZE, 28);
        assert_eq!(MIN_GAME_STATE_WIRE_SIZE, 28);
    }

    // =====================================================================
    // decode_game_state
    // =====================================================================

    #[test]
    fn test_decode_reference_snapshot() {
        let buf = handmade_reference_buffer();
        assert_eq!(buf.len(), MIN_GAME_STATE_WIRE_SIZE + PLANET_WIRE_SIZE);

        let state = decode_game_state(&buf).expect("valid snapshot");

        assert_eq!(state.planets().len(), 1);
        let planet = &state.planets()[0];
        assert_eq!(planet.size(), 10.0);
        assert_eq!(
            planet.colors(),
            &[
                Color::new(0, 0, 255),
                Color::new(0, 255, 0),
                Color::new(128, 128, 128)
            ]
        );
        assert_eq!(planet.module_type(), 2);
        assert_eq!(planet.position(), Position::new(1.0, 2.0, 3.0));
        assert!(state.players().is_empty());
        assert_eq!(state.initial_player_location(), Position::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_decode_players_with_names() {
        let state = GameState::new(
            vec![reference_planet(), reference_planet()],
            vec![player(1, "Player_50123"), player(2, ""), player(3, "Ünïcødé 🚀")],
            Position::new(-1.0, 0.0, 1.0),
        );
        let decoded = decode_game_state(&encode_game_state(&state)).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.players()[2].name, "Ünïcødé 🚀");
        assert_eq!(decoded.players()[2].level, 30);
    }

    #[test]
    fn test_decode_minimal_snapshot() {
        let mut buf = vec![0u8; 16];
        buf.extend_from_slice(&encode_position(0.0, 0.0, 0.0));
        let state = decode_game_state(&buf).unwrap();
        assert!(state.planets().is_empty());
        assert!(state.players().is_empty());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let buf = encode_game_state(&GameState::new(
            vec![reference_planet()],
            vec![player(7, "Sol")],
            Position::new(5.0, 5.0, 5.0),
        ));
        let first = decode_game_state(&buf).unwrap();
        for _ in 0..10 {
            assert_eq!(decode_game_state(&buf).unwrap(), first);
        }
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut buf = handmade_reference_buffer();
        buf.extend_from_slice(b"extra");
        let state = decode_game_state(&buf).unwrap();
        assert_eq!(state.planets().len(), 1);
    }

    #[test]
    fn test_decode_passes_non_finite_floats_through() {
        let planet = Planet::new(
            f32::NAN,
            [Color::default(); 3],
            255,
            Position::new(f32::INFINITY, f32::NEG_INFINITY, -0.0),
        );
        let state = GameState::new(vec![planet], Vec::new(), Position::new(f32::NAN, 0.0, 0.0));
        let decoded = decode_game_state(&encode_game_state(&state)).unwrap();

        let p = &decoded.planets()[0];
        assert_eq!(p.size().to_bits(), f32::NAN.to_bits());
        assert_eq!(p.position().to_bits(), planet.position().to_bits());
        assert_eq!(
            decoded.initial_player_location().to_bits(),
            state.initial_player_location().to_bits()
        );
    }

    // =====================================================================
    // Error cases: malformed input
    // =====================================================================

    #[test]
    fn test_every_strict_prefix_is_truncated() {
        let buf = encode_game_state(&GameState::new(
            vec![reference_planet(), reference_planet()],
            vec![player(1, "Nova"), player(2, "Orion")],
            Position::new(5.0, 5.0, 5.0),
        ));
        for len in 0..buf.len() {
            let err = decode_game_state(&buf[..len]).unwrap_err();
            assert!(
                err.is_truncated(),
                "prefix of {len} bytes should be truncated, got {err:?}"
            );
        }
    }

    #[test]
    fn test_empty_buffer_is_truncated() {
        assert_eq!(
            decode_game_state(&[]),
            Err(DecodeError::Truncated {
                offset: 0,
                needed: 8,
                available: 0
            })
        );
    }

    #[test]
    fn test_huge_planet_count_fails_without_allocating() {
        let mut buf = u64::MAX.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0u8; 64]);
        match decode_game_state(&buf) {
            Err(DecodeError::Truncated { offset, needed, available }) => {
                assert_eq!(offset, 8);
                assert_eq!(needed, u64::MAX);
                assert_eq!(available, 64);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_declared_count_larger_than_payload_is_truncated() {
        // Claims 3 planets but carries exactly one.
        let mut buf = handmade_reference_buffer();
        buf[0..8].copy_from_slice(&3u64.to_le_bytes());
        assert!(decode_game_state(&buf).unwrap_err().is_truncated());
    }

    #[test]
    fn test_huge_name_length_is_truncated() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&1u64.to_le_bytes());
        buf.extend_from_slice(&9u32.to_le_bytes());
        buf.extend_from_slice(&(u64::MAX - 3).to_le_bytes());
        buf.extend_from_slice(&[0u8; 40]);
        match decode_game_state(&buf) {
            Err(DecodeError::Truncated { offset, needed, .. }) => {
                assert_eq!(offset, 8 + 8 + 4 + 8);
                assert_eq!(needed, u64::MAX - 3);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_name_is_rejected() {
        let mut buf = encode_game_state(&GameState::new(
            Vec::new(),
            vec![player(1, "abcd")],
            Position::ORIGIN,
        ));
        // Two counts, the player id, then the name length prefix.
        let name_at = 8 + 8 + 4 + 8;
        buf[name_at + 1] = 0xff;
        match decode_game_state(&buf) {
            Err(DecodeError::InvalidText { offset, .. }) => assert_eq!(offset, name_at),
            other => panic!("expected InvalidText, got {other:?}"),
        }
    }

    // =====================================================================
    // encode_position / decode_position
    // =====================================================================

    #[test]
    fn test_encode_position_reference_bytes() {
        assert_eq!(
            encode_position(1.5, -2.25, 0.0),
            [0x00, 0x00, 0xC0, 0x3F, 0x00, 0x00, 0x10, 0xC0, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_position_survives_wire_bit_exact() {
        let tricky = [
            Position::new(f32::MIN_POSITIVE, f32::MAX, -f32::MAX),
            Position::new(f32::NAN, f32::INFINITY, -0.0),
            Position::new(0.1, 1.0e-40, 123_456.79),
        ];
        for p in tricky {
            let decoded = decode_position(&encode_position(p.x, p.y, p.z)).unwrap();
            assert_eq!(decoded.to_bits(), p.to_bits());
        }
    }

    #[test]
    fn test_snapshot_positions_re_encode_bit_exact() {
        let buf = encode_game_state(&GameState::new(
            vec![reference_planet()],
            vec![player(4, "Kepler")],
            Position::new(5.0, 5.0, 5.0),
        ));
        let state = decode_game_state(&buf).unwrap();

        let positions = state
            .planets()
            .iter()
            .map(Planet::position)
            .chain(state.players().iter().map(|p| p.position))
            .chain(std::iter::once(state.initial_player_location()));
        for p in positions {
            let again = decode_position(&encode_position(p.x, p.y, p.z)).unwrap();
            assert_eq!(again.to_bits(), p.to_bits());
        }
    }

    #[test]
    fn test_decode_position_short_buffer() {
        let err = decode_position(&[0u8; 11]).unwrap_err();
        assert!(err.is_truncated());
    }
}
