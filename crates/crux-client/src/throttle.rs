//! Outbound position throttle.
//!
//! The presentation layer offers the local player's position every tick,
//! which is far more often than the server needs. The throttle lets a
//! sample through only when all three hold:
//!
//! 1. movement input is active,
//! 2. the player moved more than `min_distance` since the last *sent*
//!    position,
//! 3. more than `min_interval` passed since the last *sent* update.
//!
//! "Sent" means actually handed to the transport. If the throttle lets a
//! sample through but the connection is not open, nothing was sent and
//! the bookkeeping stays as it was. Otherwise the first real movement
//! after reconnecting could be suppressed as "too close" to a position
//! the server never received.

use std::time::Instant;

use crux_protocol::Position;
use tracing::trace;

use crate::ThrottleConfig;

/// Anything that can transmit a position update.
///
/// Implemented by [`ConnectionManager`](crate::ConnectionManager).
pub trait PositionSink {
    /// Tries to send `position`. Returns `true` only if it was actually
    /// handed to the transport.
    fn send(&self, position: Position) -> bool;
}

/// The last update that really went out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastSent {
    pub position: Position,
    pub at: Instant,
}

/// Why a sample was held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// No movement input is active.
    NoInput,
    /// Not far enough from the last sent position.
    TooClose,
    /// Too soon after the last sent update.
    TooSoon,
}

/// What happened to one offered sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Permitted and transmitted. Bookkeeping updated.
    Sent,
    /// Permitted, but the sink could not transmit it. Bookkeeping unchanged.
    Dropped,
    /// Held back by the throttle.
    Suppressed(Suppression),
}

/// Pure throttle check.
///
/// With no previous send (`last_sent` is `None`) only the movement
/// condition applies. Both thresholds are strict: moving exactly
/// `min_distance`, or waiting exactly `min_interval`, is not enough.
/// A NaN distance never passes.
pub fn throttle_check(
    config: &ThrottleConfig,
    current: Position,
    last_sent: Option<&LastSent>,
    now: Instant,
    moving: bool,
) -> Result<(), Suppression> {
    if !moving {
        return Err(Suppression::NoInput);
    }
    let Some(last) = last_sent else {
        return Ok(());
    };
    // `>` is false for NaN, so a NaN distance is "too close".
    if !(current.distance(&last.position) > config.min_distance) {
        return Err(Suppression::TooClose);
    }
    if now.saturating_duration_since(last.at) <= config.min_interval {
        return Err(Suppression::TooSoon);
    }
    Ok(())
}

/// Stateful wrapper around [`throttle_check`] that remembers the last real send.
#[derive(Debug, Clone)]
pub struct PositionThrottle {
    config: ThrottleConfig,
    last_sent: Option<LastSent>,
}

impl PositionThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config: config.validated(),
            last_sent: None,
        }
    }

    /// Offers one sample taken at `now`, sending it through `sink` if the
    /// throttle permits.
    pub fn offer(
        &mut self,
        sink: &impl PositionSink,
        current: Position,
        moving: bool,
        now: Instant,
    ) -> ThrottleDecision {
        let last = self.last_sent.as_ref();
        if let Err(reason) = throttle_check(&self.config, current, last, now, moving) {
            return ThrottleDecision::Suppressed(reason);
        }
        if !sink.send(current) {
            trace!(%current, "position permitted but not transmitted");
            return ThrottleDecision::Dropped;
        }
        // Position and time are updated together, and only after a real send.
        self.last_sent = Some(LastSent {
            position: current,
            at: now,
        });
        ThrottleDecision::Sent
    }

    /// [`offer`](Self::offer) stamped with the current time.
    pub fn offer_now(
        &mut self,
        sink: &impl PositionSink,
        current: Position,
        moving: bool,
    ) -> ThrottleDecision {
        self.offer(sink, current, moving, Instant::now())
    }

    pub fn last_sent(&self) -> Option<LastSent> {
        self.last_sent
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }
}

impl Default for PositionThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}
