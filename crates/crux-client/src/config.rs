//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Server address used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";

// ---------------------------------------------------------------------------
// ThrottleConfig
// ---------------------------------------------------------------------------

/// Limits on how often position updates go out.
///
/// A sample is sent only if the player moved *more* than `min_distance`
/// world units and *more* than `min_interval` passed since the last
/// transmitted update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum Euclidean distance from the last sent position.
    pub min_distance: f32,
    /// Minimum time since the last sent position.
    pub min_interval: Duration,
}

impl ThrottleConfig {
    pub const DEFAULT_MIN_DISTANCE: f32 = 0.01;
    pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

    /// Replaces unusable values with defaults.
    ///
    /// A NaN, infinite, or negative `min_distance` would make every
    /// comparison meaningless, so it falls back to
    /// [`Self::DEFAULT_MIN_DISTANCE`].
    pub fn validated(mut self) -> Self {
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            warn!(
                min_distance = self.min_distance,
                default = Self::DEFAULT_MIN_DISTANCE,
                "invalid throttle min_distance, using default"
            );
            self.min_distance = Self::DEFAULT_MIN_DISTANCE;
        }
        self
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_distance: Self::DEFAULT_MIN_DISTANCE,
            min_interval: Self::DEFAULT_MIN_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Everything the connection manager needs to know up front.
///
/// Every field has a default, so a partial config file (or none at all)
/// is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the simulation server.
    pub url: String,

    /// Pause before each connection attempt opens the transport.
    ///
    /// The wait happens on the attempt's own task, so callers of
    /// `connect()` never block. Zero (the default) connects immediately.
    pub connect_delay: Duration,

    /// Outbound position throttle limits.
    pub throttle: ThrottleConfig,
}

impl ClientConfig {
    /// Creates a config for `url` with every other field at its default.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Clamps nested values into a usable range.
    pub fn validated(mut self) -> Self {
        self.throttle = self.throttle.validated();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            connect_delay: Duration::ZERO,
            throttle: ThrottleConfig::default(),
        }
    }
}
