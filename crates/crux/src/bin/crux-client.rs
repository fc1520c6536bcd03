//! crux-client binary
//!
//! Connects to a Crux simulation server, logs every world snapshot it
//! receives, and can fly the local player around to exercise the
//! outbound position path.
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `info`), so
//! `--json` output on stdout stays machine-readable.

use std::f32::consts::TAU;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use crux::prelude::*;
use crux_client::DEFAULT_SERVER_URL;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Radius of the `--orbit` circle, in world units.
const ORBIT_RADIUS: f32 = 5.0;

/// Seconds per full `--orbit` lap.
const ORBIT_PERIOD_SECS: f32 = 8.0;

/// Rate at which `--orbit` samples the local position.
const ORBIT_SAMPLE_HZ: f64 = 60.0;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "crux-client", about = "Crux simulation client", version)]
struct Args {
    /// Server WebSocket URL
    #[arg(long, env = "CRUX_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Exit after the first snapshot
    #[arg(long)]
    once: bool,

    /// Print each snapshot as pretty JSON on stdout
    #[arg(long)]
    json: bool,

    /// Circle around the initial location for this many seconds, then exit
    #[arg(long, value_name = "SECS")]
    orbit: Option<f64>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode, CruxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let orbit = args.orbit.and_then(|secs| match Duration::try_from_secs_f64(secs) {
        Ok(duration) => Some(duration),
        Err(e) => {
            warn!(secs, error = %e, "ignoring invalid --orbit duration");
            None
        }
    });

    let manager = ConnectionManager::builder().url(&args.url).build()?;
    let mut reader = manager.reader();
    info!(url = %args.url, "connecting to Crux server");
    manager.connect()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut latest: Option<std::sync::Arc<GameState>> = None;
    let mut reported_error: Option<String> = None;
    let mut orbiting = false;
    let mut code = ExitCode::SUCCESS;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            changed = reader.changed() => {
                if !changed {
                    break;
                }
                let status = reader.status();

                if let Some(state) = status.game_state.as_ref() {
                    let is_new = latest
                        .as_ref()
                        .is_none_or(|prev| !std::sync::Arc::ptr_eq(prev, state));
                    if is_new {
                        report(state, args.json);
                        latest = Some(std::sync::Arc::clone(state));
                        if args.once {
                            break;
                        }
                        if let (Some(duration), false) = (orbit, orbiting) {
                            orbiting = true;
                            spawn_orbit(manager.clone(), state.initial_player_location(), duration);
                        }
                    }
                }

                let failed = ended_in_failure(&status, reported_error.as_deref());
                if status.last_error != reported_error {
                    if let Some(message) = &status.last_error {
                        warn!(error = %message, "client error");
                    }
                    reported_error = status.last_error.clone();
                }

                if !status.connection.is_live() {
                    if failed {
                        error!("connection lost");
                        code = ExitCode::FAILURE;
                    } else {
                        info!(state = %status.connection, "connection ended");
                    }
                    break;
                }
            }
        }
    }

    manager.shutdown();
    // Give the link task a moment to send its close frame.
    tokio::time::sleep(Duration::from_millis(100)).await;

    match latest {
        Some(state) => info!(planets = state.planets().len(), "session finished"),
        None => info!("session finished without a game state"),
    }
    Ok(code)
}

/// `true` if the connection dropped back to `Idle` together with a new
/// error. An error reported earlier (say, an undecodable snapshot while
/// the connection stayed open) does not turn a later clean close into a
/// failure.
fn ended_in_failure(status: &ClientStatus, reported_error: Option<&str>) -> bool {
    status.connection == ConnectionState::Idle
        && status.last_error.is_some()
        && status.last_error.as_deref() != reported_error
}

// ---------------------------------------------------------------------------
// Snapshot reporting
// ---------------------------------------------------------------------------

fn report(state: &GameState, json: bool) {
    info!(
        initial_location = %state.initial_player_location(),
        planets = state.planets().len(),
        players = state.players().len(),
        "game state loaded"
    );
    for (i, planet) in state.planets().iter().enumerate() {
        let [ocean, land, mountain] = planet.colors();
        info!(
            planet = i + 1,
            size = format_args!("{:.1}", planet.size()),
            module_type = planet.module_type(),
            position = %planet.position(),
            colors = format_args!("{ocean}, {land}, {mountain}"),
            "planet"
        );
    }
    for player in state.players() {
        debug!(
            id = player.id,
            name = %player.name,
            level = player.level,
            position = %player.position,
            "player"
        );
    }

    if json {
        match serde_json::to_string_pretty(state) {
            Ok(text) => println!("{text}"),
            Err(e) => warn!(error = %e, "failed to encode game state as JSON"),
        }
    }
}

// ---------------------------------------------------------------------------
// --orbit
// ---------------------------------------------------------------------------

/// Point on the orbit circle `elapsed` into the flight.
///
/// The circle lies in the horizontal (x/z) plane around `center`.
fn orbit_point(center: Position, elapsed: Duration) -> Position {
    let angle = TAU * elapsed.as_secs_f32() / ORBIT_PERIOD_SECS;
    Position::new(
        center.x + ORBIT_RADIUS * angle.cos(),
        center.y,
        center.z + ORBIT_RADIUS * angle.sin(),
    )
}

/// Samples the orbit at 60 Hz through the throttle, then shuts the
/// manager down so the main loop exits.
fn spawn_orbit(manager: ConnectionManager, center: Position, duration: Duration) {
    tokio::spawn(async move {
        info!(%center, secs = duration.as_secs_f64(), "orbit started");
        let mut throttle = PositionThrottle::new(manager.config().throttle);
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / ORBIT_SAMPLE_HZ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let start = Instant::now();
        let (mut sent, mut suppressed) = (0u64, 0u64);
        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();
            if elapsed >= duration {
                break;
            }
            match throttle.offer_now(&manager, orbit_point(center, elapsed), true) {
                ThrottleDecision::Sent => sent += 1,
                ThrottleDecision::Suppressed(_) => suppressed += 1,
                ThrottleDecision::Dropped => {
                    debug!("connection not open, stopping orbit");
                    break;
                }
            }
        }

        info!(sent, suppressed, "orbit finished");
        manager.shutdown();
    });
}
