use std::time::Duration;

use tokio::time::Instant;

use ruckus_core::events::SessionEvent;
use ruckus_core::game_mode::ModeKind;
use ruckus_core::mode_registry::{ModeRegistry, ModeSequence};
use ruckus_core::player::PlayerRegistry;
use ruckus_core::round::RoundState;
use ruckus_core::score::GameOutcome;
use ruckus_core::session::Session;

use crate::config::HostConfig;
use crate::pump::FramePump;

/// Registry with every mode compiled into this build.
pub fn default_registry() -> ModeRegistry {
    #[allow(unused_mut)]
    let mut registry = ModeRegistry::new();
    #[cfg(feature = "coin-rush")]
    registry.register(ruckus_coinrush::COIN_RUSH, 1, || {
        Box::new(ruckus_coinrush::CoinRush::new())
    });
    #[cfg(feature = "hot-potato")]
    registry.register(ruckus_hotpotato::HOT_POTATO, 1, || {
        Box::new(ruckus_hotpotato::HotPotato::new())
    });
    registry
}

/// Seat the configured players and pick modes from `registry`.
pub fn build_session(config: &HostConfig, registry: ModeRegistry) -> Session {
    let players = PlayerRegistry::from_names(config.players.names.iter().cloned());
    let modes = ModeSequence::new(registry, config.session.selection.clone());
    Session::new(&config.session, players, modes)
}

/// Summary of a driven session.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Final result, or `None` if the session stalled or was stopped.
    pub outcome: Option<GameOutcome>,
    pub frames: u64,
    /// Scheduled actions that returned an error. Each is logged where it ran.
    pub failed_actions: usize,
    /// Mode of each round, in play order.
    pub modes_played: Vec<ModeKind>,
}

/// Why the frame loop stopped early.
enum Halt {
    Stalled,
}

/// Shared per-frame work for both runners.
struct Driver<'a> {
    session: &'a mut Session,
    pump: &'a mut FramePump,
    report: RunReport,
}

impl<'a> Driver<'a> {
    fn new(session: &'a mut Session, pump: &'a mut FramePump) -> Self {
        Self {
            session,
            pump,
            report: RunReport::default(),
        }
    }

    fn start(&mut self) -> Result<(), Halt> {
        if let Err(e) = self.session.next_round() {
            tracing::error!(error = %e, "failed to start the first round");
        }
        self.publish_events();
        self.check_stalled()
    }

    /// Run one frame. Returns `true` once the game has ended.
    fn frame(&mut self, dt: f32) -> Result<bool, Halt> {
        let report = self.pump.frame(self.session, dt);
        self.report.frames += 1;
        self.report.failed_actions += report.summary.failed.len();
        self.publish_events();
        if self.session.is_finished() {
            self.report.outcome = self.session.outcome().cloned();
            return Ok(true);
        }
        self.check_stalled().map(|()| false)
    }

    /// Idle without an outcome means the next round failed to start.
    fn check_stalled(&self) -> Result<(), Halt> {
        if self.session.state() == RoundState::Idle && !self.session.is_finished() {
            tracing::error!(
                rounds_played = self.session.rounds_played(),
                "session stalled: no round could be started"
            );
            return Err(Halt::Stalled);
        }
        Ok(())
    }

    fn publish_events(&mut self) {
        for event in self.session.drain_events() {
            match &event {
                SessionEvent::RoundStarting { mode, .. } => {
                    self.report.modes_played.push(*mode);
                    tracing::info!(event = %event.to_json(), "session event");
                },
                SessionEvent::CountdownTick { .. } => {
                    tracing::trace!(event = %event.to_json(), "session event");
                },
                _ => tracing::info!(event = %event.to_json(), "session event"),
            }
        }
    }

    fn finish(self) -> RunReport {
        self.report
    }
}

/// Drive the session with fixed `frame_dt` frames, as fast as possible.
///
/// Stops after `max_frames` frames if the game has not ended by then.
pub fn simulate(
    session: &mut Session,
    pump: &mut FramePump,
    frame_dt: f32,
    max_frames: u64,
) -> RunReport {
    let mut driver = Driver::new(session, pump);
    if driver.start().is_err() {
        return driver.finish();
    }
    for _ in 0..max_frames {
        match driver.frame(frame_dt) {
            Ok(true) | Err(Halt::Stalled) => break,
            Ok(false) => {},
        }
    }
    if driver.report.outcome.is_none() {
        tracing::warn!(frames = driver.report.frames, "simulation stopped before the game ended");
    }
    driver.finish()
}

/// Drive the session in real time at `frame_rate_hz` until the game ends
/// or the process is interrupted.
pub async fn run_session(
    session: &mut Session,
    pump: &mut FramePump,
    frame_rate_hz: f32,
) -> RunReport {
    let mut driver = Driver::new(session, pump);
    if driver.start().is_err() {
        return driver.finish();
    }

    let frame_interval = Duration::try_from_secs_f32(1.0 / frame_rate_hz)
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_millis(16));
    let mut interval = tokio::time::interval(frame_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last = Instant::now();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f32();
                last = now;
                match driver.frame(dt) {
                    Ok(true) | Err(Halt::Stalled) => break,
                    Ok(false) => {},
                }
            }
            _ = &mut shutdown => {
                tracing::info!(frames = driver.report.frames, "interrupted, stopping session");
                break;
            }
        }
    }
    driver.finish()
}
