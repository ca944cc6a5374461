//! Round lifecycle state machine.
//!
//! ```text
//! Idle -> Countdown -> Playing -> TimeOver -> Scoring -> Cleared -> Idle -> ...
//! ```
//!
//! The lifecycle entry points live on [`Session`] because each transition
//! touches several services (scheduler, countdowns, players, scores). Calls
//! that arrive in the wrong state are ignored: they usually come from a
//! callback that was already queued when the round moved on.

use serde::Serialize;

use crate::config::SessionConfig;
use crate::countdown::{CountdownSlot, Countdowns};
use crate::error::RoundError;
use crate::events::SessionEvent;
use crate::game_mode::{GameMode, ModeContext};
use crate::mode_registry::ModeFactory;
use crate::scheduler::Token;
use crate::score::GameOutcome;
use crate::session::Session;
use crate::time::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RoundState {
    /// No mode is current.
    Idle,
    /// Lead-in countdown running, players frozen.
    Countdown,
    /// Round timer running, players free.
    Playing,
    /// Round timer expired; the mode is wrapping up.
    TimeOver,
    /// Scores applied; waiting to clear.
    Scoring,
    /// Mode torn down.
    Cleared,
}

/// Serial number of a round, bumped each time a mode is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct RoundId(pub u64);

impl RoundId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Lifecycle bookkeeping owned by the session.
pub struct RoundController {
    pub(crate) state: RoundState,
    pub(crate) current: Option<Box<dyn GameMode>>,
    pub(crate) round_id: RoundId,
    pub(crate) rounds_played: u32,
    pub(crate) total_rounds: u32,
    pub(crate) outcome: Option<GameOutcome>,
    factory: Box<dyn ModeFactory>,
    pending_clear: Option<Token>,
    lead_time: f32,
    score_display: f32,
    duration_override: Option<f32>,
}

impl RoundController {
    pub fn new(config: &SessionConfig, factory: Box<dyn ModeFactory>) -> Self {
        Self {
            state: RoundState::Idle,
            current: None,
            round_id: RoundId::default(),
            rounds_played: 0,
            total_rounds: config.total_rounds,
            outcome: None,
            factory,
            pending_clear: None,
            lead_time: config.lead_time_secs,
            score_display: config.score_display_secs,
            duration_override: config.round_duration_override_secs,
        }
    }

    /// Round number shown to players (1-based).
    fn display_round(&self) -> u32 {
        self.rounds_played + 1
    }
}

impl Session {
    /// Start the next round, or end the game if none remain.
    ///
    /// Ignored while a round is in progress or after the game has ended.
    pub fn next_round(&mut self) -> Result<(), RoundError> {
        if self.rounds.state != RoundState::Idle {
            tracing::debug!(state = ?self.rounds.state, "next_round ignored: round in progress");
            return Ok(());
        }
        if self.rounds.outcome.is_some() {
            tracing::debug!("next_round ignored: game already ended");
            return Ok(());
        }
        if self.rounds.rounds_played >= self.rounds.total_rounds {
            self.end_game();
            return Ok(());
        }
        let Some(mut mode) = self.rounds.factory.next_mode() else {
            tracing::info!(
                rounds_played = self.rounds.rounds_played,
                "no more modes available"
            );
            self.end_game();
            return Ok(());
        };

        let round = self.rounds.round_id.next();
        self.rounds.round_id = round;
        let kind = mode.kind();
        {
            let mut ctx = ModeContext::new(&mut self.scheduler, &mut self.players, round);
            mode.init_arena(&mut ctx)?;
        }

        self.rounds.current = Some(mode);
        self.rounds.state = RoundState::Countdown;
        self.players.freeze_all();

        let number = self.rounds.display_round();
        tracing::info!(round = number, mode = %kind, "round starting");
        self.emit(SessionEvent::RoundStarting { round: number, mode: kind });

        let lead = self.rounds.lead_time;
        Countdowns::start(self, CountdownSlot::Main, lead, move |s: &mut Session| {
            s.begin_play(round)
        });
        Ok(())
    }

    /// Completion of the lead-in countdown.
    fn begin_play(&mut self, round: RoundId) -> Result<(), RoundError> {
        if self.rounds.round_id != round || self.rounds.state != RoundState::Countdown {
            return Ok(());
        }
        let mode_duration = self.with_mode(|mode, ctx| {
            mode.init_round(ctx)?;
            Ok(mode.metadata().round_duration.as_secs_f32())
        })?;
        let duration = self.rounds.duration_override.unwrap_or(mode_duration);

        Countdowns::start(self, CountdownSlot::Game, duration, Session::on_time_over);
        self.players.unfreeze_all();
        self.rounds.state = RoundState::Playing;

        let number = self.rounds.display_round();
        tracing::info!(round = number, duration, "round playing");
        self.emit(SessionEvent::RoundPlaying { round: number });
        Ok(())
    }

    /// Round timer expired. Ignored unless a round is playing.
    pub fn on_time_over(&mut self) -> Result<(), RoundError> {
        if self.rounds.state != RoundState::Playing {
            tracing::debug!(state = ?self.rounds.state, "on_time_over ignored");
            return Ok(());
        }
        self.with_mode(|mode, ctx| mode.on_time_over(ctx))?;
        self.rounds.state = RoundState::TimeOver;

        let number = self.rounds.display_round();
        tracing::info!(round = number, "time over");
        self.emit(SessionEvent::TimeOver { round: number });
        Ok(())
    }

    /// Score the round and schedule its teardown.
    ///
    /// Valid while playing (the mode ended early) or after time over.
    pub fn end_round(&mut self) -> Result<(), RoundError> {
        if !matches!(
            self.rounds.state,
            RoundState::Playing | RoundState::TimeOver
        ) {
            tracing::debug!(state = ?self.rounds.state, "end_round ignored");
            return Ok(());
        }
        Countdowns::stop(self, CountdownSlot::Game);
        let deltas = self.with_mode(|mode, ctx| mode.end_round(ctx))?;

        self.rounds.state = RoundState::Scoring;
        self.players.freeze_all();
        self.scores.apply(&deltas);

        let number = self.rounds.display_round();
        tracing::info!(round = number, ?deltas, "round scored");
        self.emit(SessionEvent::RoundScored {
            round: number,
            deltas,
        });

        let round = self.rounds.round_id;
        let delay = self.rounds.score_display;
        let token = Session::schedule_for_round(
            &mut self.scheduler,
            round,
            Channel::Variable,
            delay,
            Session::clear_round,
        );
        self.rounds.pending_clear = Some(token);
        Ok(())
    }

    /// Tear down the current mode and chain into the next round.
    pub fn clear_round(&mut self) -> Result<(), RoundError> {
        if self.rounds.state == RoundState::Idle {
            tracing::debug!("clear_round ignored: no active round");
            return Ok(());
        }
        if let Some(token) = self.rounds.pending_clear.take() {
            self.scheduler.cancel(token);
        }
        Countdowns::stop(self, CountdownSlot::Main);
        Countdowns::stop(self, CountdownSlot::Game);

        self.rounds.rounds_played += 1;
        self.rounds.state = RoundState::Cleared;
        let kind = self.current_mode_kind();
        self.with_mode(|mode, ctx| mode.clear_round(ctx))?;
        self.rounds.current = None;

        if let Some(kind) = kind {
            let leaked = self.players.detach_kind(kind);
            if leaked > 0 {
                tracing::warn!(mode = %kind, leaked, "mode left addons attached after clear");
            }
        }
        self.players.freeze_all();
        self.rounds.state = RoundState::Idle;

        let rounds_played = self.rounds.rounds_played;
        tracing::info!(rounds_played, "round cleared");
        self.emit(SessionEvent::RoundCleared { rounds_played });

        self.next_round()
    }

    fn end_game(&mut self) {
        let outcome = self.scores.outcome(self.rounds.rounds_played, &self.players);
        tracing::info!(
            rounds_played = outcome.rounds_played,
            winners = ?outcome.winners,
            "game ended"
        );
        self.rounds.outcome = Some(outcome.clone());
        self.emit(SessionEvent::GameEnded { outcome });
    }

    /// Run `f` against the current mode with a context for this round.
    fn with_mode<R>(
        &mut self,
        f: impl FnOnce(&mut dyn GameMode, &mut ModeContext<'_>) -> Result<R, RoundError>,
    ) -> Result<R, RoundError> {
        let round = self.rounds.round_id;
        let mode = self
            .rounds
            .current
            .as_deref_mut()
            .ok_or(RoundError::NoActiveMode)?;
        let mut ctx = ModeContext::new(&mut self.scheduler, &mut self.players, round);
        f(mode, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_mode::ModeKind;
    use crate::test_helpers::{
        HookLog, ScriptedMode, TimeOverBehavior, advance, make_players, scripted_factory,
        session_with,
    };

    fn config(total_rounds: u32) -> SessionConfig {
        SessionConfig {
            total_rounds,
            lead_time_secs: 5.0,
            score_display_secs: 2.0,
            round_duration_override_secs: None,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn single_round_trip_ends_game() {
        let log = HookLog::default();
        let mode_log = log.clone();
        let factory = move || {
            let mode = ScriptedMode::new(ModeKind("scripted"))
                .with_log(mode_log.clone())
                .with_duration(10.0)
                .with_deltas([(0, 3), (1, 1)]);
            Some(Box::new(mode) as Box<dyn GameMode>)
        };
        let mut session = Session::new(&config(1), make_players(2), factory);

        session.next_round().unwrap();
        assert_eq!(session.state(), RoundState::Countdown);
        assert_eq!(log.calls(), vec!["init_arena"]);
        assert!(session.players().active().is_empty());

        advance(&mut session, 5.05, 0.05);
        assert_eq!(session.state(), RoundState::Playing);
        assert_eq!(log.calls(), vec!["init_arena", "init_round"]);
        assert_eq!(session.players().active(), vec![0, 1]);

        advance(&mut session, 10.0, 0.05);
        assert!(log.calls().contains(&"on_time_over"));

        advance(&mut session, 0.1, 0.05);
        assert_eq!(session.state(), RoundState::Scoring);
        assert_eq!(session.scores().total(0), 3);
        assert_eq!(session.scores().total(1), 1);

        advance(&mut session, 2.1, 0.05);
        assert_eq!(session.rounds_played(), 1);
        assert_eq!(session.state(), RoundState::Idle);
        assert_eq!(log.calls().last(), Some(&"clear_round"));

        let outcome = session.outcome().expect("game should have ended");
        assert_eq!(outcome.winners, vec![0]);
        assert_eq!(outcome.standings[0].name, "Player1");
        assert_eq!(outcome.rounds_played, 1);
    }

    #[test]
    fn next_round_while_active_is_noop() {
        let mut built = 0u32;
        let counter = std::rc::Rc::new(std::cell::Cell::new(0u32));
        let seen = counter.clone();
        let factory = move || {
            built += 1;
            seen.set(built);
            Some(Box::new(ScriptedMode::new(ModeKind("scripted"))) as Box<dyn GameMode>)
        };
        let mut session = Session::new(&config(3), make_players(2), factory);

        session.next_round().unwrap();
        let round = session.round_id();
        session.next_round().unwrap();
        advance(&mut session, 5.1, 0.1);
        session.next_round().unwrap();

        assert_eq!(counter.get(), 1, "no second mode may be constructed");
        assert_eq!(session.round_id(), round);
        assert_eq!(session.rounds_played(), 0);
    }

    #[test]
    fn exhausted_factory_ends_game() {
        let mut session = Session::new(&config(10), make_players(2), scripted_factory(1));
        session.next_round().unwrap();
        session.clear_round().unwrap();

        assert!(session.is_finished());
        assert_eq!(session.rounds_played(), 1);
        let events = session.drain_events();
        assert!(matches!(
            events.last(),
            Some(SessionEvent::GameEnded { .. })
        ));
    }

    #[test]
    fn game_end_is_reported_once() {
        let mut session = Session::new(&config(1), make_players(2), scripted_factory(0));
        session.next_round().unwrap();
        session.next_round().unwrap();
        let ended = session
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::GameEnded { .. }))
            .count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn lifecycle_calls_in_wrong_state_are_ignored() {
        let mut session = session_with(2, 2);
        assert_eq!(session.on_time_over(), Ok(()));
        assert_eq!(session.end_round(), Ok(()));
        assert_eq!(session.clear_round(), Ok(()));
        assert_eq!(session.state(), RoundState::Idle);
        assert_eq!(session.rounds_played(), 0);

        session.next_round().unwrap();
        // Still counting down: time-over and end-round do not apply yet.
        session.on_time_over().unwrap();
        session.end_round().unwrap();
        assert_eq!(session.state(), RoundState::Countdown);
    }

    #[test]
    fn mode_can_end_round_early() {
        let mut session = session_with(1, 2);
        session.next_round().unwrap();
        advance(&mut session, 5.1, 0.1);
        assert_eq!(session.state(), RoundState::Playing);

        session.end_round().unwrap();
        assert_eq!(session.state(), RoundState::Scoring);
        assert!(session.countdown_remaining(CountdownSlot::Game).is_none());

        // The stopped round timer must not deliver a late time-over.
        advance(&mut session, 1.0, 0.1);
        assert!(
            !session
                .drain_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::TimeOver { .. }))
        );
    }

    #[test]
    fn explicit_clear_cancels_scheduled_clear() {
        let mut session = session_with(3, 2);
        session.next_round().unwrap();
        advance(&mut session, 5.1, 0.1);
        session.end_round().unwrap();

        session.clear_round().unwrap();
        assert_eq!(session.rounds_played(), 1);
        assert_eq!(session.state(), RoundState::Countdown);

        // The scheduled clear from round one must not clear round two.
        advance(&mut session, 3.0, 0.1);
        assert_eq!(session.rounds_played(), 1);
        assert_eq!(session.state(), RoundState::Countdown);
    }

    #[test]
    fn mode_holding_round_open_waits_for_end_round() {
        let factory = || {
            Some(Box::new(
                ScriptedMode::new(ModeKind("scripted"))
                    .with_duration(1.0)
                    .with_time_over(TimeOverBehavior::Hold),
            ) as Box<dyn GameMode>)
        };
        let mut session = Session::new(&config(1), make_players(2), factory);
        session.next_round().unwrap();
        advance(&mut session, 7.0, 0.1);
        assert_eq!(session.state(), RoundState::TimeOver);

        session.end_round().unwrap();
        assert_eq!(session.state(), RoundState::Scoring);
    }

    #[test]
    fn round_duration_override_applies() {
        let cfg = SessionConfig {
            round_duration_override_secs: Some(1.0),
            ..config(1)
        };
        let factory = || {
            Some(Box::new(ScriptedMode::new(ModeKind("scripted")).with_duration(60.0))
                as Box<dyn GameMode>)
        };
        let mut session = Session::new(&cfg, make_players(2), factory);
        session.next_round().unwrap();
        advance(&mut session, 6.2, 0.1);
        assert!(matches!(
            session.state(),
            RoundState::TimeOver | RoundState::Scoring
        ));
    }

    #[test]
    fn typed_mode_access_checks_variant() {
        let mut session = session_with(1, 2);
        session.next_round().unwrap();
        assert!(session.mode::<ScriptedMode>().is_ok());
        assert!(session.mode_mut::<ScriptedMode>().is_ok());
    }

    #[test]
    fn clear_detaches_leaked_addons() {
        let factory = || {
            Some(Box::new(ScriptedMode::new(ModeKind("scripted")).leaking_addons())
                as Box<dyn GameMode>)
        };
        let mut session = Session::new(&config(2), make_players(2), factory);
        session.next_round().unwrap();
        assert!(session.players().iter().all(|p| p.addon_kind().is_some()));

        session.clear_round().unwrap();
        // The next round's mode attached fresh addons; the old ones were dropped.
        assert_eq!(session.rounds_played(), 1);
        session.clear_round().unwrap();
        assert!(session.players().iter().all(|p| p.addon_kind().is_none()));
    }

    #[test]
    fn init_arena_failure_leaves_session_idle() {
        let factory = || {
            Some(Box::new(ScriptedMode::new(ModeKind("scripted")).failing_init_arena())
                as Box<dyn GameMode>)
        };
        let mut session = Session::new(&config(1), make_players(2), factory);
        let err = session.next_round().unwrap_err();
        assert!(matches!(err, RoundError::Hook { hook: "init_arena", .. }));
        assert_eq!(session.state(), RoundState::Idle);
        assert!(session.current_mode_kind().is_none());
    }

    #[test]
    fn events_follow_lifecycle_order() {
        let mut session = session_with(1, 2);
        session.next_round().unwrap();
        advance(&mut session, 30.0, 0.1);

        let names: Vec<&str> = session
            .drain_events()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::RoundStarting { .. } => Some("starting"),
                SessionEvent::RoundPlaying { .. } => Some("playing"),
                SessionEvent::TimeOver { .. } => Some("time_over"),
                SessionEvent::RoundScored { .. } => Some("scored"),
                SessionEvent::RoundCleared { .. } => Some("cleared"),
                SessionEvent::GameEnded { .. } => Some("ended"),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            vec!["starting", "playing", "time_over", "scored", "cleared", "ended"]
        );
    }
}
