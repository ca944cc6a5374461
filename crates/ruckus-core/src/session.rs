//! The application context that owns every core service.
//!
//! One `Session` exists per play session. The frame pump owns it and calls
//! [`Session::tick`] for each channel; scheduled callbacks receive it by
//! `&mut` and reach other services through it.

use std::collections::HashMap;

use crate::config::SessionConfig;
use crate::countdown::{CountdownHost, CountdownSlot, Countdowns};
use crate::error::RoundError;
use crate::events::SessionEvent;
use crate::game_mode::{ModeKind, ModeVariant};
use crate::mode_registry::ModeFactory;
use crate::player::PlayerRegistry;
use crate::round::{RoundController, RoundId, RoundState};
use crate::scheduler::{Scheduler, SchedulerHost, TickSummary, Token};
use crate::score::{GameOutcome, ScoreBoard};
use crate::time::{Channel, Clock};

pub struct Session {
    clock: Clock,
    pub(crate) scheduler: Scheduler<Session>,
    pub(crate) countdowns: Countdowns<Session>,
    pub(crate) rounds: RoundController,
    pub(crate) players: PlayerRegistry,
    pub(crate) scores: ScoreBoard,
    events: Vec<SessionEvent>,
    /// Last countdown value published per slot.
    shown: HashMap<CountdownSlot, u32>,
}

impl Session {
    pub fn new(
        config: &SessionConfig,
        players: PlayerRegistry,
        factory: impl ModeFactory + 'static,
    ) -> Self {
        let mut scores = ScoreBoard::new();
        for index in players.indices() {
            scores.register(index);
        }
        Self {
            clock: Clock::new(),
            scheduler: Scheduler::new(),
            countdowns: Countdowns::new(),
            rounds: RoundController::new(config, Box::new(factory)),
            players,
            scores,
            events: Vec::new(),
            shown: HashMap::new(),
        }
    }

    /// Advance `channel` by `dt` seconds and run whatever came due.
    pub fn tick(&mut self, channel: Channel, dt: f32) -> TickSummary {
        let now = self.clock.advance(channel, dt);
        Scheduler::tick(self, channel, now)
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut PlayerRegistry {
        &mut self.players
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    // Scheduling primitives

    pub fn delay_invoke<F>(&mut self, delay: f32, action: F) -> Token
    where
        F: FnOnce(&mut Session) -> Result<(), RoundError> + 'static,
    {
        self.scheduler.delay_invoke(delay, action)
    }

    pub fn fixed_delay_invoke<F>(&mut self, delay: f32, action: F) -> Token
    where
        F: FnOnce(&mut Session) -> Result<(), RoundError> + 'static,
    {
        self.scheduler.fixed_delay_invoke(delay, action)
    }

    pub fn cancel(&mut self, token: Token) -> bool {
        self.scheduler.cancel(token)
    }

    pub fn invoke_now(&mut self, token: Token) -> Result<bool, RoundError> {
        Scheduler::invoke_now(self, token)
    }

    pub fn is_pending(&self, token: Token) -> bool {
        self.scheduler.is_pending(token)
    }

    pub fn pending_actions(&self, channel: Channel) -> usize {
        self.scheduler.pending(channel)
    }

    /// Schedule `action` for the round that is current now. It is skipped
    /// if that round has been cleared by the time it fires.
    pub fn schedule_in_round<F>(&mut self, channel: Channel, delay: f32, action: F) -> Token
    where
        F: FnOnce(&mut Session) -> Result<(), RoundError> + 'static,
    {
        let round = self.rounds.round_id;
        Self::schedule_for_round(&mut self.scheduler, round, channel, delay, action)
    }

    pub(crate) fn schedule_for_round<F>(
        scheduler: &mut Scheduler<Session>,
        round: RoundId,
        channel: Channel,
        delay: f32,
        action: F,
    ) -> Token
    where
        F: FnOnce(&mut Session) -> Result<(), RoundError> + 'static,
    {
        scheduler.schedule(channel, delay, move |s: &mut Session| {
            if s.rounds.round_id != round || s.rounds.current.is_none() {
                tracing::debug!(round = round.0, "skipping action from a cleared round");
                return Ok(());
            }
            action(s)
        })
    }

    // Round state

    pub fn state(&self) -> RoundState {
        self.rounds.state
    }

    pub fn round_id(&self) -> RoundId {
        self.rounds.round_id
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds.rounds_played
    }

    pub fn total_rounds(&self) -> u32 {
        self.rounds.total_rounds
    }

    /// Final result, once the game has ended.
    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.rounds.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.rounds.outcome.is_some()
    }

    pub fn current_mode_kind(&self) -> Option<ModeKind> {
        self.rounds.current.as_ref().map(|m| m.kind())
    }

    pub fn countdown_remaining(&self, slot: CountdownSlot) -> Option<f32> {
        self.countdowns.remaining(slot)
    }

    /// Typed access to the current mode.
    pub fn mode<M: ModeVariant>(&self) -> Result<&M, RoundError> {
        let mode = self
            .rounds
            .current
            .as_deref()
            .ok_or(RoundError::NoActiveMode)?;
        let actual = mode.kind();
        mode.as_any()
            .downcast_ref::<M>()
            .ok_or(RoundError::ModeMismatch {
                expected: M::KIND,
                actual,
            })
    }

    pub fn mode_mut<M: ModeVariant>(&mut self) -> Result<&mut M, RoundError> {
        self.mode_and_players::<M>().map(|(mode, _)| mode)
    }

    /// The current mode together with the players, for callbacks that
    /// update both.
    pub fn mode_and_players<M: ModeVariant>(
        &mut self,
    ) -> Result<(&mut M, &mut PlayerRegistry), RoundError> {
        let mode = self
            .rounds
            .current
            .as_deref_mut()
            .ok_or(RoundError::NoActiveMode)?;
        let actual = mode.kind();
        let mode = mode
            .as_any_mut()
            .downcast_mut::<M>()
            .ok_or(RoundError::ModeMismatch {
                expected: M::KIND,
                actual,
            })?;
        Ok((mode, &mut self.players))
    }

    // Presentation

    /// Take every event queued since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

impl SchedulerHost for Session {
    fn scheduler(&mut self) -> &mut Scheduler<Self> {
        &mut self.scheduler
    }
}

impl CountdownHost for Session {
    fn countdowns(&mut self) -> &mut Countdowns<Self> {
        &mut self.countdowns
    }

    fn countdown_display(&mut self, slot: CountdownSlot, remaining: u32) {
        if self.shown.insert(slot, remaining) != Some(remaining) {
            self.emit(SessionEvent::CountdownTick { slot, remaining });
        }
    }

    fn countdown_started(&mut self, slot: CountdownSlot) {
        self.shown.remove(&slot);
    }

    fn countdown_finished(&mut self, slot: CountdownSlot) {
        self.emit(SessionEvent::CountdownFinished { slot });
    }
}
