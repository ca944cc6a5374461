use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::RoundError;
use crate::player::PlayerRegistry;
use crate::round::RoundId;
use crate::scheduler::{Scheduler, Token};
use crate::session::Session;
use crate::time::Channel;

/// Seat index of a local player.
pub type PlayerIndex = u8;

/// Per-player score changes produced at the end of a round.
pub type ScoreDeltas = BTreeMap<PlayerIndex, i32>;

/// Identifies a mode variant. Addons and typed accessors compare against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModeKind(pub &'static str);

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Descriptive data for a mode.
#[derive(Debug, Clone)]
pub struct ModeMetadata {
    pub kind: ModeKind,
    pub name: String,
    pub description: String,
    pub min_players: u8,
    pub round_duration: Duration,
}

/// Type-erasure helper so a boxed mode can be downcast to its concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Core trait that every mini-game implements.
///
/// The round controller owns the instance for one round and calls the hooks
/// in order: `init_arena`, `init_round`, `on_time_over`, `end_round`,
/// `clear_round`. Anything the mode spawns (pooled objects, addons, scheduled
/// actions) must be released in `clear_round`; the controller cannot see it.
pub trait GameMode: AsAny {
    fn kind(&self) -> ModeKind;

    fn metadata(&self) -> ModeMetadata;

    /// Called when the mode is selected, before the lead-in countdown.
    fn init_arena(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError>;

    /// Called when the lead-in countdown finishes and play begins.
    fn init_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError>;

    /// Called when the round timer runs out. The mode must eventually end
    /// the round; the default ends it on the next tick.
    fn on_time_over(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        ctx.end_round_after(0.0);
        Ok(())
    }

    /// Compute the score change for each player.
    fn end_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<ScoreDeltas, RoundError>;

    /// Release everything the mode owns.
    fn clear_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError>;
}

/// Statically known mode type, for typed access to the current mode.
pub trait ModeVariant: GameMode {
    const KIND: ModeKind;
}

/// What a mode hook can reach while it runs.
pub struct ModeContext<'a> {
    pub scheduler: &'a mut Scheduler<Session>,
    pub players: &'a mut PlayerRegistry,
    pub round: RoundId,
}

impl<'a> ModeContext<'a> {
    pub fn new(
        scheduler: &'a mut Scheduler<Session>,
        players: &'a mut PlayerRegistry,
        round: RoundId,
    ) -> Self {
        Self {
            scheduler,
            players,
            round,
        }
    }

    /// Schedule `action` for this round only. If the round has been cleared
    /// by the time it fires, it is skipped.
    pub fn after<F>(&mut self, channel: Channel, delay: f32, action: F) -> Token
    where
        F: FnOnce(&mut Session) -> Result<(), RoundError> + 'static,
    {
        Session::schedule_for_round(self.scheduler, self.round, channel, delay, action)
    }

    /// Ask the controller to end this round after `delay` seconds.
    pub fn end_round_after(&mut self, delay: f32) -> Token {
        self.after(Channel::Variable, delay, Session::end_round)
    }
}
