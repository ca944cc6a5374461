pub mod config;
pub mod scoring;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ruckus_core::addon::AddonVariant;
use ruckus_core::error::RoundError;
use ruckus_core::game_mode::{
    GameMode, ModeContext, ModeKind, ModeMetadata, ModeVariant, PlayerIndex, ScoreDeltas,
};
use ruckus_core::player::PlayerRegistry;
use ruckus_core::scheduler::Token;
use ruckus_core::session::Session;
use ruckus_core::time::Channel;

use config::HotPotatoConfig;

pub const HOT_POTATO: ModeKind = ModeKind("hot-potato");

#[derive(Debug, Default)]
pub struct PotatoAddon {
    /// Total seconds this player has held the potato this round.
    pub held_secs: f32,
    pub holding: bool,
    pub catches: u32,
}

impl AddonVariant for PotatoAddon {
    const KIND: ModeKind = HOT_POTATO;
}

/// One potato, passed around until the timer runs out and the fuse burns down.
pub struct HotPotato {
    config: HotPotatoConfig,
    rng: StdRng,
    holder: Option<PlayerIndex>,
    /// Variable-channel time at which the current holder caught the potato.
    held_since: f64,
    exploded: bool,
    pass: Option<Token>,
    fuse: Option<Token>,
}

impl HotPotato {
    pub fn new() -> Self {
        Self::with_config(HotPotatoConfig::load())
    }

    /// Build with `config`, or with defaults if it fails validation.
    pub fn with_config(config: HotPotatoConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!(error = %e, "using default hot potato config");
                HotPotatoConfig::default()
            },
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            rng,
            holder: None,
            held_since: 0.0,
            exploded: false,
            pass: None,
            fuse: None,
        }
    }

    pub fn config(&self) -> &HotPotatoConfig {
        &self.config
    }

    pub fn holder(&self) -> Option<PlayerIndex> {
        self.holder
    }

    pub fn exploded(&self) -> bool {
        self.exploded
    }

    /// Hand the potato to `to`, crediting the outgoing holder's time.
    fn hand_to(
        &mut self,
        players: &mut PlayerRegistry,
        to: PlayerIndex,
        now: f64,
    ) -> Result<(), RoundError> {
        self.release_holder(players, now)?;
        if let Some(p) = players.get_mut(to) {
            let addon = p.addon_mut::<PotatoAddon>()?;
            addon.holding = true;
            addon.catches += 1;
        }
        self.holder = Some(to);
        self.held_since = now;
        Ok(())
    }

    fn release_holder(&mut self, players: &mut PlayerRegistry, now: f64) -> Result<(), RoundError> {
        self.credit_time(players, now)?;
        if let Some(p) = self.holder.and_then(|h| players.get_mut(h)) {
            p.addon_mut::<PotatoAddon>()?.holding = false;
        }
        Ok(())
    }

    fn pass_step(session: &mut Session) -> Result<(), RoundError> {
        let now = session.clock().now(Channel::Variable);
        let interval = {
            let (mode, players) = session.mode_and_players::<HotPotato>()?;
            let candidates: Vec<PlayerIndex> = players
                .active()
                .into_iter()
                .filter(|&p| Some(p) != mode.holder)
                .collect();
            if !candidates.is_empty() {
                let to = candidates[mode.rng.random_range(0..candidates.len())];
                tracing::trace!(from = ?mode.holder, to, "potato passed");
                mode.hand_to(players, to, now)?;
            }
            mode.config.pass_interval_secs
        };
        let token = session.schedule_in_round(Channel::Variable, interval, Self::pass_step);
        session.mode_mut::<HotPotato>()?.pass = Some(token);
        Ok(())
    }

    fn explode(session: &mut Session) -> Result<(), RoundError> {
        let now = session.clock().now(Channel::Variable);
        {
            let (mode, players) = session.mode_and_players::<HotPotato>()?;
            mode.fuse = None;
            mode.exploded = true;
            let holder = mode.holder;
            mode.credit_time(players, now)?;
            tracing::debug!(?holder, "potato exploded");
        }
        session.end_round()
    }

    /// Credit the current holder with time held up to `now`.
    fn credit_time(&mut self, players: &mut PlayerRegistry, now: f64) -> Result<(), RoundError> {
        let Some(holder) = self.holder else {
            return Ok(());
        };
        if let Some(p) = players.get_mut(holder) {
            p.addon_mut::<PotatoAddon>()?.held_secs += (now - self.held_since).max(0.0) as f32;
        }
        self.held_since = now;
        Ok(())
    }

    fn cancel_tokens(&mut self, ctx: &mut ModeContext<'_>) {
        for token in [self.pass.take(), self.fuse.take()].into_iter().flatten() {
            ctx.scheduler.cancel(token);
        }
    }
}

impl Default for HotPotato {
    fn default() -> Self {
        Self::with_config(HotPotatoConfig::default())
    }
}

impl GameMode for HotPotato {
    fn kind(&self) -> ModeKind {
        HOT_POTATO
    }

    fn metadata(&self) -> ModeMetadata {
        ModeMetadata {
            kind: HOT_POTATO,
            name: "Hot Potato".to_string(),
            description: "Don't be holding it when the fuse runs out.".to_string(),
            min_players: 2,
            round_duration: Duration::try_from_secs_f32(self.config.round_duration_secs)
                .unwrap_or_default(),
        }
    }

    fn init_arena(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        self.holder = None;
        self.exploded = false;
        ctx.players.attach_all(|_| PotatoAddon::default());
        Ok(())
    }

    fn init_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        let seats = ctx.players.indices();
        if !seats.is_empty() {
            let first = seats[self.rng.random_range(0..seats.len())];
            let now = ctx.scheduler.now(Channel::Variable);
            self.hand_to(ctx.players, first, now)?;
        }
        let interval = self.config.pass_interval_secs;
        self.pass = Some(ctx.after(Channel::Variable, interval, Self::pass_step));
        Ok(())
    }

    /// Stop passing and light the fuse; the round ends when it burns down.
    fn on_time_over(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        if let Some(token) = self.pass.take() {
            ctx.scheduler.cancel(token);
        }
        let fuse = self.config.fuse_secs;
        self.fuse = Some(ctx.after(Channel::Variable, fuse, Self::explode));
        Ok(())
    }

    fn end_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<ScoreDeltas, RoundError> {
        self.cancel_tokens(ctx);
        let now = ctx.scheduler.now(Channel::Variable);
        self.credit_time(ctx.players, now)?;

        let mut held = Vec::with_capacity(ctx.players.len());
        for p in ctx.players.iter() {
            held.push((p.index, p.addon::<PotatoAddon>()?.held_secs));
        }
        Ok(scoring::potato_scores(&held, self.holder, &self.config))
    }

    fn clear_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        self.cancel_tokens(ctx);
        self.holder = None;
        ctx.players.detach_kind(HOT_POTATO);
        Ok(())
    }
}

impl ModeVariant for HotPotato {
    const KIND: ModeKind = HOT_POTATO;
}
