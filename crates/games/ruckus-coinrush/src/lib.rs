pub mod config;
pub mod pool;
pub mod scoring;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ruckus_core::addon::AddonVariant;
use ruckus_core::error::RoundError;
use ruckus_core::game_mode::{
    GameMode, ModeContext, ModeKind, ModeMetadata, ModeVariant, ScoreDeltas,
};
use ruckus_core::player::PlayerRegistry;
use ruckus_core::scheduler::Token;
use ruckus_core::session::Session;
use ruckus_core::time::Channel;

use config::CoinRushConfig;
use pool::{Coin, CoinPool};

pub const COIN_RUSH: ModeKind = ModeKind("coin-rush");

/// Per-player Coin Rush state.
#[derive(Debug, Default)]
pub struct CoinAddon {
    pub coins: u32,
    pub value: u32,
}

impl CoinAddon {
    pub fn collect(&mut self, coin: &Coin) {
        self.coins += 1;
        self.value += coin.value;
    }
}

impl AddonVariant for CoinAddon {
    const KIND: ModeKind = COIN_RUSH;
}

/// Coins rain into the arena on the fixed channel; players grab them.
pub struct CoinRush {
    config: CoinRushConfig,
    pool: CoinPool,
    rng: StdRng,
    spawn: Option<Token>,
    grab: Option<Token>,
}

impl CoinRush {
    pub fn new() -> Self {
        Self::with_config(CoinRushConfig::load())
    }

    /// Build with `config`, or with defaults if it fails validation.
    pub fn with_config(config: CoinRushConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!(error = %e, "using default coin rush config");
                CoinRushConfig::default()
            },
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            pool: CoinPool::new(),
            rng,
            spawn: None,
            grab: None,
        }
    }

    pub fn config(&self) -> &CoinRushConfig {
        &self.config
    }

    pub fn pool(&self) -> &CoinPool {
        &self.pool
    }

    fn spawn_coin(&mut self) -> Option<usize> {
        let value = if self.rng.random_bool(self.config.golden_chance) {
            self.config.golden_value
        } else {
            self.config.coin_value
        };
        let coin = Coin {
            x: self.rng.random_range(0.0..=self.config.arena_width),
            z: self.rng.random_range(0.0..=self.config.arena_depth),
            value,
        };
        self.pool.acquire(coin)
    }

    /// A random active player grabs a random live coin.
    fn grab_coin(&mut self, players: &mut PlayerRegistry) -> Result<(), RoundError> {
        let active = players.active();
        let live = self.pool.live();
        if active.is_empty() || live.is_empty() {
            return Ok(());
        }
        let player = active[self.rng.random_range(0..active.len())];
        let index = live[self.rng.random_range(0..live.len())];
        let Some(coin) = self.pool.release(index) else {
            return Ok(());
        };
        if let Some(p) = players.get_mut(player) {
            p.addon_mut::<CoinAddon>()?.collect(&coin);
            tracing::trace!(player, value = coin.value, "coin grabbed");
        }
        Ok(())
    }

    fn spawn_step(session: &mut Session) -> Result<(), RoundError> {
        let interval = {
            let mode = session.mode_mut::<CoinRush>()?;
            if mode.spawn_coin().is_none() {
                tracing::trace!("coin pool full");
            }
            mode.config.spawn_interval_secs
        };
        let token = session.schedule_in_round(Channel::Fixed, interval, Self::spawn_step);
        session.mode_mut::<CoinRush>()?.spawn = Some(token);
        Ok(())
    }

    fn grab_step(session: &mut Session) -> Result<(), RoundError> {
        let interval = {
            let (mode, players) = session.mode_and_players::<CoinRush>()?;
            mode.grab_coin(players)?;
            mode.config.grab_interval_secs
        };
        let token = session.schedule_in_round(Channel::Fixed, interval, Self::grab_step);
        session.mode_mut::<CoinRush>()?.grab = Some(token);
        Ok(())
    }

    fn stop_loops(&mut self, ctx: &mut ModeContext<'_>) {
        for token in [self.spawn.take(), self.grab.take()].into_iter().flatten() {
            ctx.scheduler.cancel(token);
        }
    }
}

impl Default for CoinRush {
    fn default() -> Self {
        Self::with_config(CoinRushConfig::default())
    }
}

impl GameMode for CoinRush {
    fn kind(&self) -> ModeKind {
        COIN_RUSH
    }

    fn metadata(&self) -> ModeMetadata {
        ModeMetadata {
            kind: COIN_RUSH,
            name: "Coin Rush".to_string(),
            description: "Grab more coins than everyone else before time runs out.".to_string(),
            min_players: 2,
            round_duration: Duration::try_from_secs_f32(self.config.round_duration_secs)
                .unwrap_or_default(),
        }
    }

    fn init_arena(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        self.pool.prewarm(self.config.max_coins);
        ctx.players.attach_all(|_| CoinAddon::default());
        Ok(())
    }

    fn init_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        let spawn = self.config.spawn_interval_secs;
        let grab = self.config.grab_interval_secs;
        self.spawn = Some(ctx.after(Channel::Fixed, spawn, Self::spawn_step));
        self.grab = Some(ctx.after(Channel::Fixed, grab, Self::grab_step));
        Ok(())
    }

    fn on_time_over(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        self.stop_loops(ctx);
        ctx.end_round_after(0.0);
        Ok(())
    }

    fn end_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<ScoreDeltas, RoundError> {
        self.stop_loops(ctx);
        let mut collected = Vec::with_capacity(ctx.players.len());
        for p in ctx.players.iter() {
            collected.push((p.index, p.addon::<CoinAddon>()?.value));
        }
        Ok(scoring::coin_scores(
            &collected,
            self.config.top_collector_bonus,
        ))
    }

    fn clear_round(&mut self, ctx: &mut ModeContext<'_>) -> Result<(), RoundError> {
        self.stop_loops(ctx);
        let released = self.pool.release_all();
        ctx.players.detach_kind(COIN_RUSH);
        tracing::debug!(released, "coin rush cleared");
        Ok(())
    }
}

impl ModeVariant for CoinRush {
    const KIND: ModeKind = COIN_RUSH;
}
