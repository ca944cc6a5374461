use serde::{Deserialize, Serialize};

use ruckus_core::error::RoundError;

/// Data-driven configuration for Coin Rush.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinRushConfig {
    /// Round duration in seconds.
    pub round_duration_secs: f32,
    /// Seconds between coin spawns (fixed channel).
    pub spawn_interval_secs: f32,
    /// Seconds between grabs (fixed channel).
    pub grab_interval_secs: f32,
    /// Pool capacity; no more coins than this are ever live.
    pub max_coins: usize,
    /// Value of an ordinary coin.
    pub coin_value: u32,
    /// Value of a golden coin.
    pub golden_value: u32,
    /// Probability that a spawned coin is golden.
    pub golden_chance: f64,
    /// Bonus awarded to the top collector(s).
    pub top_collector_bonus: i32,
    /// Arena extents for spawn positions.
    pub arena_width: f32,
    pub arena_depth: f32,
    /// Fixed RNG seed; random when unset.
    pub seed: Option<u64>,
}

impl Default for CoinRushConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 30.0,
            spawn_interval_secs: 0.5,
            grab_interval_secs: 0.75,
            max_coins: 12,
            coin_value: 1,
            golden_value: 3,
            golden_chance: 0.1,
            top_collector_bonus: 2,
            arena_width: 20.0,
            arena_depth: 12.0,
            seed: None,
        }
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(message: &str) -> Result<(), RoundError> {
    Err(RoundError::Config(format!("coin rush: {message}")))
}

impl CoinRushConfig {
    /// Check value ranges. Returns the first problem found.
    pub fn validate(&self) -> Result<(), RoundError> {
        if !positive(self.round_duration_secs) {
            return invalid("round_duration_secs must be > 0");
        }
        if !positive(self.spawn_interval_secs) || !positive(self.grab_interval_secs) {
            return invalid("spawn and grab intervals must be > 0");
        }
        if self.max_coins == 0 {
            return invalid("max_coins must be > 0");
        }
        if !(0.0..=1.0).contains(&self.golden_chance) {
            return invalid("golden_chance must be between 0 and 1");
        }
        for extent in [self.arena_width, self.arena_depth] {
            if !extent.is_finite() || extent < 0.0 {
                return invalid("arena extents must be non-negative numbers");
            }
        }
        Ok(())
    }

    /// Load from `RUCKUS_COINRUSH_CONFIG`, then `config/coinrush.toml`, then defaults.
    ///
    /// A file that parses but fails [`validate`](Self::validate) is skipped.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("RUCKUS_COINRUSH_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
        {
            match Self::parse(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to load {path}: {e}, trying defaults"),
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/coinrush.toml") {
            match Self::parse(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to load config/coinrush.toml: {e}"),
            }
        }
        Self::default()
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self, RoundError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| RoundError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
