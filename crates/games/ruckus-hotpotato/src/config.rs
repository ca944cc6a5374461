use serde::{Deserialize, Serialize};

use ruckus_core::error::RoundError;

/// Data-driven configuration for Hot Potato.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotPotatoConfig {
    /// Round duration in seconds.
    pub round_duration_secs: f32,
    /// Seconds between passes (variable channel).
    pub pass_interval_secs: f32,
    /// Time between the round timer running out and the explosion.
    pub fuse_secs: f32,
    /// Points lost by whoever holds the potato when it explodes.
    pub explode_penalty: i32,
    /// Points for everyone else.
    pub survivor_points: i32,
    /// Extra points for the survivor(s) who held it the least.
    pub coolest_hands_bonus: i32,
    /// Fixed RNG seed; random when unset.
    pub seed: Option<u64>,
}

impl Default for HotPotatoConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 20.0,
            pass_interval_secs: 1.5,
            fuse_secs: 1.0,
            explode_penalty: 2,
            survivor_points: 1,
            coolest_hands_bonus: 1,
            seed: None,
        }
    }
}

fn invalid(message: &str) -> Result<(), RoundError> {
    Err(RoundError::Config(format!("hot potato: {message}")))
}

impl HotPotatoConfig {
    /// Check value ranges. Returns the first problem found.
    pub fn validate(&self) -> Result<(), RoundError> {
        if !self.round_duration_secs.is_finite() || self.round_duration_secs <= 0.0 {
            return invalid("round_duration_secs must be > 0");
        }
        if !self.pass_interval_secs.is_finite() || self.pass_interval_secs <= 0.0 {
            return invalid("pass_interval_secs must be > 0");
        }
        if !self.fuse_secs.is_finite() || self.fuse_secs < 0.0 {
            return invalid("fuse_secs must be a non-negative number");
        }
        if self.explode_penalty < 0 {
            return invalid("explode_penalty must be >= 0");
        }
        Ok(())
    }

    /// Load from `RUCKUS_HOTPOTATO_CONFIG`, then `config/hotpotato.toml`, then defaults.
    ///
    /// A file that parses but fails [`validate`](Self::validate) is skipped.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("RUCKUS_HOTPOTATO_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
        {
            match Self::parse(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to load {path}: {e}, trying defaults"),
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/hotpotato.toml") {
            match Self::parse(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to load config/hotpotato.toml: {e}"),
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
