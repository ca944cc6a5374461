use serde::Deserialize;

use ruckus_core::config::SessionConfig;

/// Top-level host configuration, loaded from `ruckus.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub session: SessionConfig,
    pub pump: PumpConfig,
    pub players: PlayersConfig,
    pub run: RunConfig,
}

/// Frame pacing for the frame pump.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Rendered frames per second (variable channel).
    pub frame_rate_hz: f32,
    /// Physics steps per second (fixed channel).
    pub fixed_rate_hz: f32,
    /// Cap on fixed steps per frame; leftover time is dropped.
    pub max_fixed_steps_per_frame: u32,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: 60.0,
            fixed_rate_hz: 50.0,
            max_fixed_steps_per_frame: 5,
        }
    }
}

impl PumpConfig {
    pub fn frame_dt(&self) -> f32 {
        1.0 / self.frame_rate_hz
    }

    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.fixed_rate_hz
    }
}

/// Seated players.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayersConfig {
    pub names: Vec<String>,
}

impl Default for PlayersConfig {
    fn default() -> Self {
        Self {
            names: numbered_players(4),
        }
    }
}

/// How the binary drives the session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Simulate frames back to back instead of in real time.
    pub headless: bool,
    /// Give up on a session that has not finished after this much game time.
    pub max_session_secs: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            headless: false,
            max_session_secs: 3600.0,
        }
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn numbered_players(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Player{i}")).collect()
}

/// `RUCKUS_PLAYERS` is either a player count or a comma-separated list of names.
fn parse_players(value: &str) -> Vec<String> {
    if let Ok(count) = value.trim().parse::<usize>() {
        return numbered_players(count);
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

impl HostConfig {
    /// Validate configuration, exiting on values the session cannot run with.
    pub fn validate(&self) {
        if let Err(e) = self.session.validate() {
            tracing::error!(error = %e, "invalid session configuration");
            std::process::exit(1);
        }
        if !positive(self.pump.frame_rate_hz) {
            tracing::error!("pump.frame_rate_hz must be > 0");
            std::process::exit(1);
        }
        if !positive(self.pump.fixed_rate_hz) {
            tracing::error!("pump.fixed_rate_hz must be > 0");
            std::process::exit(1);
        }
        if self.pump.max_fixed_steps_per_frame == 0 {
            tracing::error!("pump.max_fixed_steps_per_frame must be > 0");
            std::process::exit(1);
        }
        if self.players.names.is_empty() {
            tracing::error!("at least one player is required");
            std::process::exit(1);
        }
        if self.players.names.len() > usize::from(u8::MAX) {
            tracing::error!(count = self.players.names.len(), "too many players");
            std::process::exit(1);
        }
        if !positive(self.run.max_session_secs) {
            tracing::error!("run.max_session_secs must be > 0");
            std::process::exit(1);
        }

        if self.players.names.len() == 1 {
            tracing::warn!("only one player configured; every mode expects at least two");
        }
        let max_fixed_rate = self.pump.frame_rate_hz * self.pump.max_fixed_steps_per_frame as f32;
        if self.pump.fixed_rate_hz > max_fixed_rate {
            tracing::warn!(
                fixed_rate_hz = self.pump.fixed_rate_hz,
                frame_rate_hz = self.pump.frame_rate_hz,
                "fixed rate exceeds max_fixed_steps_per_frame; fixed time will be dropped"
            );
        }
    }

    /// Load config from `ruckus.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("ruckus.toml") {
            Ok(content) => match toml::from_str::<HostConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from ruckus.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse ruckus.toml: {e}, using defaults");
                    HostConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No ruckus.toml found, using defaults");
                HostConfig::default()
            },
        };

        if let Ok(val) = std::env::var("RUCKUS_TOTAL_ROUNDS")
            && let Ok(n) = val.parse::<u32>()
        {
            config.session.total_rounds = n;
        }
        if let Ok(val) = std::env::var("RUCKUS_LEAD_TIME")
            && let Ok(secs) = val.parse::<f32>()
        {
            config.session.lead_time_secs = secs;
        }
        if let Ok(val) = std::env::var("RUCKUS_ROUND_DURATION")
            && let Ok(secs) = val.parse::<f32>()
        {
            config.session.round_duration_override_secs = Some(secs);
        }
        if let Ok(val) = std::env::var("RUCKUS_SEED")
            && let Ok(seed) = val.parse::<u64>()
        {
            config.session.selection.seed = Some(seed);
        }
        if let Ok(val) = std::env::var("RUCKUS_PLAYERS")
            && !val.is_empty()
        {
            config.players.names = parse_players(&val);
        }
        if let Ok(val) = std::env::var("RUCKUS_FRAME_RATE")
            && let Ok(hz) = val.parse::<f32>()
        {
            config.pump.frame_rate_hz = hz;
        }
        if let Ok(val) = std::env::var("RUCKUS_HEADLESS") {
            config.run.headless = matches!(val.as_str(), "1" | "true" | "yes");
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruckus_core::config::SelectionStrategy;

    #[test]
    fn default_config_values() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.session.total_rounds, 5);
        assert_eq!(cfg.players.names, vec!["Player1", "Player2", "Player3", "Player4"]);
        assert!((cfg.pump.frame_rate_hz - 60.0).abs() < f32::EPSILON);
        assert_eq!(cfg.pump.max_fixed_steps_per_frame, 5);
        assert!(!cfg.run.headless);
    }

    #[test]
    fn validate_accepts_valid_config() {
        // Default config should pass validation without exiting
        HostConfig::default().validate();
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[session]
total_rounds = 3
lead_time_secs = 2.0
round_duration_override_secs = 15.0

[session.selection]
strategy = "ordered"
seed = 99

[pump]
fixed_rate_hz = 30.0

[players]
names = ["Ana", "Bo"]

[run]
headless = true
"#;
        let cfg: HostConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.session.total_rounds, 3);
        assert_eq!(cfg.session.round_duration_override_secs, Some(15.0));
        assert_eq!(cfg.session.selection.strategy, SelectionStrategy::Ordered);
        assert_eq!(cfg.session.selection.seed, Some(99));
        assert!(cfg.session.selection.cycle, "unset fields keep defaults");
        assert!((cfg.pump.fixed_rate_hz - 30.0).abs() < f32::EPSILON);
        assert!((cfg.pump.frame_rate_hz - 60.0).abs() < f32::EPSILON);
        assert_eq!(cfg.players.names, vec!["Ana", "Bo"]);
        assert!(cfg.run.headless);
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg: HostConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.session, SessionConfig::default());
        assert_eq!(cfg.players.names.len(), 4);
    }

    #[test]
    fn players_from_count_or_names() {
        assert_eq!(parse_players("2"), vec!["Player1", "Player2"]);
        assert_eq!(parse_players("Ana, Bo,,Cy "), vec!["Ana", "Bo", "Cy"]);
    }

    #[test]
    fn pump_steps() {
        let pump = PumpConfig {
            frame_rate_hz: 4.0,
            fixed_rate_hz: 8.0,
            max_fixed_steps_per_frame: 3,
        };
        assert!((pump.frame_dt() - 0.25).abs() < f32::EPSILON);
        assert!((pump.fixed_dt() - 0.125).abs() < f32::EPSILON);
    }
}
