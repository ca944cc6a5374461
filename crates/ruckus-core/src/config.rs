use serde::{Deserialize, Serialize};

use crate::error::RoundError;

/// Round pacing for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Rounds to play before the game ends.
    pub total_rounds: u32,
    /// Lead-in countdown before each round (seconds).
    pub lead_time_secs: f32,
    /// Pause after scoring before the round is cleared (seconds).
    pub score_display_secs: f32,
    /// Overrides every mode's own round duration when set.
    pub round_duration_override_secs: Option<f32>,
    pub selection: SelectionConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            lead_time_secs: 5.0,
            score_display_secs: 3.0,
            round_duration_override_secs: None,
            selection: SelectionConfig::default(),
        }
    }
}

/// How the next mode is picked each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Registration order.
    Ordered,
    /// Random, proportional to each mode's weight.
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub strategy: SelectionStrategy,
    /// Start over from the first mode when the ordered list runs out.
    pub cycle: bool,
    /// Weighted only: skip the mode just played when another is available.
    pub avoid_repeat: bool,
    pub seed: Option<u64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::Weighted,
            cycle: true,
            avoid_repeat: true,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Check value ranges. Returns the first problem found.
    pub fn validate(&self) -> Result<(), RoundError> {
        if self.total_rounds == 0 {
            return Err(RoundError::Config("total_rounds must be > 0".to_string()));
        }
        if !self.lead_time_secs.is_finite() || self.lead_time_secs < 0.0 {
            return Err(RoundError::Config(
                "lead_time_secs must be a non-negative number".to_string(),
            ));
        }
        if !self.score_display_secs.is_finite() || self.score_display_secs < 0.0 {
            return Err(RoundError::Config(
                "score_display_secs must be a non-negative number".to_string(),
            ));
        }
        if let Some(secs) = self.round_duration_override_secs
            && (!secs.is_finite() || secs <= 0.0)
        {
            return Err(RoundError::Config(
                "round_duration_override_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, RoundError> {
        toml::from_str(content).map_err(|e| RoundError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.total_rounds, 5);
        assert!((cfg.lead_time_secs - 5.0).abs() < f32::EPSILON);
        assert!(cfg.round_duration_override_secs.is_none());
        assert_eq!(cfg.selection.strategy, SelectionStrategy::Weighted);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_partial_toml_uses_defaults() {
        let cfg = SessionConfig::from_toml(
            r#"
total_rounds = 2

[selection]
strategy = "ordered"
"#,
        )
        .unwrap();
        assert_eq!(cfg.total_rounds, 2);
        assert_eq!(cfg.selection.strategy, SelectionStrategy::Ordered);
        assert!(cfg.selection.cycle);
        assert!((cfg.score_display_secs - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn validate_rejects_zero_rounds() {
        let cfg = SessionConfig {
            total_rounds: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RoundError::Config(_))));
    }

    #[test]
    fn validate_rejects_bad_override() {
        let cfg = SessionConfig {
            round_duration_override_secs: Some(0.0),
            ..SessionConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = SessionConfig::from_toml("total_rounds = \"many\"").unwrap_err();
        assert!(matches!(err, RoundError::Config(_)));
    }
}
