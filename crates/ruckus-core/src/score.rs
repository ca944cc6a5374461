use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game_mode::{PlayerIndex, ScoreDeltas};
use crate::player::PlayerRegistry;

/// Score entry for a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub player: PlayerIndex,
    pub name: String,
    pub score: i32,
}

/// Final result of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub rounds_played: u32,
    /// Totals sorted by score, highest first.
    pub standings: Vec<PlayerScore>,
    /// Every player tied for the highest total.
    pub winners: Vec<PlayerIndex>,
}

/// Cumulative scores across rounds.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    totals: BTreeMap<PlayerIndex, i32>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `player` at zero so they appear in the standings even if they never score.
    pub fn register(&mut self, player: PlayerIndex) {
        self.totals.entry(player).or_insert(0);
    }

    pub fn add(&mut self, player: PlayerIndex, delta: i32) {
        let total = self.totals.entry(player).or_insert(0);
        *total = total.saturating_add(delta);
    }

    pub fn apply(&mut self, deltas: &ScoreDeltas) {
        for (&player, &delta) in deltas {
            self.add(player, delta);
        }
    }

    pub fn total(&self, player: PlayerIndex) -> i32 {
        self.totals.get(&player).copied().unwrap_or(0)
    }

    pub fn totals(&self) -> &BTreeMap<PlayerIndex, i32> {
        &self.totals
    }

    /// Final standings, named from `players`.
    pub fn outcome(&self, rounds_played: u32, players: &PlayerRegistry) -> GameOutcome {
        let mut standings: Vec<PlayerScore> = self
            .totals
            .iter()
            .map(|(&player, &score)| PlayerScore {
                player,
                name: players.name(player).to_string(),
                score,
            })
            .collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score).then(a.player.cmp(&b.player)));

        let winners = match standings.first() {
            Some(top) => standings
                .iter()
                .take_while(|s| s.score == top.score)
                .map(|s| s.player)
                .collect(),
            None => Vec::new(),
        };

        GameOutcome {
            rounds_played,
            standings,
            winners,
        }
    }
}
