use serde::Serialize;

use crate::countdown::CountdownSlot;
use crate::game_mode::{ModeKind, ScoreDeltas};
use crate::score::GameOutcome;

/// Lifecycle notifications for the presentation layer.
///
/// The session queues these; whoever drives the frame loop drains them with
/// [`Session::drain_events`](crate::session::Session::drain_events).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    CountdownTick {
        slot: CountdownSlot,
        remaining: u32,
    },
    CountdownFinished {
        slot: CountdownSlot,
    },
    RoundStarting {
        round: u32,
        mode: ModeKind,
    },
    RoundPlaying {
        round: u32,
    },
    TimeOver {
        round: u32,
    },
    RoundScored {
        round: u32,
        deltas: ScoreDeltas,
    },
    RoundCleared {
        rounds_played: u32,
    },
    GameEnded {
        outcome: GameOutcome,
    },
}

impl SessionEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
