use ruckus_core::game_mode::{PlayerIndex, ScoreDeltas};

use crate::config::HotPotatoConfig;

/// Scores for a finished round.
///
/// `held` lists each player's total time holding the potato. The `holder`
/// loses `explode_penalty`; everyone else gets `survivor_points`, and the
/// survivor(s) with the least time held get `coolest_hands_bonus` on top.
pub fn potato_scores(
    held: &[(PlayerIndex, f32)],
    holder: Option<PlayerIndex>,
    config: &HotPotatoConfig,
) -> ScoreDeltas {
    let coolest = held
        .iter()
        .filter(|&&(p, _)| Some(p) != holder)
        .map(|&(_, secs)| secs)
        .fold(f32::INFINITY, f32::min);

    held.iter()
        .map(|&(player, secs)| {
            let score = if Some(player) == holder {
                config.explode_penalty.saturating_neg()
            } else if secs <= coolest {
                config
                    .survivor_points
                    .saturating_add(config.coolest_hands_bonus)
            } else {
                config.survivor_points
            };
            (player, score)
        })
        .collect()
}
