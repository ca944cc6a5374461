use ruckus_core::game_mode::{PlayerIndex, ScoreDeltas};

/// Score = collected coin value, plus `bonus` for every player tied for the
/// most. Nobody gets the bonus if nothing was collected.
pub fn coin_scores(collected: &[(PlayerIndex, u32)], bonus: i32) -> ScoreDeltas {
    let best = collected.iter().map(|&(_, v)| v).max().unwrap_or(0);
    collected
        .iter()
        .map(|&(player, value)| {
            let mut score = i32::try_from(value).unwrap_or(i32::MAX);
            if best > 0 && value == best {
                score = score.saturating_add(bonus);
            }
            (player, score)
        })
        .collect()
}
