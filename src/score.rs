use crate::models::ScoreRecord;
use crate::pivot::RankMatrix;

/// Points per position gained since the previous observation.
pub const TREND_WEIGHT: i64 = 2;

/// Momentum score of one song from its ranks, oldest first.
///
/// A song missing from the latest observation scores 0. Otherwise the score
/// is `101 - current` plus twice the positions gained since the previous
/// observation, when that observation exists. Ranks are not clamped.
pub fn score(ranks: &[Option<u32>]) -> f64 {
    let Some(&Some(current)) = ranks.last() else {
        return 0.0;
    };
    let current = i64::from(current);
    let base = 101 - current;

    let previous = ranks.len().checked_sub(2).and_then(|idx| ranks[idx]);
    let trend = previous.map_or(0, |prev| (i64::from(prev) - current) * TREND_WEIGHT);

    (base + trend) as f64
}

pub fn score_matrix(matrix: &RankMatrix) -> Vec<ScoreRecord> {
    matrix
        .rows()
        .iter()
        .map(|row| ScoreRecord {
            song: row.song.clone(),
            score: score(&row.ranks),
            current_rank: row.ranks.last().copied().flatten(),
        })
        .collect()
}
