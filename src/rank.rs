use std::cmp::Ordering;

use crate::models::{ChartMatrix, Prediction, RankedSong, ScoreRecord};
use crate::pivot::RankMatrix;

/// Highest score first; equal scores fall back to title, then artist.
fn by_score_desc(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.song.cmp(&b.song))
}

/// Keep the `k` best scoring songs and cut their rows out of the matrix.
pub fn select_top(mut scores: Vec<ScoreRecord>, matrix: &RankMatrix, k: usize) -> Prediction {
    scores.sort_by(by_score_desc);
    scores.truncate(k);

    let columns: Vec<&[Option<u32>]> = scores
        .iter()
        .map(|record| {
            matrix
                .row(&record.song)
                .map(|row| row.ranks.as_slice())
                .unwrap_or(&[])
        })
        .collect();

    let rows = (0..matrix.times().len())
        .map(|t| {
            columns
                .iter()
                .map(|ranks| ranks.get(t).copied().flatten())
                .collect()
        })
        .collect();

    let chart = ChartMatrix {
        times: matrix.times().to_vec(),
        songs: scores.iter().map(|record| record.song.clone()).collect(),
        rows,
    };

    let ranked = scores
        .into_iter()
        .map(|record| RankedSong {
            title: record.song.title,
            artist: record.song.artist,
            current_rank: record.current_rank,
            score: record.score,
        })
        .collect();

    Prediction { ranked, chart }
}
