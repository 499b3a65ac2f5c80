use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::models::{Observation, SongKey};
use crate::store;

/// Fewer than two distinct observation times; no trend can be measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("need at least 2 distinct observation times, found {distinct}")]
pub struct InsufficientHistory {
    pub distinct: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankRow {
    pub song: SongKey,
    /// Aligned with [`RankMatrix::times`]; `None` where the song was not seen.
    pub ranks: Vec<Option<u32>>,
}

/// Best known rank per song and time label, restricted to the recent window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankMatrix {
    times: Vec<String>,
    rows: Vec<RankRow>,
}

impl RankMatrix {
    pub fn times(&self) -> &[String] {
        &self.times
    }

    /// Rows ordered by song title, then artist.
    pub fn rows(&self) -> &[RankRow] {
        &self.rows
    }

    pub fn row(&self, song: &SongKey) -> Option<&RankRow> {
        self.rows
            .binary_search_by(|row| row.song.cmp(song))
            .ok()
            .map(|idx| &self.rows[idx])
    }

    #[cfg(test)]
    pub fn cell(&self, song: &SongKey, time: &str) -> Option<u32> {
        let column = self.times.iter().position(|t| t == time)?;
        self.row(song)?.ranks[column]
    }
}

/// Pivot observations into a song × time rank matrix.
///
/// Time labels are ordered as plain strings. Labels such as `12月31日23时59分`
/// and `01月01日00时00分` therefore sort out of calendar order across a year
/// boundary; the label carries no year to sort by.
///
/// Every song keeps a row even when all of its observations fall outside the
/// `window` most recent labels.
pub fn build_pivot(
    observations: &[Observation],
    window: usize,
) -> Result<RankMatrix, InsufficientHistory> {
    let all_times = store::distinct_times(observations);
    if all_times.len() < 2 {
        return Err(InsufficientHistory {
            distinct: all_times.len(),
        });
    }

    let keep = window.max(1).min(all_times.len());
    let times: Vec<String> = all_times
        .iter()
        .skip(all_times.len() - keep)
        .map(|t| t.to_string())
        .collect();
    let column: HashMap<&str, usize> = times
        .iter()
        .enumerate()
        .map(|(idx, t)| (t.as_str(), idx))
        .collect();

    let mut cells: BTreeMap<SongKey, Vec<Option<u32>>> = BTreeMap::new();
    for obs in observations {
        let ranks = cells
            .entry(obs.song())
            .or_insert_with(|| vec![None; times.len()]);
        if let Some(&idx) = column.get(obs.observation_time.as_str()) {
            let cell = &mut ranks[idx];
            *cell = Some(cell.map_or(obs.rank, |best| best.min(obs.rank)));
        }
    }

    let rows = cells
        .into_iter()
        .map(|(song, ranks)| RankRow { song, ranks })
        .collect();

    Ok(RankMatrix { times, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(rank: u32, title: &str, artist: &str, time: &str) -> Observation {
        Observation {
            rank,
            title: title.to_string(),
            artist: artist.to_string(),
            observation_time: time.to_string(),
        }
    }

    fn key(title: &str, artist: &str) -> SongKey {
        SongKey {
            title: title.to_string(),
            artist: artist.to_string(),
        }
    }

    #[test]
    fn duplicate_cells_keep_the_best_rank() {
        let rows = vec![
            obs(7, "Song", "Singer", "T2"),
            obs(3, "Song", "Singer", "T2"),
            obs(9, "Song", "Singer", "T1"),
        ];
        let matrix = build_pivot(&rows, 5).unwrap();
        assert_eq!(matrix.cell(&key("Song", "Singer"), "T2"), Some(3));
        assert_eq!(matrix.cell(&key("Song", "Singer"), "T1"), Some(9));
    }

    #[test]
    fn single_time_label_is_insufficient() {
        let rows = vec![obs(1, "A", "X", "T1"), obs(2, "B", "Y", "T1")];
        assert_eq!(build_pivot(&rows, 5), Err(InsufficientHistory { distinct: 1 }));
        assert_eq!(build_pivot(&[], 5), Err(InsufficientHistory { distinct: 0 }));
    }

    #[test]
    fn keeps_only_the_most_recent_window() {
        let rows: Vec<Observation> = (1..=7)
            .map(|i| obs(i, "A", "X", &format!("T{i}")))
            .collect();
        let matrix = build_pivot(&rows, 5).unwrap();
        assert_eq!(matrix.times(), ["T3", "T4", "T5", "T6", "T7"]);
        assert_eq!(
            matrix.row(&key("A", "X")).unwrap().ranks,
            vec![Some(3), Some(4), Some(5), Some(6), Some(7)]
        );
    }

    #[test]
    fn missing_observations_stay_absent() {
        let rows = vec![
            obs(5, "A", "X", "T1"),
            obs(2, "A", "X", "T2"),
            obs(50, "B", "Y", "T1"),
        ];
        let matrix = build_pivot(&rows, 5).unwrap();
        assert_eq!(matrix.cell(&key("B", "Y"), "T2"), None);
        assert_eq!(matrix.row(&key("B", "Y")).unwrap().ranks, vec![Some(50), None]);
    }

    #[test]
    fn songs_outside_the_window_keep_an_empty_row() {
        let rows = vec![
            obs(1, "Old", "X", "T1"),
            obs(2, "New", "Y", "T2"),
            obs(3, "New", "Y", "T3"),
        ];
        let matrix = build_pivot(&rows, 2).unwrap();
        assert_eq!(matrix.times(), ["T2", "T3"]);
        assert_eq!(matrix.row(&key("Old", "X")).unwrap().ranks, vec![None, None]);
    }

    #[test]
    fn labels_sort_as_strings_not_dates() {
        let rows = vec![
            obs(4, "A", "X", "12月31日23时59分"),
            obs(1, "A", "X", "01月01日00时01分"),
        ];
        let matrix = build_pivot(&rows, 5).unwrap();
        assert_eq!(matrix.times(), ["01月01日00时01分", "12月31日23时59分"]);
    }

    #[test]
    fn rows_are_ordered_by_title_then_artist() {
        let rows = vec![
            obs(1, "B", "X", "T1"),
            obs(2, "A", "Z", "T1"),
            obs(3, "A", "Y", "T2"),
        ];
        let matrix = build_pivot(&rows, 5).unwrap();
        let songs: Vec<&SongKey> = matrix.rows().iter().map(|r| &r.song).collect();
        assert_eq!(songs, vec![&key("A", "Y"), &key("A", "Z"), &key("B", "X")]);
    }
}
