use std::collections::BTreeSet;

use crate::models::{Observation, ObservationTable};

/// Append freshly scraped observations to the saved history.
///
/// Rows are never deduplicated here. Repeated (song, time) pairs are
/// resolved when the rank matrix is built.
pub fn merge(history: Option<ObservationTable>, new: ObservationTable) -> ObservationTable {
    match history {
        None => new,
        Some(mut merged) => {
            merged.extend(new);
            merged
        }
    }
}

/// Distinct observation time labels in lexicographic order.
pub fn distinct_times(observations: &[Observation]) -> BTreeSet<&str> {
    observations
        .iter()
        .map(|obs| obs.observation_time.as_str())
        .collect()
}
