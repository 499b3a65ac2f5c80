use std::path::Path;

use tracing::{info, warn};

use crate::config::TrendConfig;
use crate::models::{Observation, ObservationTable, Prediction};
use crate::persist::{self, LoadError};
use crate::pivot::{self, InsufficientHistory};
use crate::rank;
use crate::score;

/// State carried between user actions: the latest scrape and any loaded
/// history.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub last_scraped: Option<ObservationTable>,
    pub history: Option<ObservationTable>,
}

impl Session {
    pub fn record_scrape(&mut self, observations: ObservationTable) {
        self.last_scraped = Some(observations);
    }

    /// Load a previously exported summary. A file that cannot be read leaves
    /// the session without history and the error is returned for reporting.
    pub fn load_history(&mut self, path: &Path) -> Result<usize, LoadError> {
        match persist::import_table(path) {
            Ok(table) => {
                let count = table.len();
                info!(path = %path.display(), rows = count, "loaded history");
                self.history = Some(table);
                Ok(count)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "history ignored");
                self.history = None;
                Err(err)
            }
        }
    }

    /// History followed by the latest scrape, or `None` before any scrape.
    pub fn merged(&self) -> Option<ObservationTable> {
        let new = self.last_scraped.clone()?;
        Some(crate::store::merge(self.history.clone(), new))
    }
}

/// Pivot, score and rank a merged observation table.
pub fn predict(
    observations: &[Observation],
    config: &TrendConfig,
) -> Result<Prediction, InsufficientHistory> {
    let matrix = pivot::build_pivot(observations, config.window)?;
    let scores = score::score_matrix(&matrix);
    Ok(rank::select_top(scores, &matrix, config.top_k))
}
