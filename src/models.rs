use serde::{Deserialize, Serialize};

/// Artist recorded when a chart label carries no `artist - title` separator.
pub const UNKNOWN_ARTIST: &str = "unknown";

/// One chart position seen by a single scrape.
///
/// Column names are the ones written to the summary spreadsheet. The aliases
/// accept summary files produced by the earlier version of the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(alias = "榜单名次")]
    pub rank: u32,
    #[serde(alias = "纯歌曲名称")]
    pub title: String,
    #[serde(alias = "歌手")]
    pub artist: String,
    #[serde(alias = "爬取时间")]
    pub observation_time: String,
}

impl Observation {
    pub fn song(&self) -> SongKey {
        SongKey {
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

/// Observations in no particular order; duplicates are allowed.
pub type ObservationTable = Vec<Observation>;

/// Identity of a song across scrapes.
///
/// Ordering is title first, then artist. Ranking ties fall back to it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SongKey {
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub song: SongKey,
    pub score: f64,
    pub current_rank: Option<u32>,
}

/// A row of the ranked prediction table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSong {
    pub title: String,
    pub artist: String,
    pub current_rank: Option<u32>,
    pub score: f64,
}

/// Time × song ranks of the selected songs, ready for a line chart.
///
/// `rows[t][s]` is the rank of `songs[s]` at `times[t]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartMatrix {
    pub times: Vec<String>,
    pub songs: Vec<SongKey>,
    pub rows: Vec<Vec<Option<u32>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub ranked: Vec<RankedSong>,
    pub chart: ChartMatrix,
}
