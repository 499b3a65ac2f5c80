use std::time::Duration;

pub const DEFAULT_SOURCE_URL: &str =
    "https://www.kugou.com/yy/rank/home/{page}-6666.html?from=rank";
pub const DEFAULT_PAGES: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PAUSE_MS: u64 = 500;
pub const MAX_CHART_ENTRIES: usize = 100;

pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    /// URL with a `{page}` placeholder.
    pub source_url: String,
    pub pages: u32,
    pub timeout: Duration,
    pub pause: Duration,
    pub max_entries: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            pages: DEFAULT_PAGES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pause: Duration::from_millis(DEFAULT_PAUSE_MS),
            max_entries: MAX_CHART_ENTRIES,
        }
    }
}

impl ScrapeConfig {
    pub fn page_url(&self, page: u32) -> String {
        self.source_url.replace("{page}", &page.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendConfig {
    /// Most recent time labels kept for scoring and charting.
    pub window: usize,
    pub top_k: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            top_k: DEFAULT_TOP_K,
        }
    }
}
