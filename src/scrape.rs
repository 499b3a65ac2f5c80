//! Chart page scraping.
//!
//! Pages are fetched one at a time with a pause in between. Each list entry
//! either becomes an [`Observation`] or is counted as skipped with a reason.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ScrapeConfig;
use crate::models::{Observation, ObservationTable, UNKNOWN_ARTIST};

/// Minute-granularity label stamped on every entry of one scrape.
pub const TIME_LABEL_FORMAT: &str = "%m月%d日%H时%M分";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";
const SOURCE_REFERER: &str = "https://www.kugou.com/";

const ENTRY_SELECTOR: &str = ".pc_temp_songlist > ul > li";
const RANK_SELECTOR: &str = ".pc_temp_num";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request for page {page} failed: {source}")]
    Request {
        page: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("page {page} returned HTTP {status}")]
    Status { page: u32, status: u16 },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid selector {selector:?}: {message}")]
    Selector {
        selector: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("entry has no rank element")]
    MissingRank,
    #[error("rank {0:?} is not a positive integer")]
    BadRank(String),
    #[error("entry has no title")]
    EmptyTitle,
}

pub fn time_label(at: NaiveDateTime) -> String {
    at.format(TIME_LABEL_FORMAT).to_string()
}

/// Split an `artist - title` label on its first `-`.
pub fn split_label(label: &str) -> (String, String) {
    match label.split_once('-') {
        Some((artist, title)) => {
            let artist = artist.trim();
            let artist = if artist.is_empty() { UNKNOWN_ARTIST } else { artist };
            (artist.to_string(), title.trim().to_string())
        }
        None => (UNKNOWN_ARTIST.to_string(), label.trim().to_string()),
    }
}

struct ChartSelectors {
    entry: Selector,
    rank: Selector,
}

impl ChartSelectors {
    fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            entry: parse_selector(ENTRY_SELECTOR)?,
            rank: parse_selector(RANK_SELECTOR)?,
        })
    }
}

fn parse_selector(selector: &'static str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|err| ScrapeError::Selector {
        selector,
        message: err.to_string(),
    })
}

/// Entries found on a single page.
#[derive(Debug, Default)]
pub struct PageExtract {
    /// List items present on the page, extracted or not.
    pub listed: usize,
    pub observations: Vec<Observation>,
    pub skipped: Vec<SkipReason>,
}

fn extract_entry(
    item: ElementRef<'_>,
    selectors: &ChartSelectors,
    observed_at: &str,
) -> Result<Observation, SkipReason> {
    let rank_text: String = item
        .select(&selectors.rank)
        .next()
        .ok_or(SkipReason::MissingRank)?
        .text()
        .collect();
    let rank_text = rank_text.trim();
    let rank = match rank_text.parse::<u32>() {
        Ok(rank) if rank > 0 => rank,
        _ => return Err(SkipReason::BadRank(rank_text.to_string())),
    };

    let label = item.value().attr("title").unwrap_or_default();
    let (artist, title) = split_label(label);
    if title.is_empty() {
        return Err(SkipReason::EmptyTitle);
    }

    Ok(Observation {
        rank,
        title,
        artist,
        observation_time: observed_at.to_string(),
    })
}

/// Extract every list entry of one chart page.
fn parse_page(html: &str, selectors: &ChartSelectors, observed_at: &str) -> PageExtract {
    let document = Html::parse_document(html);
    let mut page = PageExtract::default();

    for item in document.select(&selectors.entry) {
        page.listed += 1;
        match extract_entry(item, selectors, observed_at) {
            Ok(obs) => page.observations.push(obs),
            Err(reason) => {
                debug!(%reason, "skipped chart entry");
                page.skipped.push(reason);
            }
        }
    }
    page
}

#[async_trait]
pub trait PageSource {
    async fn fetch_page(&self, page: u32) -> Result<String, ScrapeError>;
}

pub struct HttpSource {
    client: reqwest::Client,
    config: ScrapeConfig,
}

impl HttpSource {
    pub fn new(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(SOURCE_REFERER));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(ScrapeError::Client)?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch_page(&self, page: u32) -> Result<String, ScrapeError> {
        let url = self.config.page_url(page);
        debug!(%url, "fetching chart page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ScrapeError::Request { page, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                page,
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|source| ScrapeError::Request { page, source })
    }
}

#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Sorted by rank and capped at the configured entry limit.
    pub observations: ObservationTable,
    pub extracted: usize,
    pub skipped: usize,
    pub pages_fetched: u32,
    /// Set when the scrape stopped on an error. Earlier pages are kept.
    pub failure: Option<ScrapeError>,
}

/// Scrape up to `config.pages` chart pages, stamping entries with `observed_at`.
pub async fn scrape_chart<S>(source: &S, config: &ScrapeConfig, observed_at: &str) -> ScrapeReport
where
    S: PageSource + ?Sized,
{
    let mut report = ScrapeReport::default();
    let selectors = match ChartSelectors::new() {
        Ok(selectors) => selectors,
        Err(err) => {
            report.failure = Some(err);
            return report;
        }
    };

    for page in 1..=config.pages {
        info!(page, total = config.pages, "fetching chart page");
        let html = match source.fetch_page(page).await {
            Ok(html) => html,
            Err(err) => {
                warn!(page, error = %err, "scrape aborted");
                report.failure = Some(err);
                break;
            }
        };
        report.pages_fetched += 1;

        let extract = parse_page(&html, &selectors, observed_at);
        info!(
            page,
            extracted = extract.observations.len(),
            skipped = extract.skipped.len(),
            "parsed chart page"
        );
        report.extracted += extract.observations.len();
        report.skipped += extract.skipped.len();
        report.observations.extend(extract.observations);

        if extract.listed == 0 {
            info!(page, "page lists no entries, stopping");
            break;
        }
        if page < config.pages && !config.pause.is_zero() {
            tokio::time::sleep(config.pause).await;
        }
    }

    report.observations.sort_by_key(|obs| obs.rank);
    report.observations.truncate(config.max_entries);
    report
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;

    const STAMP: &str = "10月18日09时30分";

    fn entry(rank: &str, label: &str) -> String {
        format!(
            r#"<li title="{label}"><span class="pc_temp_num">{rank}</span><a>{label}</a></li>"#
        )
    }

    fn page(entries: &[String]) -> String {
        format!(
            r#"<html><body><div class="pc_temp_songlist"><ul>{}</ul></div></body></html>"#,
            entries.concat()
        )
    }

    struct FakeSource {
        pages: HashMap<u32, Result<String, u16>>,
        requested: Mutex<Vec<u32>>,
    }

    impl FakeSource {
        fn new(pages: Vec<(u32, Result<String, u16>)>) -> Self {
            Self {
                pages: pages.into_iter().collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch_page(&self, page: u32) -> Result<String, ScrapeError> {
            self.requested.lock().unwrap().push(page);
            match self.pages.get(&page) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(status)) => Err(ScrapeError::Status { page, status: *status }),
                None => Ok(page_html_empty()),
            }
        }
    }

    fn page_html_empty() -> String {
        page(&[])
    }

    fn config(pages: u32) -> ScrapeConfig {
        ScrapeConfig {
            pages,
            pause: Duration::ZERO,
            ..ScrapeConfig::default()
        }
    }

    #[test]
    fn label_splits_on_first_dash() {
        assert_eq!(
            split_label("周杰伦 - 晴天"),
            ("周杰伦".to_string(), "晴天".to_string())
        );
        assert_eq!(
            split_label("A - B - C"),
            ("A".to_string(), "B - C".to_string())
        );
        assert_eq!(
            split_label("Instrumental"),
            (UNKNOWN_ARTIST.to_string(), "Instrumental".to_string())
        );
    }

    #[test]
    fn time_label_has_minute_granularity() {
        let at = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(9, 30, 59)
            .unwrap();
        assert_eq!(time_label(at), STAMP);
    }

    #[test]
    fn malformed_entries_are_counted_not_dropped_silently() {
        let html = page(&[
            entry("1", "Singer - Song"),
            entry("x", "Singer - Broken"),
            r#"<li title="No rank - Here"></li>"#.to_string(),
            entry("4", "Singer -  "),
            entry("5", "Solo"),
        ]);
        let selectors = ChartSelectors::new().unwrap();
        let extract = parse_page(&html, &selectors, STAMP);

        assert_eq!(extract.listed, 5);
        assert_eq!(extract.observations.len(), 2);
        assert_eq!(
            extract.skipped,
            vec![
                SkipReason::BadRank("x".to_string()),
                SkipReason::MissingRank,
                SkipReason::EmptyTitle,
            ]
        );
        assert_eq!(extract.observations[0].title, "Song");
        assert_eq!(extract.observations[0].artist, "Singer");
        assert_eq!(extract.observations[0].observation_time, STAMP);
        assert_eq!(extract.observations[1].artist, UNKNOWN_ARTIST);
    }

    #[tokio::test]
    async fn stops_at_first_empty_page() {
        let source = FakeSource::new(vec![
            (1, Ok(page(&[entry("2", "A - Two"), entry("1", "A - One")]))),
            (2, Ok(page(&[]))),
            (3, Ok(page(&[entry("3", "A - Three")]))),
        ]);
        let report = scrape_chart(&source, &config(5), STAMP).await;

        assert_eq!(source.requested(), vec![1, 2]);
        assert_eq!(report.pages_fetched, 2);
        assert!(report.failure.is_none());
        let ranks: Vec<u32> = report.observations.iter().map(|o| o.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[tokio::test]
    async fn network_failure_keeps_earlier_pages() {
        let source = FakeSource::new(vec![
            (1, Ok(page(&[entry("1", "A - One")]))),
            (2, Err(503)),
            (3, Ok(page(&[entry("3", "A - Three")]))),
        ]);
        let report = scrape_chart(&source, &config(5), STAMP).await;

        assert_eq!(source.requested(), vec![1, 2]);
        assert_eq!(report.observations.len(), 1);
        assert!(matches!(
            report.failure,
            Some(ScrapeError::Status { page: 2, status: 503 })
        ));
    }

    #[tokio::test]
    async fn output_is_sorted_and_capped() {
        let pages = (1..=5u32)
            .map(|p| {
                let entries: Vec<String> = (1..=25u32)
                    .rev()
                    .map(|i| {
                        let rank = (p - 1) * 25 + i;
                        entry(&rank.to_string(), &format!("Artist - Song {rank}"))
                    })
                    .collect();
                (p, Ok(page(&entries)))
            })
            .collect();
        let source = FakeSource::new(pages);
        let report = scrape_chart(&source, &config(5), STAMP).await;

        assert_eq!(report.extracted, 125);
        assert_eq!(report.observations.len(), 100);
        assert_eq!(report.observations.first().map(|o| o.rank), Some(1));
        assert_eq!(report.observations.last().map(|o| o.rank), Some(100));
        assert!(report.observations.iter().all(|o| o.observation_time == STAMP));
    }
}
