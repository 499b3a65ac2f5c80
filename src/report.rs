use std::fmt::Write;

use serde::Serialize;

use crate::models::{ChartMatrix, Observation, Prediction};
use crate::pivot::InsufficientHistory;
use crate::store;

fn rank_cell(rank: Option<u32>) -> String {
    rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
}

/// First `n` rows of a fresh scrape, one line each.
pub fn preview(observations: &[Observation], n: usize) -> String {
    let mut output = String::new();
    for obs in observations.iter().take(n) {
        let _ = writeln!(
            output,
            "#{:<3} {} - {} ({})",
            obs.rank, obs.artist, obs.title, obs.observation_time
        );
    }
    output
}

pub fn ranked_table(prediction: &Prediction) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "| # | Title | Artist | Current rank | Score |");
    let _ = writeln!(output, "|---|-------|--------|--------------|-------|");
    for (idx, song) in prediction.ranked.iter().enumerate() {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {:.0} |",
            idx + 1,
            song.title,
            song.artist,
            rank_cell(song.current_rank),
            song.score
        );
    }
    output
}

pub fn chart_table(chart: &ChartMatrix) -> String {
    let mut output = String::new();
    let _ = write!(output, "| Time |");
    for song in &chart.songs {
        let _ = write!(output, " {} |", song.title);
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "|------|{}", "---|".repeat(chart.songs.len()));

    for (time, ranks) in chart.times.iter().zip(&chart.rows) {
        let _ = write!(output, "| {} |", time);
        for rank in ranks {
            let _ = write!(output, " {} |", rank.map(|r| r.to_string()).unwrap_or_default());
        }
        let _ = writeln!(output);
    }
    output
}

pub fn build_report(
    merged: &[Observation],
    outcome: &Result<Prediction, InsufficientHistory>,
) -> String {
    let times = store::distinct_times(merged);
    let mut output = String::new();

    let _ = writeln!(output, "# Chart Trend Report");
    let _ = writeln!(
        output,
        "{} observations across {} scrape times",
        merged.len(),
        times.len()
    );
    if let (Some(first), Some(last)) = (times.first(), times.last()) {
        let _ = writeln!(output, "History: {} to {}", first, last);
    }
    let _ = writeln!(output);

    let prediction = match outcome {
        Ok(prediction) => prediction,
        Err(err) => {
            let _ = writeln!(output, "No prediction: {}.", err);
            let _ = writeln!(
                output,
                "Scrape again later or load an earlier summary to build history."
            );
            return output;
        }
    };

    let window = &prediction.chart.times;
    if let (Some(first), Some(last)) = (window.first(), window.last()) {
        let _ = writeln!(
            output,
            "Scoring window: {} to {} ({} scrape times)",
            first,
            last,
            window.len()
        );
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "## Top {} Rising Songs", prediction.ranked.len());
    if prediction.ranked.is_empty() {
        let _ = writeln!(output, "No songs in this window.");
    } else {
        let _ = write!(output, "{}", ranked_table(prediction));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rank History");
    let _ = writeln!(output, "Lower is better; blank cells mean the song was off the chart.");
    let _ = writeln!(output);
    let _ = write!(output, "{}", chart_table(&prediction.chart));

    output
}

#[derive(Serialize)]
struct ChartSeries<'a> {
    title: &'a str,
    artist: &'a str,
    ranks: Vec<Option<u32>>,
}

#[derive(Serialize)]
struct ChartJson<'a> {
    times: &'a [String],
    series: Vec<ChartSeries<'a>>,
}

/// One series per song with a rank (or `null`) per time label.
pub fn chart_json(chart: &ChartMatrix) -> serde_json::Result<String> {
    let series = chart
        .songs
        .iter()
        .enumerate()
        .map(|(s, song)| ChartSeries {
            title: &song.title,
            artist: &song.artist,
            ranks: chart
                .rows
                .iter()
                .map(|row| row.get(s).copied().flatten())
                .collect(),
        })
        .collect();

    serde_json::to_string_pretty(&ChartJson {
        times: &chart.times,
        series,
    })
}
