use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use calamine::{open_workbook_auto, Data, Reader};
use thiserror::Error;

use crate::models::{Observation, ObservationTable};

/// Header row written to every summary file.
pub const COLUMNS: [&str; 4] = ["rank", "title", "artist", "observation_time"];

/// Header names used by summary files from the earlier version of the tool.
const LEGACY_COLUMNS: [&str; 4] = ["榜单名次", "纯歌曲名称", "歌手", "爬取时间"];

/// Extensions read as spreadsheets rather than CSV.
const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("workbook {0} has no sheets")]
    NoSheet(PathBuf),
    #[error("summary is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),
    #[error("summary line {line}: {reason}")]
    InvalidRow { line: u64, reason: &'static str },
    #[error("malformed summary row: {0}")]
    Csv(#[from] csv::Error),
}

/// Load a summary file, reading `.xlsx` and friends as workbooks and anything
/// else as CSV.
pub fn import_table(path: &Path) -> Result<ObservationTable, LoadError> {
    let is_workbook = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if is_workbook {
        return import_workbook(path);
    }

    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_table(file)
}

pub fn read_table<R: io::Read>(input: R) -> Result<ObservationTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(input);
    let headers = reader.headers()?.clone();
    let names: Vec<&str> = headers.iter().collect();
    locate_columns(&names)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |pos| pos.line());
        let row: Observation = record.deserialize(Some(&headers))?;
        rows.push(check_row(row, line)?);
    }
    Ok(rows)
}

fn import_workbook(path: &Path) -> Result<ObservationTable, LoadError> {
    let workbook_error = |source: calamine::Error| LoadError::Workbook {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::NoSheet(path.to_path_buf()))?
        .map_err(workbook_error)?;
    let first_line = range.start().map_or(0, |(row, _)| u64::from(row)) + 1;

    let mut lines = range.rows();
    let Some(header_row) = lines.next() else {
        return Err(LoadError::MissingColumns(COLUMNS.to_vec()));
    };
    let names: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let [rank_col, title_col, artist_col, time_col] = locate_columns(&names)?;

    let mut rows = Vec::new();
    for (idx, cells) in lines.enumerate() {
        let line = first_line + idx as u64 + 1;
        if cells.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let text = |col: usize| {
            cells
                .get(col)
                .map(|cell| cell.to_string().trim().to_string())
                .unwrap_or_default()
        };
        let row = Observation {
            rank: cell_rank(cells.get(rank_col), line)?,
            title: text(title_col),
            artist: text(artist_col),
            observation_time: text(time_col),
        };
        rows.push(check_row(row, line)?);
    }
    Ok(rows)
}

fn cell_rank(cell: Option<&Data>, line: u64) -> Result<u32, LoadError> {
    let invalid = |reason| LoadError::InvalidRow { line, reason };
    let value = match cell {
        Some(Data::Int(n)) => *n,
        Some(Data::Float(f)) if f.fract() == 0.0 => *f as i64,
        Some(Data::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid("rank is not a whole number"))?,
        _ => return Err(invalid("rank is not a whole number")),
    };
    u32::try_from(value).map_err(|_| invalid("rank must be at least 1"))
}

/// Reject rows the rank matrix cannot hold: rank 0 or a blank title or time.
fn check_row(row: Observation, line: u64) -> Result<Observation, LoadError> {
    let reason = if row.rank == 0 {
        "rank must be at least 1"
    } else if row.title.trim().is_empty() {
        "title is empty"
    } else if row.observation_time.trim().is_empty() {
        "observation time is empty"
    } else {
        return Ok(row);
    };
    Err(LoadError::InvalidRow { line, reason })
}

/// Column positions of rank, title, artist and time, matched by current or
/// legacy header name.
fn locate_columns<S: AsRef<str>>(headers: &[S]) -> Result<[usize; 4], LoadError> {
    let mut found = [0usize; 4];
    let mut missing = Vec::new();
    for (slot, (name, legacy)) in COLUMNS.iter().zip(LEGACY_COLUMNS.iter()).enumerate() {
        match headers.iter().position(|h| h.as_ref() == *name || h.as_ref() == *legacy) {
            Some(idx) => found[slot] = idx,
            None => missing.push(*name),
        }
    }
    if missing.is_empty() {
        Ok(found)
    } else {
        Err(LoadError::MissingColumns(missing))
    }
}

pub fn write_table<W: io::Write>(output: W, table: &[Observation]) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.write_record(COLUMNS)?;
    for row in table {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn default_export_name(date: NaiveDate) -> String {
    format!("chart_summary_{}.csv", date.format("%Y%m%d"))
}

/// Write the summary into `dir` under a name carrying `date`.
pub fn export_table(
    table: &[Observation],
    dir: &Path,
    date: NaiveDate,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(default_export_name(date));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_table(io::BufWriter::new(file), table)?;
    Ok(path)
}
