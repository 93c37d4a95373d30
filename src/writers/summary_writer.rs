use crate::error::Result;
use crate::models::DailySummary;
use crate::utils::paths::{atomic_write, summary_file};
use chrono::Datelike;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Writes daily summaries as one CSV per station and year.
pub struct SummaryWriter {
    root: PathBuf,
}

impl SummaryWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write one station's summaries, splitting by year.
    /// Returns the paths written.
    pub fn write_station(&self, station_id: &str, summaries: &[DailySummary]) -> Result<Vec<PathBuf>> {
        let mut by_year: BTreeMap<i32, Vec<&DailySummary>> = BTreeMap::new();
        for summary in summaries {
            by_year.entry(summary.date.year()).or_default().push(summary);
        }

        let mut written = Vec::with_capacity(by_year.len());
        for (year, mut rows) in by_year {
            rows.sort_by_key(|s| s.date);
            let path = summary_file(&self.root, year, station_id);
            write_rows(&path, &rows)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn write_rows(path: &Path, rows: &[&DailySummary]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for summary in rows {
        writer.serialize(summary.to_row())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    atomic_write(path, &bytes)
}
