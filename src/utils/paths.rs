use crate::error::Result;
use crate::utils::constants::{DAILY_SUMMARY_DIR, IMAGE_FILE_SUFFIX, SUMMARY_FILE_PREFIX};
use chrono::NaiveDate;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// `<root>/daily_station_data/<year>`
pub fn summary_year_dir(root: &Path, year: i32) -> PathBuf {
    root.join(DAILY_SUMMARY_DIR).join(year.to_string())
}

/// `<root>/daily_station_data/<year>/_<station>.csv`
pub fn summary_file(root: &Path, year: i32, station_id: &str) -> PathBuf {
    summary_year_dir(root, year).join(format!("{}{}.csv", SUMMARY_FILE_PREFIX, station_id))
}

/// Recover the station id from a summary file name.
pub fn station_id_from_summary_file(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let id = stem.strip_prefix(SUMMARY_FILE_PREFIX).unwrap_or(stem);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

pub fn image_file_name(date: NaiveDate) -> String {
    format!("{}{}", date.format("%Y-%m-%d"), IMAGE_FILE_SUFFIX)
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// so readers never observe a partially written file.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a temporary file next to `path` for callers that stream their
/// output; finish with `NamedTempFile::persist`.
pub fn temp_file_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;
    Ok(NamedTempFile::new_in(dir)?)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
