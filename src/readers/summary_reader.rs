use crate::error::Result;
use crate::models::{DailySummary, SummaryRow};
use crate::utils::paths::{station_id_from_summary_file, summary_year_dir};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads per-station daily summary CSVs.
pub struct SummaryReader;

impl SummaryReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_file(&self, path: &Path) -> Result<Vec<DailySummary>> {
        let station_id = station_id_from_summary_file(path).unwrap_or_default();
        let file = File::open(path)?;
        self.read_from(&station_id, file)
    }

    pub fn read_from<R: Read>(&self, station_id: &str, reader: R) -> Result<Vec<DailySummary>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        csv_reader
            .deserialize::<SummaryRow>()
            .map(|row| Ok(DailySummary::from_row(station_id, row?)))
            .collect()
    }

    /// Summary files for one year, sorted by path.
    pub fn year_files(&self, root: &Path, year: i32) -> Result<Vec<PathBuf>> {
        let dir = summary_year_dir(root, year);
        if !dir.is_dir() {
            warn!("No summary directory for {} at {}", year, dir.display());
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Every station's summaries for one year.
    pub fn read_year(&self, root: &Path, year: i32) -> Result<Vec<DailySummary>> {
        let mut summaries = Vec::new();
        for path in self.year_files(root, year)? {
            summaries.extend(self.read_file(&path)?);
        }
        debug!("Loaded {} station-days for {}", summaries.len(), year);
        Ok(summaries)
    }
}

impl Default for SummaryReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_read_summary_with_blanks() -> Result<()> {
        let csv = "\
DATE,Max DBTemperature,Min DBTemperature,Avg DBTemperature,Avg RelHumidity,Avg SLPressure,Avg WindXDirection,Avg WindYDirection,Avg WindSpeed
2021-01-01,40.0,20.0,30.0,55.5,30.01,,,
2021-01-02,41.0,21.0,31.0,,30.02,-1.0,0.0,10.0
";
        let summaries = SummaryReader::new().read_from("S1", csv.as_bytes())?;

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].station_id, "S1");
        assert_eq!(summaries[0].date, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(summaries[0].wind_x, None);
        assert_eq!(summaries[0].humidity, Some(55.5));
        assert_eq!(summaries[1].humidity, None);
        assert_eq!(summaries[1].wind_speed, Some(10.0));
        Ok(())
    }
}
