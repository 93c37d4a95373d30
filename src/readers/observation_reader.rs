use crate::error::{ProcessingError, Result};
use crate::models::{parse_bearing, parse_reading, StationObservation};
use crate::utils::constants::{
    COL_DATE, COL_DRY_BULB, COL_REL_HUMIDITY, COL_SEA_LEVEL_PRESSURE, COL_WIND_DIRECTION,
    COL_WIND_SPEED,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Reads hourly Local Climatological Data exports.
pub struct ObservationReader;

struct ColumnIndex {
    date: usize,
    temperature: Option<usize>,
    humidity: Option<usize>,
    pressure: Option<usize>,
    wind_direction: Option<usize>,
    wind_speed: Option<usize>,
}

impl ObservationReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_file(&self, station_id: &str, path: &Path) -> Result<Vec<StationObservation>> {
        let file = File::open(path)?;
        self.read_from(station_id, file)
    }

    pub fn read_from<R: Read>(&self, station_id: &str, reader: R) -> Result<Vec<StationObservation>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h == name);
        let columns = ColumnIndex {
            date: position(COL_DATE).ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("Missing '{}' column", COL_DATE))
            })?,
            temperature: position(COL_DRY_BULB),
            humidity: position(COL_REL_HUMIDITY),
            pressure: position(COL_SEA_LEVEL_PRESSURE),
            wind_direction: position(COL_WIND_DIRECTION),
            wind_speed: position(COL_WIND_SPEED),
        };

        let mut observations = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let field = |index: Option<usize>| index.and_then(|i| record.get(i)).unwrap_or("");

            let raw_date = record.get(columns.date).unwrap_or("");
            let Some(timestamp) = parse_timestamp(raw_date) else {
                warn!("Skipping {} row with unreadable DATE '{}'", station_id, raw_date);
                continue;
            };

            observations.push(StationObservation {
                station_id: station_id.to_string(),
                timestamp,
                temperature: parse_reading(field(columns.temperature)),
                humidity: parse_reading(field(columns.humidity)),
                pressure: parse_reading(field(columns.pressure)),
                wind_bearing: parse_bearing(field(columns.wind_direction)),
                wind_speed: parse_reading(field(columns.wind_speed)),
            });
        }

        debug!("Read {} observations for {}", observations.len(), station_id);
        Ok(observations)
    }
}

impl Default for ObservationReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Full timestamps in the usual layouts, falling back to a bare date at midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
