use crate::error::Result;
use crate::grid::GeoBounds;
use crate::models::StationMetadata;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};
use validator::Validate;

/// Reads the station metadata CSV, keeping stations near the raster.
pub struct StationReader {
    bounds: Option<GeoBounds>,
}

impl StationReader {
    pub fn new() -> Self {
        Self { bounds: None }
    }

    /// Keep only stations inside `bounds` widened by its margin.
    pub fn with_bounds(bounds: GeoBounds) -> Self {
        Self {
            bounds: Some(bounds),
        }
    }

    /// Read station metadata from the stations CSV file
    pub fn read_stations(&self, path: &Path) -> Result<Vec<StationMetadata>> {
        let file = File::open(path)?;
        self.read_from(file)
    }

    pub fn read_from<R: Read>(&self, reader: R) -> Result<Vec<StationMetadata>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut stations = Vec::new();
        let mut skipped = 0usize;

        for (line, record) in csv_reader.deserialize::<StationMetadata>().enumerate() {
            let station = match record {
                Ok(station) => station,
                Err(e) => {
                    warn!("Skipping malformed station row {}: {}", line + 2, e);
                    skipped += 1;
                    continue;
                }
            };

            if station.validate().is_err() {
                warn!("Skipping station {} with invalid metadata", station.station_id);
                skipped += 1;
                continue;
            }

            if let Some(bounds) = &self.bounds {
                if !station.is_within(bounds) {
                    skipped += 1;
                    continue;
                }
            }

            stations.push(station);
        }

        debug!("Read {} stations ({} skipped)", stations.len(), skipped);
        Ok(stations)
    }

    /// Read station metadata keyed by station id
    pub fn read_stations_map(&self, path: &Path) -> Result<BTreeMap<String, StationMetadata>> {
        Ok(self
            .read_stations(path)?
            .into_iter()
            .map(|s| (s.station_id.clone(), s))
            .collect())
    }
}

impl Default for StationReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const STATIONS: &str = "\
STATION,LATITUDE,LONGITUDE,ELEVATION,NAME
72565003017,39.8466,-104.6562,1647.4,DENVER INTL AP
91182022521,21.3241,-157.9294,2.1,HONOLULU INTL AP
72295023174,33.9382,-118.3866,29.7,LOS ANGELES INTL AP
72658014922,44.8831,-93.2289,,MINNEAPOLIS
99999999999,not-a-number,-93.0,1,BROKEN
";

    #[test]
    fn test_read_stations_file() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "{}", STATIONS)?;

        let stations = StationReader::new().read_stations(temp_file.path())?;

        assert_eq!(stations.len(), 4);
        assert_eq!(stations[0].station_id, "72565003017");
        assert_eq!(stations[0].name, "DENVER INTL AP");
        assert_eq!(stations[3].elevation, None);
        Ok(())
    }

    #[test]
    fn test_bounds_filter_with_margin() -> Result<()> {
        let reader = StationReader::with_bounds(GeoBounds::default());
        let stations = reader.read_from(STATIONS.as_bytes())?;

        let ids: Vec<&str> = stations.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(ids, vec!["72565003017", "72295023174", "72658014922"]);
        Ok(())
    }

    #[test]
    fn test_margin_admits_nearby_station() -> Result<()> {
        // Half a degree north of the northern edge
        let csv = "STATION,LATITUDE,LONGITUDE,ELEVATION,NAME\nA,49.5,-100.0,,EDGE\n";

        let inside = StationReader::with_bounds(GeoBounds::default()).read_from(csv.as_bytes())?;
        assert_eq!(inside.len(), 1);

        let tight = GeoBounds::default().with_margin(0.0);
        let outside = StationReader::with_bounds(tight).read_from(csv.as_bytes())?;
        assert!(outside.is_empty());
        Ok(())
    }
}
