use crate::error::{ProcessingError, Result};
use crate::models::{StationMetadata, StationObservation};
use crate::processors::StationDailyAggregator;
use crate::readers::parse_timestamp;
use crate::sources::StationSample;
use crate::utils::constants::DEFAULT_HISTORY_URL;
use crate::utils::paths::atomic_write;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    forecast: ForecastBlock,
}

#[derive(Debug, Deserialize)]
struct ForecastBlock {
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    hour: Vec<HourEntry>,
}

#[derive(Debug, Deserialize)]
struct HourEntry {
    time: String,
    temp_f: Option<f64>,
    humidity: Option<f64>,
    pressure_in: Option<f64>,
    wind_degree: Option<f64>,
    wind_mph: Option<f64>,
}

/// Client for an hourly weather history API with a verbatim on-disk cache.
///
/// Each (location, date) response is stored exactly as received; a cached
/// entry is always served instead of a network request.
pub struct HistoryClient {
    client: Client,
    base_url: String,
    api_key: String,
    cache_dir: PathBuf,
}

impl HistoryClient {
    pub fn new(api_key: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_HISTORY_URL.to_string(),
            api_key: api_key.into(),
            cache_dir: cache_dir.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `<date>_<lat>_<lon>.txt` with coordinates at four decimals.
    pub fn cache_path(&self, latitude: f64, longitude: f64, date: NaiveDate) -> PathBuf {
        self.cache_dir.join(format!(
            "{}_{:.4}_{:.4}.txt",
            date.format("%Y-%m-%d"),
            latitude,
            longitude
        ))
    }

    /// Raw response bytes for one location and date.
    #[instrument(skip(self))]
    pub async fn fetch_raw(&self, latitude: f64, longitude: f64, date: NaiveDate) -> Result<Vec<u8>> {
        let path = self.cache_path(latitude, longitude, date);
        if path.is_file() {
            debug!("History cache hit {}", path.display());
            return Ok(tokio::fs::read(&path).await?);
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.clone()),
                ("q", format!("{},{}", latitude, longitude)),
                ("dt", date.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?.to_vec();

        atomic_write(&path, &bytes)?;
        Ok(bytes)
    }

    pub async fn observations(
        &self,
        station: &StationMetadata,
        date: NaiveDate,
    ) -> Result<Vec<StationObservation>> {
        let raw = self
            .fetch_raw(station.latitude, station.longitude, date)
            .await?;
        parse_history(&station.station_id, &raw)
    }
}

/// Hourly entries of the first day in a history response.
pub fn parse_history(station_id: &str, raw: &[u8]) -> Result<Vec<StationObservation>> {
    let response: HistoryResponse = serde_json::from_slice(raw)?;
    let day = response.forecast.forecastday.into_iter().next().ok_or_else(|| {
        ProcessingError::MissingData(format!("History response for {} has no days", station_id))
    })?;

    Ok(day
        .hour
        .into_iter()
        .filter_map(|h| {
            let timestamp = parse_timestamp(&h.time)?;
            let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
            Some(StationObservation {
                station_id: station_id.to_string(),
                timestamp,
                temperature: finite(h.temp_f),
                humidity: finite(h.humidity),
                pressure: finite(h.pressure_in),
                wind_bearing: finite(h.wind_degree),
                wind_speed: finite(h.wind_mph),
            })
        })
        .collect())
}

/// Builds same-day samples for a fixed station list from the history API.
pub struct HistorySnapshot {
    client: HistoryClient,
    stations: Vec<StationMetadata>,
    aggregator: StationDailyAggregator,
}

impl HistorySnapshot {
    pub fn new(client: HistoryClient, stations: Vec<StationMetadata>) -> Self {
        Self {
            client,
            stations,
            aggregator: StationDailyAggregator::new(),
        }
    }

    /// One aggregated sample per station. Any request failure aborts the snapshot.
    pub async fn collect(&self, date: NaiveDate) -> Result<Vec<StationSample>> {
        info!("Collecting {} stations for {}", self.stations.len(), date);

        let mut samples = Vec::with_capacity(self.stations.len());
        for station in &self.stations {
            let observations = self.client.observations(station, date).await?;
            let summary = self
                .aggregator
                .aggregate(&station.station_id, date, &observations);
            samples.push(StationSample {
                station: station.clone(),
                summary,
            });
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RESPONSE: &str = r#"{
        "location": {"name": "Denver"},
        "forecast": {"forecastday": [{
            "date": "2022-04-26",
            "hour": [
                {"time": "2022-04-26 00:00", "temp_f": 50.0, "humidity": 40, "pressure_in": 30.1, "wind_degree": 90, "wind_mph": 10.0},
                {"time": "2022-04-26 01:00", "temp_f": 60.0, "humidity": 50, "pressure_in": 30.0, "wind_degree": 90, "wind_mph": 10.0},
                {"time": "2022-04-26 02:00", "temp_f": 70.0, "humidity": 60, "pressure_in": 29.9, "wind_degree": 90, "wind_mph": 10.0}
            ]
        }]}
    }"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 4, 26).unwrap()
    }

    #[test]
    fn test_parse_history_response() -> Result<()> {
        let obs = parse_history("D", RESPONSE.as_bytes())?;

        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].temperature, Some(50.0));
        assert_eq!(obs[2].humidity, Some(60.0));
        assert_eq!(obs[1].wind_bearing, Some(90.0));

        let summary = StationDailyAggregator::new().aggregate("D", date(), &obs);
        assert_eq!(summary.max_temperature, Some(70.0));
        assert_eq!(summary.humidity, Some(50.0));
        Ok(())
    }

    #[test]
    fn test_empty_days_is_missing_data() {
        let raw = br#"{"forecast": {"forecastday": []}}"#;
        assert!(matches!(
            parse_history("D", raw),
            Err(ProcessingError::MissingData(_))
        ));
    }

    #[test]
    fn test_cache_path_rounds_coordinates() -> Result<()> {
        let client = HistoryClient::new("key", "cache")?;
        assert_eq!(
            client.cache_path(39.846612, -104.65623, date()),
            PathBuf::from("cache/2022-04-26_39.8466_-104.6562.txt")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_cached_response_skips_network() -> Result<()> {
        let dir = TempDir::new()?;
        // Unroutable base URL: any network attempt would fail
        let client = HistoryClient::new("key", dir.path())?.with_base_url("http://127.0.0.1:9/none");
        let station = StationMetadata::new("D", 39.8466, -104.6562, None, "Denver");
        std::fs::write(client.cache_path(39.8466, -104.6562, date()), RESPONSE)?;

        let raw = client.fetch_raw(39.8466, -104.6562, date()).await?;
        assert_eq!(raw, RESPONSE.as_bytes());

        let snapshot = HistorySnapshot::new(client, vec![station]);
        let samples = snapshot.collect(date()).await?;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].summary.min_temperature, Some(50.0));
        Ok(())
    }
}
