use crate::models::{DailySummary, StationObservation, WindSample};
use crate::processors::CircularWindAverager;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Reduces sub-daily station readings to one summary per calendar day.
#[derive(Debug, Default, Clone, Copy)]
pub struct StationDailyAggregator;

impl StationDailyAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Summarise the observations of one station on one date.
    ///
    /// Observations whose timestamp falls on another date are ignored.
    pub fn aggregate(
        &self,
        station_id: &str,
        date: NaiveDate,
        observations: &[StationObservation],
    ) -> DailySummary {
        let todays: Vec<&StationObservation> = observations
            .iter()
            .filter(|o| o.timestamp.date() == date)
            .collect();

        let temperatures: Vec<f64> = todays.iter().filter_map(|o| o.temperature).collect();
        let humidity: Vec<f64> = todays.iter().filter_map(|o| o.humidity).collect();
        let pressure: Vec<f64> = todays.iter().filter_map(|o| o.pressure).collect();
        let winds: Vec<WindSample> = todays.iter().filter_map(|o| o.wind()).collect();

        let wind = CircularWindAverager::average(&winds);

        DailySummary {
            station_id: station_id.to_string(),
            date,
            max_temperature: temperatures.iter().copied().reduce(f64::max),
            min_temperature: temperatures.iter().copied().reduce(f64::min),
            avg_temperature: mean(&temperatures),
            humidity: mean(&humidity),
            pressure: mean(&pressure),
            wind_x: wind.and_then(|w| w.unit_x()),
            wind_y: wind.and_then(|w| w.unit_y()),
            wind_speed: wind.map(|w| w.magnitude),
        }
    }

    /// Summarise every date present in one station's observations, in date order.
    pub fn aggregate_station(&self, observations: &[StationObservation]) -> Vec<DailySummary> {
        let mut by_station_date: BTreeMap<(&str, NaiveDate), Vec<StationObservation>> =
            BTreeMap::new();
        for obs in observations {
            by_station_date
                .entry((obs.station_id.as_str(), obs.timestamp.date()))
                .or_default()
                .push(obs.clone());
        }

        debug!(
            "Aggregating {} observations into {} station-days",
            observations.len(),
            by_station_date.len()
        );

        by_station_date
            .into_iter()
            .map(|((station_id, date), day)| self.aggregate(station_id, date, &day))
            .collect()
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
