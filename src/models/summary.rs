use crate::models::Metric;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One station's reduced readings for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub station_id: String,
    pub date: NaiveDate,
    pub max_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_x: Option<f64>,
    pub wind_y: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl DailySummary {
    pub fn empty(station_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            station_id: station_id.into(),
            date,
            max_temperature: None,
            min_temperature: None,
            avg_temperature: None,
            humidity: None,
            pressure: None,
            wind_x: None,
            wind_y: None,
            wind_speed: None,
        }
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        let value = match metric {
            Metric::MaxTemperature => self.max_temperature,
            Metric::MinTemperature => self.min_temperature,
            Metric::AvgTemperature => self.avg_temperature,
            Metric::Humidity => self.humidity,
            Metric::Pressure => self.pressure,
            Metric::WindX => self.wind_x,
            Metric::WindY => self.wind_y,
            Metric::WindSpeed => self.wind_speed,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn to_row(&self) -> SummaryRow {
        SummaryRow {
            date: self.date,
            max_temperature: self.max_temperature,
            min_temperature: self.min_temperature,
            avg_temperature: self.avg_temperature,
            humidity: self.humidity,
            pressure: self.pressure,
            wind_x: self.wind_x,
            wind_y: self.wind_y,
            wind_speed: self.wind_speed,
        }
    }

    pub fn from_row(station_id: impl Into<String>, row: SummaryRow) -> Self {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            station_id: station_id.into(),
            date: row.date,
            max_temperature: finite(row.max_temperature),
            min_temperature: finite(row.min_temperature),
            avg_temperature: finite(row.avg_temperature),
            humidity: finite(row.humidity),
            pressure: finite(row.pressure),
            wind_x: finite(row.wind_x),
            wind_y: finite(row.wind_y),
            wind_speed: finite(row.wind_speed),
        }
    }
}

/// CSV layout of a daily summary file; the station id lives in the file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(rename = "DATE")]
    pub date: NaiveDate,
    #[serde(rename = "Max DBTemperature")]
    pub max_temperature: Option<f64>,
    #[serde(rename = "Min DBTemperature")]
    pub min_temperature: Option<f64>,
    #[serde(rename = "Avg DBTemperature")]
    pub avg_temperature: Option<f64>,
    #[serde(rename = "Avg RelHumidity")]
    pub humidity: Option<f64>,
    #[serde(rename = "Avg SLPressure")]
    pub pressure: Option<f64>,
    #[serde(rename = "Avg WindXDirection")]
    pub wind_x: Option<f64>,
    #[serde(rename = "Avg WindYDirection")]
    pub wind_y: Option<f64>,
    #[serde(rename = "Avg WindSpeed")]
    pub wind_speed: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_lookup_filters_non_finite() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let mut summary = DailySummary::empty("A", date);
        summary.max_temperature = Some(88.0);
        summary.humidity = Some(f64::NAN);

        assert_eq!(summary.value(Metric::MaxTemperature), Some(88.0));
        assert_eq!(summary.value(Metric::Humidity), None);
        assert_eq!(summary.value(Metric::WindX), None);
    }

    #[test]
    fn test_row_conversion_keeps_fields() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let mut summary = DailySummary::empty("A", date);
        summary.wind_x = Some(-1.0);
        summary.wind_y = Some(0.0);
        summary.wind_speed = Some(10.0);

        let back = DailySummary::from_row("A", summary.to_row());
        assert_eq!(back, summary);
    }
}
