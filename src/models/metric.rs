use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The daily metrics, in raster channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    MaxTemperature,
    MinTemperature,
    AvgTemperature,
    Humidity,
    Pressure,
    WindX,
    WindY,
    WindSpeed,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::MaxTemperature,
        Metric::MinTemperature,
        Metric::AvgTemperature,
        Metric::Humidity,
        Metric::Pressure,
        Metric::WindX,
        Metric::WindY,
        Metric::WindSpeed,
    ];

    /// Position of the metric in the default channel order.
    pub fn channel(&self) -> usize {
        *self as usize
    }

    pub fn from_channel(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Column header used in daily summary CSV files.
    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::MaxTemperature => "Max DBTemperature",
            Metric::MinTemperature => "Min DBTemperature",
            Metric::AvgTemperature => "Avg DBTemperature",
            Metric::Humidity => "Avg RelHumidity",
            Metric::Pressure => "Avg SLPressure",
            Metric::WindX => "Avg WindXDirection",
            Metric::WindY => "Avg WindYDirection",
            Metric::WindSpeed => "Avg WindSpeed",
        }
    }

    /// Short name used for Parquet columns and the CLI.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::MaxTemperature => "max_temp",
            Metric::MinTemperature => "min_temp",
            Metric::AvgTemperature => "avg_temp",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
            Metric::WindX => "wind_x",
            Metric::WindY => "wind_y",
            Metric::WindSpeed => "wind_speed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.key().eq_ignore_ascii_case(trimmed) || m.column_name() == trimmed)
    }

    pub fn units(&self) -> &'static str {
        match self {
            Metric::MaxTemperature | Metric::MinTemperature | Metric::AvgTemperature => "°F",
            Metric::Humidity => "%",
            Metric::Pressure => "inHg",
            Metric::WindX | Metric::WindY => "unit",
            Metric::WindSpeed => "mph",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A metric named either by its column/key name or by channel index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricRef {
    ByName(String),
    ByIndex(usize),
}

impl MetricRef {
    pub fn resolve(&self) -> Result<Metric> {
        match self {
            MetricRef::ByName(name) => Metric::from_name(name)
                .ok_or_else(|| ProcessingError::UnknownMetric(name.clone())),
            MetricRef::ByIndex(index) => Metric::from_channel(*index)
                .ok_or_else(|| ProcessingError::UnknownMetric(format!("channel {}", index))),
        }
    }

    pub fn resolve_all(refs: &[MetricRef]) -> Result<Vec<Metric>> {
        refs.iter().map(MetricRef::resolve).collect()
    }
}

impl From<&str> for MetricRef {
    fn from(s: &str) -> Self {
        match s.trim().parse::<usize>() {
            Ok(index) => MetricRef::ByIndex(index),
            Err(_) => MetricRef::ByName(s.to_string()),
        }
    }
}

impl From<usize> for MetricRef {
    fn from(index: usize) -> Self {
        MetricRef::ByIndex(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_order() {
        assert_eq!(Metric::MaxTemperature.channel(), 0);
        assert_eq!(Metric::WindSpeed.channel(), 7);
        for (i, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(metric.channel(), i);
            assert_eq!(Metric::from_channel(i), Some(*metric));
        }
        assert_eq!(Metric::from_channel(8), None);
    }

    #[test]
    fn test_resolve_by_name() {
        assert_eq!(
            MetricRef::ByName("Avg RelHumidity".to_string()).resolve().unwrap(),
            Metric::Humidity
        );
        assert_eq!(
            MetricRef::ByName("WIND_X".to_string()).resolve().unwrap(),
            Metric::WindX
        );
        assert!(MetricRef::ByName("precipitation".to_string()).resolve().is_err());
    }

    #[test]
    fn test_resolve_by_index() {
        assert_eq!(MetricRef::from(4).resolve().unwrap(), Metric::Pressure);
        assert!(MetricRef::ByIndex(12).resolve().is_err());
    }

    #[test]
    fn test_cli_strings_resolve_once() {
        let refs: Vec<MetricRef> = ["0", "avg_temp", "7"].into_iter().map(MetricRef::from).collect();
        let metrics = MetricRef::resolve_all(&refs).unwrap();
        assert_eq!(
            metrics,
            vec![Metric::MaxTemperature, Metric::AvgTemperature, Metric::WindSpeed]
        );
    }
}
