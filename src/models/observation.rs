use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A (bearing, speed) wind reading with a usable bearing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    /// Compass bearing in degrees: 0 = north, clockwise.
    pub bearing: f64,
    pub speed: f64,
}

impl WindSample {
    pub fn new(bearing: f64, speed: f64) -> Self {
        Self { bearing, speed }
    }

    pub fn is_valid(&self) -> bool {
        self.bearing.is_finite() && self.speed.is_finite()
    }
}

/// One sub-daily reading from a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationObservation {
    pub station_id: String,
    pub timestamp: NaiveDateTime,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_bearing: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl StationObservation {
    pub fn new(station_id: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp,
            temperature: None,
            humidity: None,
            pressure: None,
            wind_bearing: None,
            wind_speed: None,
        }
    }

    pub fn with_temperature(mut self, value: f64) -> Self {
        self.temperature = finite(value);
        self
    }

    pub fn with_humidity(mut self, value: f64) -> Self {
        self.humidity = finite(value);
        self
    }

    pub fn with_pressure(mut self, value: f64) -> Self {
        self.pressure = finite(value);
        self
    }

    pub fn with_wind(mut self, bearing: f64, speed: f64) -> Self {
        self.wind_bearing = finite(bearing);
        self.wind_speed = finite(speed);
        self
    }

    /// The wind reading, if both bearing and speed are present.
    pub fn wind(&self) -> Option<WindSample> {
        match (self.wind_bearing, self.wind_speed) {
            (Some(bearing), Some(speed)) => Some(WindSample::new(bearing, speed)),
            _ => None,
        }
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Parse a numeric field, treating blanks and unparseable text as missing.
///
/// LCD exports suffix some readings with quality letters (`"71s"`); the
/// trailing letters are stripped before parsing.
pub fn parse_reading(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '*');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a wind bearing field.
///
/// `"VRB"`/`"variable"` and the calm placeholder `"000"` mean "no bearing".
/// A plain `"0"` or `"360"` is a genuine northerly bearing.
pub fn parse_bearing(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("vrb")
        || trimmed.eq_ignore_ascii_case("variable")
        || trimmed == "000"
    {
        return None;
    }
    parse_reading(trimmed)
}
