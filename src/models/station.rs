use crate::grid::GeoBounds;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One row of the station metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StationMetadata {
    #[serde(rename = "STATION")]
    #[validate(length(min = 1))]
    pub station_id: String,

    #[serde(rename = "LATITUDE")]
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[serde(rename = "LONGITUDE")]
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[serde(rename = "ELEVATION", default)]
    pub elevation: Option<f64>,

    #[serde(rename = "NAME", default)]
    pub name: String,
}

impl StationMetadata {
    pub fn new(
        station_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        elevation: Option<f64>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            latitude,
            longitude,
            elevation,
            name: name.into(),
        }
    }

    /// Whether the station lies inside the bounds widened by their margin.
    pub fn is_within(&self, bounds: &GeoBounds) -> bool {
        bounds.contains_with_margin(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_validation() {
        let station = StationMetadata::new("72565003017", 39.8466, -104.6562, Some(1647.4), "DENVER INTL AP");

        assert!(station.validate().is_ok());
        assert!(station.is_within(&GeoBounds::default()));
    }

    #[test]
    fn test_invalid_coordinates() {
        let station = StationMetadata::new("1", 91.0, -104.0, None, "Invalid Station");
        assert!(station.validate().is_err());

        let station = StationMetadata::new("", 40.0, -104.0, None, "No id");
        assert!(station.validate().is_err());
    }

    #[test]
    fn test_outside_bounds() {
        // Honolulu
        let station = StationMetadata::new("91182022521", 21.3241, -157.9294, Some(2.1), "HONOLULU");
        assert!(!station.is_within(&GeoBounds::default()));
    }
}
