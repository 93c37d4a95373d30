use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    DEFAULT_EAST_LON, DEFAULT_MARGIN_DEGREES, DEFAULT_NORTH_LAT, DEFAULT_PIXELS_PER_DEGREE,
    DEFAULT_SOUTH_LAT, DEFAULT_WEST_LON,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Geographic rectangle and pixel resolution that define the raster grid.
///
/// Rows count latitude bands upwards from `south`, columns count longitude
/// bands eastwards from `west`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GeoBounds {
    #[validate(range(min = -180.0, max = 180.0))]
    pub west: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub east: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub south: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub north: f64,

    #[validate(range(min = 1))]
    pub pixels_per_degree: u32,

    /// Extra degrees around the rectangle used when selecting stations.
    #[validate(range(min = 0.0, max = 10.0))]
    pub margin: f64,
}

impl GeoBounds {
    pub fn new(west: f64, east: f64, south: f64, north: f64, pixels_per_degree: u32) -> Self {
        Self {
            west,
            east,
            south,
            north,
            pixels_per_degree,
            margin: 0.0,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Field-level validation plus the orderings the derive cannot express.
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if self.west >= self.east {
            return Err(ProcessingError::Config(format!(
                "West longitude {} must be less than east longitude {}",
                self.west, self.east
            )));
        }

        if self.south >= self.north {
            return Err(ProcessingError::Config(format!(
                "South latitude {} must be less than north latitude {}",
                self.south, self.north
            )));
        }

        Ok(())
    }

    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn width(&self) -> usize {
        (self.lon_span() * self.pixels_per_degree as f64).round() as usize
    }

    pub fn height(&self) -> usize {
        (self.lat_span() * self.pixels_per_degree as f64).round() as usize
    }

    /// `(height, width)`, the order ndarray expects.
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.south..self.north).contains(&latitude) && (self.west..self.east).contains(&longitude)
    }

    /// Inclusive containment test widened by the station-selection margin.
    pub fn contains_with_margin(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south - self.margin
            && latitude <= self.north + self.margin
            && longitude >= self.west - self.margin
            && longitude <= self.east + self.margin
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::new(
            DEFAULT_WEST_LON,
            DEFAULT_EAST_LON,
            DEFAULT_SOUTH_LAT,
            DEFAULT_NORTH_LAT,
            DEFAULT_PIXELS_PER_DEGREE,
        )
        .with_margin(DEFAULT_MARGIN_DEGREES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_dimensions() {
        let bounds = GeoBounds::default();
        assert_eq!(bounds.width(), 116);
        assert_eq!(bounds.height(), 48);
        assert_eq!(bounds.shape(), (48, 116));
        assert!(bounds.check().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let bounds = GeoBounds::new(-67.0, -125.0, 25.0, 49.0, 2);
        assert!(bounds.check().is_err());

        let bounds = GeoBounds::new(-125.0, -67.0, 49.0, 25.0, 2);
        assert!(bounds.check().is_err());
    }

    #[test]
    fn test_invalid_resolution_rejected() {
        let bounds = GeoBounds::new(-125.0, -67.0, 25.0, 49.0, 0);
        assert!(bounds.check().is_err());
    }

    #[test]
    fn test_contains_is_half_open() {
        let bounds = GeoBounds::default();
        assert!(bounds.contains(25.0, -125.0));
        assert!(!bounds.contains(49.0, -100.0));
        assert!(!bounds.contains(30.0, -67.0));
    }

    #[test]
    fn test_margin_widens_selection() {
        let bounds = GeoBounds::default();
        assert!(bounds.contains_with_margin(49.5, -100.0));
        assert!(bounds.contains_with_margin(24.0, -126.0));
        assert!(!bounds.contains_with_margin(50.5, -100.0));
    }
}
