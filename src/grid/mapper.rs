use crate::error::{ProcessingError, Result};
use crate::grid::GeoBounds;
use serde::{Deserialize, Serialize};

/// Address of a cell inside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridIndex {
    pub row: usize,
    pub col: usize,
}

impl GridIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Unchecked result of the mapping formula. May be negative or past the far edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawIndex {
    pub row: i64,
    pub col: i64,
}

impl RawIndex {
    /// Convert to a `GridIndex` if the cell lies inside a `height x width` grid.
    pub fn in_grid(&self, height: usize, width: usize) -> Option<GridIndex> {
        if self.row < 0 || self.col < 0 {
            return None;
        }

        let (row, col) = (self.row as usize, self.col as usize);
        (row < height && col < width).then_some(GridIndex { row, col })
    }
}

/// Maps geographic coordinates to grid cells and back.
///
/// Cells are sub-degree buckets, so `to_coord` is only an approximate inverse
/// of `to_index`: it returns the south-west corner of the cell.
#[derive(Debug, Clone)]
pub struct CoordinateGridMapper {
    bounds: GeoBounds,
    strict: bool,
}

impl CoordinateGridMapper {
    pub fn new(bounds: GeoBounds) -> Self {
        Self {
            bounds,
            strict: false,
        }
    }

    /// In strict mode `to_index` fails with `OutOfBounds` instead of returning
    /// an index outside the grid.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn bounds(&self) -> &GeoBounds {
        &self.bounds
    }

    pub fn to_index(&self, latitude: f64, longitude: f64) -> Result<RawIndex> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(ProcessingError::InvalidCoordinate(format!(
                "({}, {})",
                latitude, longitude
            )));
        }
        let b = &self.bounds;
        let ppd = b.pixels_per_degree as f64;

        let lat_normalized = (latitude - b.south) / b.lat_span();
        let lon_normalized = (longitude - b.west) / b.lon_span();

        let raw = RawIndex {
            row: (lat_normalized * b.lat_span() * ppd).floor() as i64,
            col: (lon_normalized * b.lon_span() * ppd).floor() as i64,
        };

        if self.strict && raw.in_grid(b.height(), b.width()).is_none() {
            return Err(ProcessingError::OutOfBounds {
                lat: latitude,
                lon: longitude,
                row: raw.row,
                col: raw.col,
                height: b.height(),
                width: b.width(),
            });
        }

        Ok(raw)
    }

    /// Map straight to a cell, `None` when the coordinate falls outside the grid.
    pub fn cell(&self, latitude: f64, longitude: f64) -> Option<GridIndex> {
        let raw = self.to_index(latitude, longitude).ok()?;
        raw.in_grid(self.bounds.height(), self.bounds.width())
    }

    pub fn to_coord(&self, row: usize, col: usize) -> (f64, f64) {
        let ppd = self.bounds.pixels_per_degree as f64;
        (
            self.bounds.south + row as f64 / ppd,
            self.bounds.west + col as f64 / ppd,
        )
    }
}
