use crate::error::{ProcessingError, Result};
use crate::grid::Field;
use crate::models::Metric;
use chrono::NaiveDate;
use ndarray::{Array3, ArrayView2, Axis};

/// A `height x width x channels` raster for one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyImage {
    pub date: NaiveDate,
    pub metrics: Vec<Metric>,
    pub data: Array3<Option<f64>>,
}

impl DailyImage {
    pub fn new(date: NaiveDate, metrics: Vec<Metric>, data: Array3<Option<f64>>) -> Result<Self> {
        if data.dim().2 != metrics.len() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Image has {} channels but {} metrics",
                data.dim().2,
                metrics.len()
            )));
        }
        Ok(Self {
            date,
            metrics,
            data,
        })
    }

    /// Stack per-metric fields as channels, in the given order.
    pub fn from_channels(date: NaiveDate, metrics: Vec<Metric>, channels: &[Field]) -> Result<Self> {
        if channels.is_empty() {
            return Err(ProcessingError::InvalidFormat(
                "An image needs at least one channel".to_string(),
            ));
        }
        let views: Vec<ArrayView2<Option<f64>>> = channels.iter().map(|c| c.view()).collect();
        let data = ndarray::stack(Axis(2), &views)?;
        Self::new(date, metrics, data)
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    pub fn channel(&self, index: usize) -> ArrayView2<'_, Option<f64>> {
        self.data.index_axis(Axis(2), index)
    }

    pub fn channel_for(&self, metric: Metric) -> Option<ArrayView2<'_, Option<f64>>> {
        self.metrics
            .iter()
            .position(|m| *m == metric)
            .map(|i| self.channel(i))
    }

    /// Dense copy with missing cells replaced by `fill`.
    pub fn filled(&self, fill: f64) -> Array3<f64> {
        self.data.mapv(|v| v.unwrap_or(fill))
    }

    pub fn missing_cells(&self) -> usize {
        self.data.iter().filter(|v| v.is_none()).count()
    }
}
