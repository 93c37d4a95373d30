//! Boundary to the next-day forecasting model.

pub mod service;

use crate::error::{ProcessingError, Result};
use crate::models::Metric;
use crate::utils::constants::{NORMALIZATION_MAX, NORMALIZATION_MIN};
use ndarray::{s, Array3, ArrayView3};

pub use service::{reassemble_weights, ForecastService, ModelLoader};

/// A pure function from condensed history to one predicted day.
///
/// `input` is `height x width x (days * channels)`, scaled to the model's
/// range and without missing values. Day `d`, channel `c` lives at
/// `d * channels + c`. The output is `height x width x channels`.
pub trait ForecastModel: Send + Sync {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array3<f64>>;
}

/// Baseline that predicts tomorrow to be the most recent day.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceModel {
    channels: usize,
}

impl PersistenceModel {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl ForecastModel for PersistenceModel {
    fn predict(&self, input: ArrayView3<f64>) -> Result<Array3<f64>> {
        let total = input.dim().2;
        if self.channels == 0 || total < self.channels || total % self.channels != 0 {
            return Err(ProcessingError::InvalidFormat(format!(
                "{} input channels is not a whole number of {}-channel days",
                total, self.channels
            )));
        }
        Ok(input.slice(s![.., .., total - self.channels..]).to_owned())
    }
}

/// Per-metric linear scaling into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    min: [f64; 8],
    max: [f64; 8],
}

impl Normalization {
    pub fn new(min: [f64; 8], max: [f64; 8]) -> Self {
        Self { min, max }
    }

    pub fn normalize(&self, metric: Metric, value: f64) -> f64 {
        let c = metric.channel();
        (value - self.min[c]) / (self.max[c] - self.min[c])
    }

    pub fn denormalize(&self, metric: Metric, value: f64) -> f64 {
        let c = metric.channel();
        value * (self.max[c] - self.min[c]) + self.min[c]
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self::new(NORMALIZATION_MIN, NORMALIZATION_MAX)
    }
}
