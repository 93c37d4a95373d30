//! Where station-day samples for a date come from.

pub mod history_api;
pub mod year_cache;

use crate::error::Result;
use crate::models::{DailySummary, StationMetadata};
use chrono::NaiveDate;

pub use history_api::{HistoryClient, HistorySnapshot};
pub use year_cache::YearCache;

/// A station's summary for one date together with where the station is.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSample {
    pub station: StationMetadata,
    pub summary: DailySummary,
}

/// Supplies every station sample available for a date.
pub trait SampleSource: Send + Sync {
    fn samples_for(&self, date: NaiveDate) -> Result<Vec<StationSample>>;
}

/// Fixed in-memory samples, mainly for tests and one-off compiles.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    samples: Vec<StationSample>,
}

impl MemorySource {
    pub fn new(samples: Vec<StationSample>) -> Self {
        Self { samples }
    }

    pub fn push(&mut self, station: StationMetadata, summary: DailySummary) {
        self.samples.push(StationSample { station, summary });
    }
}

impl SampleSource for MemorySource {
    fn samples_for(&self, date: NaiveDate) -> Result<Vec<StationSample>> {
        Ok(self
            .samples
            .iter()
            .filter(|s| s.summary.date == date)
            .cloned()
            .collect())
    }
}
