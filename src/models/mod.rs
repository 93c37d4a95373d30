pub mod image;
pub mod metric;
pub mod observation;
pub mod station;
pub mod summary;

pub use image::DailyImage;
pub use metric::{Metric, MetricRef};
pub use observation::{parse_bearing, parse_reading, StationObservation, WindSample};
pub use station::StationMetadata;
pub use summary::{DailySummary, SummaryRow};
