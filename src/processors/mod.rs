pub mod daily_aggregator;
pub mod image_compiler;
pub mod parallel_processor;
pub mod wind;

pub use daily_aggregator::StationDailyAggregator;
pub use image_compiler::{DailyImageCompiler, ImageOrigin};
pub use parallel_processor::{AggregateReport, CompileReport, ParallelProcessor};
pub use wind::{CircularWindAverager, WindAverage};
