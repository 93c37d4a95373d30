pub mod image_analyzer;

pub use image_analyzer::{ChannelStats, ImageAnalyzer, ImageStatistics};
