pub mod constants;
pub mod paths;
pub mod progress;

pub use constants::*;
pub use paths::{atomic_write, image_file_name, summary_file, summary_year_dir};
pub use progress::ProgressReporter;
