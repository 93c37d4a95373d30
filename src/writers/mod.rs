pub mod image_cache;
pub mod image_writer;
pub mod summary_writer;

pub use image_cache::ImageCache;
pub use image_writer::ImageWriter;
pub use summary_writer::SummaryWriter;
