pub mod bounds;
pub mod interpolator;
pub mod mapper;
pub mod mask;
pub mod smoother;

pub use bounds::GeoBounds;
pub use interpolator::{merge_collisions, GridSample, InterpolationStrategy, ScatteredFieldInterpolator};
pub use mapper::{CoordinateGridMapper, GridIndex, RawIndex};
pub use mask::LandMask;
pub use smoother::NanConservingSmoother;

/// A single raster channel; `None` marks cells without a value.
pub type Field = ndarray::Array2<Option<f64>>;
