pub mod observation_reader;
pub mod station_reader;
pub mod summary_reader;

pub use observation_reader::{parse_timestamp, ObservationReader};
pub use station_reader::StationReader;
pub use summary_reader::SummaryReader;
