/// Default raster extent (contiguous United States)
pub const DEFAULT_WEST_LON: f64 = -125.0;
pub const DEFAULT_EAST_LON: f64 = -67.0;
pub const DEFAULT_SOUTH_LAT: f64 = 25.0;
pub const DEFAULT_NORTH_LAT: f64 = 49.0;
pub const DEFAULT_PIXELS_PER_DEGREE: u32 = 2;
pub const DEFAULT_MARGIN_DEGREES: f64 = 1.0;

/// Smoothing
pub const DEFAULT_SMOOTHING_SIGMA: f64 = 0.6;

/// File and directory names
pub const STATIONS_FILE: &str = "stations.csv";
pub const MASK_FILE: &str = "mask.csv";
pub const DAILY_SUMMARY_DIR: &str = "daily_station_data";
pub const IMAGE_CACHE_DIR: &str = "images";
pub const HISTORY_CACHE_DIR: &str = "history";
pub const SUMMARY_FILE_PREFIX: &str = "_";
pub const IMAGE_FILE_SUFFIX: &str = "_img.parquet";
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Hourly observation columns
pub const COL_DATE: &str = "DATE";
pub const COL_DRY_BULB: &str = "HourlyDryBulbTemperature";
pub const COL_REL_HUMIDITY: &str = "HourlyRelativeHumidity";
pub const COL_SEA_LEVEL_PRESSURE: &str = "HourlySeaLevelPressure";
pub const COL_WIND_DIRECTION: &str = "HourlyWindDirection";
pub const COL_WIND_SPEED: &str = "HourlyWindSpeed";

/// Artifact chunking
pub const DEFAULT_ARTIFACT_CHUNK_SIZE: usize = 50_000_000;
pub const DEFAULT_ARTIFACT_PREFIX: &str = "model";
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "h5";

/// Forecasting
pub const FORECAST_HISTORY_DAYS: usize = 3;
/// Per-channel bounds used to scale model input into [0, 1].
pub const NORMALIZATION_MIN: [f64; 8] = [
    -92.1032913,
    -92.1032913,
    -92.1032913,
    0.000692325368,
    26.5815451,
    -1.0,
    -1.0,
    0.0,
];
pub const NORMALIZATION_MAX: [f64; 8] = [
    132.52376785,
    132.52376785,
    132.52376785,
    100.0,
    31.89179402,
    1.0,
    1.0,
    108.47664471,
];

/// Remote history API
pub const DEFAULT_HISTORY_URL: &str = "http://api.weatherapi.com/v1/history.json";
pub const HISTORY_API_KEY_ENV: &str = "WXGRID_HISTORY_API_KEY";

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
