use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wxgrid")]
#[command(about = "Compile weather-station readings into masked daily raster images")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Settings file (TOML)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Worker threads [default: from settings]")]
    pub max_workers: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate hourly station CSV files into daily summaries
    Aggregate {
        #[arg(short, long, help = "Directory of hourly CSV files, one per station")]
        input_dir: PathBuf,

        #[arg(short, long, help = "Summary root [default: from settings]")]
        output_root: Option<PathBuf>,
    },

    /// Compile daily images from the summary archive
    Compile {
        #[arg(short, long, help = "First date (YYYY-MM-DD)")]
        start: NaiveDate,

        #[arg(short, long, help = "Last date, inclusive [default: start]")]
        end: Option<NaiveDate>,

        #[arg(
            short,
            long,
            value_delimiter = ',',
            help = "Metric names or channel indices [default: all]"
        )]
        metrics: Vec<String>,

        #[arg(long, help = "Interpolation strategy: nearest or idw [default: from settings]")]
        strategy: Option<String>,

        #[arg(long, default_value = "false", help = "Recompile even if cached")]
        force: bool,
    },

    /// Build one day's image from the historical weather API
    Snapshot {
        #[arg(short, long, help = "Date (YYYY-MM-DD)")]
        date: NaiveDate,

        #[arg(short, long, help = "Output Parquet file [default: image cache]")]
        output_file: Option<PathBuf>,

        #[arg(long, help = "API key [default: $WXGRID_HISTORY_API_KEY]")]
        api_key: Option<String>,
    },

    /// Forecast days after the archive with the persistence baseline
    Forecast {
        #[arg(short, long, help = "First forecast date (YYYY-MM-DD)")]
        start: NaiveDate,

        #[arg(short, long, default_value = "1")]
        days: usize,
    },

    /// Split a large artifact into numbered chunks
    Split {
        #[arg(short, long)]
        input_file: PathBuf,

        #[arg(short, long)]
        output_dir: PathBuf,

        #[arg(long, help = "Chunk size in bytes [default: from settings]")]
        chunk_size: Option<usize>,
    },

    /// Reassemble an artifact from its chunks
    Combine {
        #[arg(short, long)]
        input_dir: PathBuf,

        #[arg(short, long)]
        output_file: PathBuf,
    },

    /// Display statistics for a compiled image
    Info {
        #[arg(short, long)]
        file: PathBuf,
    },
}
