use crate::analyzers::ImageAnalyzer;
use crate::cli::args::{Cli, Commands};
use crate::forecast::{ForecastModel, ForecastService, ModelLoader, PersistenceModel};
use crate::grid::InterpolationStrategy;
use crate::models::{Metric, MetricRef};
use crate::processors::{DailyImageCompiler, ParallelProcessor};
use crate::settings::Settings;
use crate::sources::{HistoryClient, HistorySnapshot, MemorySource};
use crate::utils::constants::HISTORY_API_KEY_ENV;
use crate::utils::progress::ProgressReporter;
use crate::writers::ImageCache;
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_ref())?;

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(workers) = cli.max_workers {
        settings.processing.max_workers = workers;
    }

    match cli.command {
        Commands::Aggregate {
            input_dir,
            output_root,
        } => {
            let output_root = output_root.unwrap_or_else(|| settings.paths.summary_root());
            println!("Aggregating hourly files from {}", input_dir.display());
            println!("Summary root: {}", output_root.display());

            let progress = ProgressReporter::new_spinner("Aggregating stations...", false);
            let report = ParallelProcessor::new(settings.processing.max_workers)
                .aggregate_directory(&input_dir, &output_root, Some(&progress))
                .with_context(|| format!("Failed to aggregate {}", input_dir.display()))?;

            println!(
                "{} stations, {} station-days, {} files written",
                report.stations, report.station_days, report.files_written
            );
            if !report.failed.is_empty() {
                println!("{} files failed", report.failed.len());
            }
        }

        Commands::Compile {
            start,
            end,
            metrics,
            strategy,
            force,
        } => {
            let end = end.unwrap_or(start);
            let metrics = parse_metrics(&metrics)?;

            let mut compiler = settings.compiler().context("Failed to set up image compiler")?;
            if let Some(strategy) = strategy {
                compiler = compiler.with_strategy(strategy.parse::<InterpolationStrategy>()?);
            }

            if force {
                if let Some(cache) = compiler.cache() {
                    for date in start.iter_days().take_while(|d| *d <= end) {
                        cache.invalidate(date)?;
                    }
                }
            }

            let days = (end - start).num_days().max(0) as u64 + 1;
            let progress = ProgressReporter::new(days, "Compiling images...", false);
            let report = ParallelProcessor::new(settings.processing.max_workers).compile_range(
                &compiler,
                start,
                end,
                &metrics,
                Some(&progress),
            )?;

            println!("{}", report.summary());
            if let Some(cache) = compiler.cache() {
                println!("Images in {}", cache.dir().display());
            }
        }

        Commands::Snapshot {
            date,
            output_file,
            api_key,
        } => {
            let api_key = match api_key {
                Some(key) => key,
                None => std::env::var(HISTORY_API_KEY_ENV).with_context(|| {
                    format!("No API key given and {} is not set", HISTORY_API_KEY_ENV)
                })?,
            };

            let stations: Vec<_> = settings.read_stations()?.into_values().collect();
            println!("Requesting history for {} stations on {}", stations.len(), date);

            let client = HistoryClient::new(api_key, settings.paths.history_cache_dir())?;
            let samples = HistorySnapshot::new(client, stations)
                .collect(date)
                .await
                .context("History snapshot aborted")?;

            let compiler = DailyImageCompiler::new(
                settings.grid,
                Arc::new(settings.land_mask()?),
                Arc::new(MemorySource::new(samples)),
            )?
            .with_strategy(settings.compile.strategy()?)
            .with_smoothing(settings.compile.sigma())?;
            let image = compiler.compile(date, &Metric::ALL)?;

            let writer = settings.compile.image_writer()?;
            let path = match output_file {
                Some(path) => {
                    writer.write_image(&image, &path)?;
                    path
                }
                None => ImageCache::new(settings.paths.image_dir())
                    .with_writer(writer)
                    .put_keyed(&format!("snapshot_{}", date.format("%Y-%m-%d")), &image)?,
            };
            println!("Snapshot written to {}", path.display());
        }

        Commands::Forecast { start, days } => {
            let compiler = settings.compiler().context("Failed to set up image compiler")?;
            let loader: ModelLoader = Box::new(|| {
                Ok(Box::new(PersistenceModel::new(Metric::ALL.len())) as Box<dyn ForecastModel>)
            });

            let mut service = ForecastService::new(loader, Arc::new(settings.land_mask()?));
            if let Some(cache) = compiler.cache() {
                service = service.with_cache(ImageCache::new(cache.dir()));
            }

            let forecasts = service.forecast(&compiler, start, days, &Metric::ALL)?;
            let analyzer = ImageAnalyzer::new();
            for image in &forecasts {
                println!("{}", analyzer.analyze(image));
            }
        }

        Commands::Split {
            input_file,
            output_dir,
            chunk_size,
        } => {
            let mut store = settings.artifacts.store();
            if let Some(size) = chunk_size {
                store = store.with_chunk_size(size);
            }

            let chunks = store
                .split(&input_file, &output_dir)
                .with_context(|| format!("Failed to split {}", input_file.display()))?;
            println!(
                "Wrote {} chunks of up to {} bytes to {}",
                chunks.len(),
                store.chunk_size(),
                output_dir.display()
            );
        }

        Commands::Combine {
            input_dir,
            output_file,
        } => {
            let store = settings.artifacts.store();
            let size = store
                .combine_to_file(&input_dir, &output_file)
                .with_context(|| format!("Failed to reassemble from {}", input_dir.display()))?;
            println!("Reassembled {} ({} bytes)", output_file.display(), size);
        }

        Commands::Info { file } => {
            println!("Analyzing image file: {}", file.display());
            let stats = ImageAnalyzer::new().analyze_file(&file)?;
            println!("\n{}", stats);
        }
    }

    Ok(())
}

/// Metric arguments by name or channel index, every metric when empty.
fn parse_metrics(args: &[String]) -> Result<Vec<Metric>> {
    if args.is_empty() {
        return Ok(Metric::ALL.to_vec());
    }

    let refs: Vec<MetricRef> = args.iter().map(|a| MetricRef::from(a.as_str())).collect();
    let mut metrics = MetricRef::resolve_all(&refs)?;
    let before = metrics.len();
    metrics.dedup();
    if metrics.len() != before {
        warn!("Ignoring repeated metrics");
    }
    if metrics.is_empty() {
        bail!("No metrics selected");
    }
    Ok(metrics)
}

fn init_logging(verbose: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    info!("wxgrid {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metrics_mixes_names_and_indices() -> Result<()> {
        let metrics = parse_metrics(&["max_temp".to_string(), "6".to_string()])?;
        assert_eq!(metrics, vec![Metric::MaxTemperature, Metric::WindY]);

        assert_eq!(parse_metrics(&[])?.len(), Metric::ALL.len());
        assert!(parse_metrics(&["9".to_string()]).is_err());
        Ok(())
    }
}
