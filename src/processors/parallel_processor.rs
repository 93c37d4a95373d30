use crate::error::{ProcessingError, Result};
use crate::models::Metric;
use crate::processors::{DailyImageCompiler, ImageOrigin, StationDailyAggregator};
use crate::readers::ObservationReader;
use crate::utils::progress::ProgressReporter;
use crate::writers::SummaryWriter;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of compiling a range of dates.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompileReport {
    pub compiled: Vec<NaiveDate>,
    pub cached: Vec<NaiveDate>,
    pub failed: Vec<(NaiveDate, String)>,
}

impl CompileReport {
    pub fn total(&self) -> usize {
        self.compiled.len() + self.cached.len() + self.failed.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} dates: {} compiled, {} from cache, {} failed",
            self.total(),
            self.compiled.len(),
            self.cached.len(),
            self.failed.len()
        )
    }
}

/// Outcome of aggregating a directory of hourly station files.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AggregateReport {
    pub stations: usize,
    pub station_days: usize,
    pub files_written: usize,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct ParallelProcessor {
    max_workers: usize,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))
    }

    /// Compile every date in `[start, end]`. Each date is independent; a
    /// failing date is recorded and does not stop the others.
    pub fn compile_range(
        &self,
        compiler: &DailyImageCompiler,
        start: NaiveDate,
        end: NaiveDate,
        metrics: &[Metric],
        progress: Option<&ProgressReporter>,
    ) -> Result<CompileReport> {
        if end < start {
            return Err(ProcessingError::Config(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }

        let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
        if let Some(p) = progress {
            p.set_message(&format!("Compiling {} dates...", dates.len()));
        }

        let pool = self.pool()?;
        let outcomes: Vec<(NaiveDate, Result<ImageOrigin>)> = pool.install(|| {
            dates
                .par_iter()
                .map(|date| {
                    let outcome = compiler.image_for(*date, metrics).map(|(_, origin)| origin);
                    if let Some(p) = progress {
                        p.increment(1);
                    }
                    (*date, outcome)
                })
                .collect()
        });

        let mut report = CompileReport::default();
        for (date, outcome) in outcomes {
            match outcome {
                Ok(ImageOrigin::Compiled) => report.compiled.push(date),
                Ok(ImageOrigin::Cache) => report.cached.push(date),
                Err(e) => {
                    warn!("Failed to compile {}: {}", date, e);
                    if let Some(p) = progress {
                        p.println(&format!("{}: {}", date, e));
                    }
                    report.failed.push((date, e.to_string()));
                }
            }
        }

        if let Some(p) = progress {
            p.finish_with_message(&report.summary());
        }
        info!("{}", report.summary());
        Ok(report)
    }

    /// Aggregate every hourly CSV in `input_dir` into per-station daily
    /// summary files under `output_root`. The station id is the file stem.
    pub fn aggregate_directory(
        &self,
        input_dir: &Path,
        output_root: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<AggregateReport> {
        let mut files: Vec<PathBuf> = fs::read_dir(input_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
            .collect();
        files.sort();

        if let Some(p) = progress {
            p.set_message(&format!("Aggregating {} station files...", files.len()));
        }

        let writer = SummaryWriter::new(output_root);
        let pool = self.pool()?;
        let outcomes: Vec<(PathBuf, Result<(usize, usize)>)> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let outcome = aggregate_file(path, &writer);
                    if let Some(p) = progress {
                        p.increment(1);
                    }
                    (path.clone(), outcome)
                })
                .collect()
        });

        let mut report = AggregateReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok((days, written)) => {
                    report.stations += 1;
                    report.station_days += days;
                    report.files_written += written;
                }
                Err(e) => {
                    warn!("Failed to aggregate {}: {}", path.display(), e);
                    if let Some(p) = progress {
                        p.println(&format!("{}: {}", path.display(), e));
                    }
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Aggregated {} stations into {} station-days",
                report.stations, report.station_days
            ));
        }
        Ok(report)
    }
}

fn aggregate_file(path: &Path, writer: &SummaryWriter) -> Result<(usize, usize)> {
    let station_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Bad file name {}", path.display())))?;

    let observations = ObservationReader::new().read_file(station_id, path)?;
    let summaries = StationDailyAggregator::new().aggregate_station(&observations);
    let written = writer.write_station(station_id, &summaries)?;
    Ok((summaries.len(), written.len()))
}
