use crate::archive::ChunkedArtifactStore;
use crate::error::{ProcessingError, Result};
use crate::forecast::{ForecastModel, Normalization};
use crate::grid::LandMask;
use crate::models::{DailyImage, Metric};
use crate::processors::DailyImageCompiler;
use crate::utils::constants::FORECAST_HISTORY_DAYS;
use crate::writers::ImageCache;
use chrono::{Duration, NaiveDate};
use ndarray::{Array3, ArrayView3, Axis, Zip};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Builds the forecasting model on first use.
pub type ModelLoader = Box<dyn Fn() -> Result<Box<dyn ForecastModel>> + Send + Sync>;

/// Runs the forecasting model over compiled history.
///
/// The model is constructed at most once per service, on the first
/// prediction, and shared by every later call.
pub struct ForecastService {
    loader: ModelLoader,
    model: OnceCell<Box<dyn ForecastModel>>,
    mask: Arc<LandMask>,
    normalization: Normalization,
    cache: Option<ImageCache>,
}

impl ForecastService {
    pub fn new(loader: ModelLoader, mask: Arc<LandMask>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
            mask,
            normalization: Normalization::default(),
            cache: None,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_cache(mut self, cache: ImageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    fn model(&self) -> Result<&dyn ForecastModel> {
        let model = self.model.get_or_try_init(|| {
            info!("Loading forecast model");
            (self.loader)()
        })?;
        Ok(model.as_ref())
    }

    /// Predict the day after the last image in `history`.
    ///
    /// Only the last three images are used. They must share one grid and
    /// one channel layout.
    pub fn predict_next(&self, history: &[DailyImage]) -> Result<DailyImage> {
        if history.len() < FORECAST_HISTORY_DAYS {
            return Err(ProcessingError::MissingData(format!(
                "Forecasting needs {} days of history, got {}",
                FORECAST_HISTORY_DAYS,
                history.len()
            )));
        }
        let recent = &history[history.len() - FORECAST_HISTORY_DAYS..];
        let last = &recent[FORECAST_HISTORY_DAYS - 1];
        let metrics = last.metrics.clone();

        let input = self.prepare_input(recent)?;
        let output = self.model()?.predict(input.view())?;

        let expected = (last.height(), last.width(), metrics.len());
        if output.dim() != expected {
            return Err(ProcessingError::InvalidFormat(format!(
                "Model returned {:?}, expected {:?}",
                output.dim(),
                expected
            )));
        }

        let mut data = Array3::from_elem(expected, None);
        for (c, metric) in metrics.iter().enumerate() {
            let mut channel = data.index_axis_mut(Axis(2), c);
            Zip::indexed(&mut channel)
                .and(output.index_axis(Axis(2), c))
                .for_each(|(row, col), out, predicted| {
                    if self.mask.is_valid(row, col) {
                        *out = Some(self.normalization.denormalize(*metric, *predicted));
                    }
                });
        }

        let date = last.date + Duration::days(1);
        DailyImage::new(date, metrics, data)
    }

    /// Concatenate days along channels, scale, and fill gaps with 0.
    fn prepare_input(&self, days: &[DailyImage]) -> Result<Array3<f64>> {
        let first = &days[0];
        for day in days {
            if day.data.dim() != first.data.dim() || day.metrics != first.metrics {
                return Err(ProcessingError::InvalidFormat(format!(
                    "History images for {} and {} differ in layout",
                    first.date, day.date
                )));
            }
        }

        let scaled: Vec<Array3<f64>> = days
            .iter()
            .map(|day| self.scale(day))
            .collect();
        let views: Vec<ArrayView3<f64>> = scaled.iter().map(|a| a.view()).collect();
        Ok(ndarray::concatenate(Axis(2), &views)?)
    }

    fn scale(&self, day: &DailyImage) -> Array3<f64> {
        let mut out = Array3::zeros(day.data.dim());
        Zip::indexed(&mut out)
            .and(&day.data)
            .for_each(|(_, _, c), out, value| {
                if let Some(v) = value {
                    *out = self.normalization.normalize(day.metrics[c], *v);
                }
            });
        out
    }

    /// Forecasts for `start` and the `days - 1` following dates, using the
    /// three compiled days before `start` as history.
    ///
    /// Each forecast is cached under `<start>_<horizon>`; when every horizon
    /// is already cached nothing is recomputed and the model is not loaded.
    pub fn forecast(
        &self,
        compiler: &DailyImageCompiler,
        start: NaiveDate,
        days: usize,
        metrics: &[Metric],
    ) -> Result<Vec<DailyImage>> {
        if days == 0 {
            return Err(ProcessingError::Config(
                "Forecast length must be at least one day".to_string(),
            ));
        }

        if let Some(cached) = self.cached_forecasts(start, days)? {
            return Ok(cached);
        }

        let mut history = Vec::with_capacity(FORECAST_HISTORY_DAYS + days);
        for back in (1..=FORECAST_HISTORY_DAYS as i64).rev() {
            let (image, _) = compiler.image_for(start - Duration::days(back), metrics)?;
            history.push(image);
        }

        let mut forecasts = Vec::with_capacity(days);
        for horizon in 1..=days {
            info!("Forecasting {} day(s) ahead of {}", horizon, start);
            let next = self.predict_next(&history)?;
            if let Some(cache) = &self.cache {
                cache.put_keyed(&forecast_key(start, horizon), &next)?;
            }
            history.push(next.clone());
            forecasts.push(next);
        }
        Ok(forecasts)
    }

    fn cached_forecasts(&self, start: NaiveDate, days: usize) -> Result<Option<Vec<DailyImage>>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };

        let mut images = Vec::with_capacity(days);
        for horizon in 1..=days {
            match cache.get_keyed(&forecast_key(start, horizon))? {
                Some(image) => images.push(image),
                None => return Ok(None),
            }
        }
        Ok(Some(images))
    }
}

fn forecast_key(start: NaiveDate, horizon: usize) -> String {
    format!("forecast_{}_{}", start.format("%Y-%m-%d"), horizon)
}

/// Make sure the model weights exist at `weights`, rebuilding them from the
/// chunks in `chunk_dir` when they do not.
pub fn reassemble_weights(store: &ChunkedArtifactStore, chunk_dir: &Path, weights: &Path) -> Result<()> {
    if weights.is_file() {
        return Ok(());
    }
    info!("Reassembling model weights from {}", chunk_dir.display());
    store.combine_to_file(chunk_dir, weights)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::PersistenceModel;
    use crate::grid::GeoBounds;
    use crate::models::{DailySummary, StationMetadata};
    use crate::sources::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 4, n).unwrap()
    }

    fn image(date: NaiveDate, value: f64) -> DailyImage {
        let mut data = Array3::from_elem((2, 3, 2), Some(value));
        data[[0, 0, 1]] = None;
        DailyImage::new(date, vec![Metric::AvgTemperature, Metric::Humidity], data).unwrap()
    }

    fn counting_loader(loads: Arc<AtomicUsize>) -> ModelLoader {
        Box::new(move || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(PersistenceModel::new(2)) as Box<dyn ForecastModel>)
        })
    }

    #[test]
    fn test_predict_next_with_persistence() -> Result<()> {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut valid = ndarray::Array2::from_elem((2, 3), true);
        valid[[1, 2]] = false;
        let service = ForecastService::new(counting_loader(loads.clone()), Arc::new(LandMask::new(valid)));

        let history = vec![image(day(1), 10.0), image(day(2), 20.0), image(day(3), 30.0)];
        let next = service.predict_next(&history)?;

        assert_eq!(next.date, day(4));
        assert!((next.data[[0, 1, 0]].unwrap() - 30.0).abs() < 1e-9);
        // Missing input is fed as a scaled 0 and comes back as the range minimum
        let floor = Normalization::default().denormalize(Metric::Humidity, 0.0);
        assert!((next.data[[0, 0, 1]].unwrap() - floor).abs() < 1e-9);
        assert_eq!(next.data[[1, 2, 0]], None);

        service.predict_next(&history)?;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn test_short_history_is_missing_data() {
        let service = ForecastService::new(
            counting_loader(Arc::new(AtomicUsize::new(0))),
            Arc::new(LandMask::all_valid(2, 3)),
        );
        let history = vec![image(day(1), 1.0), image(day(2), 2.0)];

        assert!(matches!(
            service.predict_next(&history),
            Err(ProcessingError::MissingData(_))
        ));
        assert!(!service.is_loaded());
    }

    #[test]
    fn test_loader_failure_is_retried_next_time() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let loader: ModelLoader = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProcessingError::MissingData("weights".to_string()))
        });
        let service = ForecastService::new(loader, Arc::new(LandMask::all_valid(2, 3)));
        let history = vec![image(day(1), 1.0), image(day(2), 2.0), image(day(3), 3.0)];

        assert!(service.predict_next(&history).is_err());
        assert!(service.predict_next(&history).is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_forecast_is_cached_per_horizon() -> Result<()> {
        let dir = TempDir::new()?;
        let bounds = GeoBounds::new(-110.0, -107.0, 36.0, 38.0, 1);
        let mask = Arc::new(LandMask::all_valid(2, 3));

        let mut source = MemorySource::default();
        for n in 1..=3 {
            let mut summary = DailySummary::empty("A", day(n));
            summary.avg_temperature = Some(50.0 + n as f64);
            summary.humidity = Some(40.0);
            source.push(StationMetadata::new("A", 37.0, -108.0, None, "A"), summary);
        }
        let compiler = DailyImageCompiler::new(bounds, mask.clone(), Arc::new(source))?
            .with_cache(ImageCache::new(dir.path().join("images")));

        let loads = Arc::new(AtomicUsize::new(0));
        let service = ForecastService::new(counting_loader(loads.clone()), mask.clone())
            .with_cache(ImageCache::new(dir.path().join("forecasts")));
        let metrics = [Metric::AvgTemperature, Metric::Humidity];

        let first = service.forecast(&compiler, day(4), 2, &metrics)?;
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].date, day(4));
        assert_eq!(first[1].date, day(5));
        assert!((first[1].data[[0, 0, 0]].unwrap() - 53.0).abs() < 1e-9);

        // A fresh service answers from the cache without loading a model
        let fresh_loads = Arc::new(AtomicUsize::new(0));
        let fresh = ForecastService::new(counting_loader(fresh_loads.clone()), mask)
            .with_cache(ImageCache::new(dir.path().join("forecasts")));
        let second = fresh.forecast(&compiler, day(4), 2, &metrics)?;

        assert_eq!(first, second);
        assert_eq!(fresh_loads.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn test_reassemble_weights_only_when_missing() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("weights.h5");
        std::fs::write(&source, vec![7u8; 100])?;

        let store = ChunkedArtifactStore::default().with_chunk_size(33);
        let chunks = dir.path().join("chunks");
        store.split(&source, &chunks)?;

        let target = dir.path().join("rebuilt.h5");
        reassemble_weights(&store, &chunks, &target)?;
        assert_eq!(std::fs::read(&target)?, vec![7u8; 100]);

        std::fs::write(&target, b"keep")?;
        reassemble_weights(&store, &chunks, &target)?;
        assert_eq!(std::fs::read(&target)?, b"keep");
        Ok(())
    }
}
