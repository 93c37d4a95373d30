use crate::error::{ProcessingError, Result};
use crate::grid::{
    CoordinateGridMapper, Field, GeoBounds, GridIndex, GridSample, InterpolationStrategy, LandMask,
    NanConservingSmoother, ScatteredFieldInterpolator,
};
use crate::models::{DailyImage, Metric};
use crate::sources::{SampleSource, StationSample};
use crate::writers::ImageCache;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

/// Whether an image came from the cache or was computed by this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    Cache,
    Compiled,
}

/// Turns one date of station summaries into a multi-channel raster.
pub struct DailyImageCompiler {
    mapper: CoordinateGridMapper,
    interpolator: ScatteredFieldInterpolator,
    smoother: Option<NanConservingSmoother>,
    source: Arc<dyn SampleSource>,
    cache: Option<ImageCache>,
}

impl DailyImageCompiler {
    pub fn new(bounds: GeoBounds, mask: Arc<LandMask>, source: Arc<dyn SampleSource>) -> Result<Self> {
        bounds.check()?;
        if mask.shape() != bounds.shape() {
            return Err(ProcessingError::Config(format!(
                "Mask shape {:?} does not match grid shape {:?}",
                mask.shape(),
                bounds.shape()
            )));
        }

        Ok(Self {
            mapper: CoordinateGridMapper::new(bounds),
            interpolator: ScatteredFieldInterpolator::new(mask),
            smoother: None,
            source,
            cache: None,
        })
    }

    pub fn with_strategy(mut self, strategy: InterpolationStrategy) -> Self {
        self.interpolator = self.interpolator.with_strategy(strategy);
        self
    }

    /// Smooth every channel with the given sigma; `None` disables smoothing.
    pub fn with_smoothing(mut self, sigma: Option<f64>) -> Result<Self> {
        self.smoother = sigma.map(NanConservingSmoother::new).transpose()?;
        Ok(self)
    }

    pub fn with_cache(mut self, cache: ImageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn bounds(&self) -> &GeoBounds {
        self.mapper.bounds()
    }

    pub fn cache(&self) -> Option<&ImageCache> {
        self.cache.as_ref()
    }

    /// Compute the image for `date` without consulting the cache.
    pub fn compile(&self, date: NaiveDate, metrics: &[Metric]) -> Result<DailyImage> {
        if metrics.is_empty() {
            return Err(ProcessingError::Config(
                "At least one metric is required".to_string(),
            ));
        }

        let mut samples = self.source.samples_for(date)?;
        samples.sort_by(|a, b| a.station.station_id.cmp(&b.station.station_id));
        let placed = self.place(&samples);

        debug!(
            "{}: {} of {} stations fall on the grid",
            date,
            placed.len(),
            samples.len()
        );

        let channels = metrics
            .iter()
            .map(|metric| self.compile_channel(*metric, &placed))
            .collect::<Result<Vec<Field>>>()?;

        DailyImage::from_channels(date, metrics.to_vec(), &channels)
    }

    /// The image for `date`, served from the cache when present.
    ///
    /// Freshly compiled images are written to the cache before being
    /// returned.
    pub fn image_for(&self, date: NaiveDate, metrics: &[Metric]) -> Result<(DailyImage, ImageOrigin)> {
        let Some(cache) = &self.cache else {
            return Ok((self.compile(date, metrics)?, ImageOrigin::Compiled));
        };

        if let Some(image) = cache.get(date)? {
            self.check_cached(&image, metrics, cache)?;
            debug!("Cache hit for {}", date);
            return Ok((image, ImageOrigin::Cache));
        }

        let image = self.compile(date, metrics)?;
        cache.put(&image)?;
        info!("Compiled image for {}", date);
        Ok((image, ImageOrigin::Compiled))
    }

    fn check_cached(&self, image: &DailyImage, metrics: &[Metric], cache: &ImageCache) -> Result<()> {
        let (height, width) = self.bounds().shape();
        if image.height() != height || image.width() != width {
            return Err(ProcessingError::cache_corruption(
                cache.path_for(image.date),
                format!(
                    "grid is {}x{}, expected {}x{}",
                    image.height(),
                    image.width(),
                    height,
                    width
                ),
            ));
        }
        if image.metrics != metrics {
            return Err(ProcessingError::cache_corruption(
                cache.path_for(image.date),
                format!("channels {:?} differ from requested {:?}", image.metrics, metrics),
            ));
        }
        Ok(())
    }

    /// Grid cell of each station, dropping stations outside the grid.
    fn place<'a>(&self, samples: &'a [StationSample]) -> Vec<(GridIndex, &'a StationSample)> {
        samples
            .iter()
            .filter_map(|s| {
                let cell = self.mapper.cell(s.station.latitude, s.station.longitude);
                if cell.is_none() {
                    debug!(
                        "Dropping station {} at ({}, {}): outside grid",
                        s.station.station_id, s.station.latitude, s.station.longitude
                    );
                }
                cell.map(|c| (c, s))
            })
            .collect()
    }

    fn compile_channel(&self, metric: Metric, placed: &[(GridIndex, &StationSample)]) -> Result<Field> {
        let samples: Vec<GridSample> = placed
            .iter()
            .filter_map(|(cell, s)| s.summary.value(metric).map(|v| GridSample::new(*cell, v)))
            .collect();

        let field = self.interpolator.interpolate(&samples)?;
        Ok(match &self.smoother {
            Some(smoother) => smoother.smooth(&field),
            None => field,
        })
    }
}
