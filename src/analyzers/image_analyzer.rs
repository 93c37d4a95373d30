use crate::error::{ProcessingError, Result};
use crate::models::{DailyImage, Metric};
use crate::writers::ImageWriter;
use chrono::NaiveDate;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub metric: Metric,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub present: usize,
    pub missing: usize,
}

impl ChannelStats {
    pub fn coverage_percentage(&self) -> f64 {
        let total = self.present + self.missing;
        if total == 0 {
            return 0.0;
        }
        (self.present as f64 / total as f64) * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageStatistics {
    pub date: NaiveDate,
    pub height: usize,
    pub width: usize,
    pub channels: Vec<ChannelStats>,
}

impl fmt::Display for ImageStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image for {} ({}x{})", self.date, self.height, self.width)?;
        for stats in &self.channels {
            let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v));
            writeln!(
                f,
                "  {:<16} min {:>10}  max {:>10}  mean {:>10}  coverage {:>5.1}%",
                stats.metric.key(),
                show(stats.min),
                show(stats.max),
                show(stats.mean),
                stats.coverage_percentage()
            )?;
        }
        Ok(())
    }
}

/// Summary statistics over compiled images.
pub struct ImageAnalyzer;

impl ImageAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_file(&self, path: &Path) -> Result<ImageStatistics> {
        let image = ImageWriter::new().read_image(path)?;
        Ok(self.analyze(&image))
    }

    pub fn analyze(&self, image: &DailyImage) -> ImageStatistics {
        let channels = image
            .metrics
            .iter()
            .enumerate()
            .map(|(c, metric)| {
                let mut stats = ChannelStats {
                    metric: *metric,
                    min: None,
                    max: None,
                    mean: None,
                    present: 0,
                    missing: 0,
                };
                let mut sum = 0.0;
                for value in image.channel(c).iter() {
                    match value {
                        Some(v) => {
                            stats.present += 1;
                            sum += v;
                            stats.min = Some(stats.min.map_or(*v, |m| m.min(*v)));
                            stats.max = Some(stats.max.map_or(*v, |m| m.max(*v)));
                        }
                        None => stats.missing += 1,
                    }
                }
                if stats.present > 0 {
                    stats.mean = Some(sum / stats.present as f64);
                }
                stats
            })
            .collect();

        ImageStatistics {
            date: image.date,
            height: image.height(),
            width: image.width(),
            channels,
        }
    }

    /// Mean squared error per metric between a prediction and the observed
    /// image, over the cells where both have a value.
    pub fn compare(
        &self,
        predicted: &DailyImage,
        actual: &DailyImage,
    ) -> Result<Vec<(Metric, Option<f64>)>> {
        if predicted.data.dim() != actual.data.dim() || predicted.metrics != actual.metrics {
            return Err(ProcessingError::InvalidFormat(format!(
                "Cannot compare images for {} and {} with different layouts",
                predicted.date, actual.date
            )));
        }

        Ok(predicted
            .metrics
            .iter()
            .enumerate()
            .map(|(c, metric)| {
                let (sum, count) = predicted
                    .channel(c)
                    .iter()
                    .zip(actual.channel(c).iter())
                    .filter_map(|(p, a)| Some((p.as_ref()? - a.as_ref()?).powi(2)))
                    .fold((0.0, 0usize), |(sum, n), sq| (sum + sq, n + 1));
                (*metric, (count > 0).then(|| sum / count as f64))
            })
            .collect())
    }
}

impl Default for ImageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use pretty_assertions::assert_eq;

    fn image(values: [Option<f64>; 4]) -> DailyImage {
        let mut data = Array3::from_elem((2, 2, 1), None);
        for (i, v) in values.into_iter().enumerate() {
            data[[i / 2, i % 2, 0]] = v;
        }
        DailyImage::new(
            NaiveDate::from_ymd_opt(2021, 7, 4).unwrap(),
            vec![Metric::Pressure],
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_channel_statistics() {
        let stats = ImageAnalyzer::new().analyze(&image([Some(29.0), Some(31.0), None, Some(30.0)]));

        assert_eq!(stats.height, 2);
        let pressure = &stats.channels[0];
        assert_eq!(pressure.min, Some(29.0));
        assert_eq!(pressure.max, Some(31.0));
        assert_eq!(pressure.mean, Some(30.0));
        assert_eq!(pressure.missing, 1);
        assert_eq!(pressure.coverage_percentage(), 75.0);
    }

    #[test]
    fn test_empty_channel_has_no_statistics() {
        let stats = ImageAnalyzer::new().analyze(&image([None; 4]));
        assert_eq!(stats.channels[0].mean, None);
        assert_eq!(stats.channels[0].coverage_percentage(), 0.0);
    }

    #[test]
    fn test_compare_skips_missing_cells() -> Result<()> {
        let predicted = image([Some(1.0), Some(2.0), Some(5.0), None]);
        let actual = image([Some(2.0), Some(4.0), None, Some(1.0)]);

        let errors = ImageAnalyzer::new().compare(&predicted, &actual)?;
        assert_eq!(errors, vec![(Metric::Pressure, Some(2.5))]);
        Ok(())
    }
}
