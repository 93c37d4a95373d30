use crate::error::{ProcessingError, Result};
use crate::models::{DailyImage, Metric};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE,
};
use crate::utils::paths::temp_file_beside;
use arrow::array::{Array, ArrayRef, Float64Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use ndarray::Array3;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const META_DATE: &str = "wxgrid.date";
const META_HEIGHT: &str = "wxgrid.height";
const META_WIDTH: &str = "wxgrid.width";
const META_CHANNELS: &str = "wxgrid.channels";

/// Persists daily images as Parquet, one row per grid cell.
pub struct ImageWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ImageWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write the image to `path`; the file only appears once complete.
    pub fn write_image(&self, image: &DailyImage, path: &Path) -> Result<()> {
        let schema = self.create_schema(image);
        let batch = self.image_to_batch(image, schema.clone())?;

        let tmp = temp_file_beside(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(tmp.reopen()?, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Read an image back, reporting any structural problem as `CacheCorruption`.
    pub fn read_image(&self, path: &Path) -> Result<DailyImage> {
        self.try_read_image(path).map_err(|e| match e {
            ProcessingError::CacheCorruption { .. } => e,
            other => ProcessingError::cache_corruption(path, other.to_string()),
        })
    }

    fn create_schema(&self, image: &DailyImage) -> Arc<Schema> {
        let mut fields = vec![
            Field::new("row", DataType::UInt32, false),
            Field::new("col", DataType::UInt32, false),
        ];
        fields.extend(
            image
                .metrics
                .iter()
                .map(|m| Field::new(m.key(), DataType::Float64, true)),
        );

        let channels: Vec<&str> = image.metrics.iter().map(|m| m.key()).collect();
        let metadata = HashMap::from([
            (META_DATE.to_string(), image.date.format("%Y-%m-%d").to_string()),
            (META_HEIGHT.to_string(), image.height().to_string()),
            (META_WIDTH.to_string(), image.width().to_string()),
            (META_CHANNELS.to_string(), channels.join(",")),
        ]);

        Arc::new(Schema::new_with_metadata(fields, metadata))
    }

    fn image_to_batch(&self, image: &DailyImage, schema: Arc<Schema>) -> Result<RecordBatch> {
        let (height, width, channels) = image.data.dim();
        let cells = height * width;

        let mut rows = Vec::with_capacity(cells);
        let mut cols = Vec::with_capacity(cells);
        for row in 0..height {
            for col in 0..width {
                rows.push(row as u32);
                cols.push(col as u32);
            }
        }

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(rows)),
            Arc::new(UInt32Array::from(cols)),
        ];
        for c in 0..channels {
            let values: Vec<Option<f64>> = image.channel(c).iter().copied().collect();
            columns.push(Arc::new(Float64Array::from(values)));
        }

        Ok(RecordBatch::try_new(schema, columns)?)
    }

    fn try_read_image(&self, path: &Path) -> Result<DailyImage> {
        let corrupt = |reason: String| ProcessingError::cache_corruption(path, reason);

        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let metadata = builder.schema().metadata().clone();

        let meta = |key: &str| {
            metadata
                .get(key)
                .cloned()
                .ok_or_else(|| corrupt(format!("missing '{}' metadata", key)))
        };
        let date = NaiveDate::parse_from_str(&meta(META_DATE)?, "%Y-%m-%d")?;
        let height: usize = meta(META_HEIGHT)?
            .parse()
            .map_err(|_| corrupt("bad height".to_string()))?;
        let width: usize = meta(META_WIDTH)?
            .parse()
            .map_err(|_| corrupt("bad width".to_string()))?;
        let metrics = meta(META_CHANNELS)?
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|key| {
                Metric::from_name(key).ok_or_else(|| corrupt(format!("unknown channel '{}'", key)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut data = Array3::from_elem((height, width, metrics.len()), None);
        let mut seen = 0usize;

        for batch in builder.build()? {
            let batch = batch?;
            if batch.num_columns() != metrics.len() + 2 {
                return Err(corrupt(format!(
                    "expected {} columns, found {}",
                    metrics.len() + 2,
                    batch.num_columns()
                )));
            }

            let rows = downcast::<UInt32Array>(&batch, 0).ok_or_else(|| corrupt("row column".into()))?;
            let cols = downcast::<UInt32Array>(&batch, 1).ok_or_else(|| corrupt("col column".into()))?;
            let channels = (0..metrics.len())
                .map(|c| {
                    downcast::<Float64Array>(&batch, c + 2)
                        .ok_or_else(|| corrupt(format!("channel column {}", c)))
                })
                .collect::<Result<Vec<_>>>()?;

            for i in 0..batch.num_rows() {
                let (row, col) = (rows.value(i) as usize, cols.value(i) as usize);
                if row >= height || col >= width {
                    return Err(corrupt(format!("cell ({}, {}) outside {}x{}", row, col, height, width)));
                }
                for (c, values) in channels.iter().enumerate() {
                    data[[row, col, c]] = if values.is_null(i) {
                        None
                    } else {
                        Some(values.value(i))
                    };
                }
            }
            seen += batch.num_rows();
        }

        if seen != height * width {
            return Err(corrupt(format!(
                "holds {} cells, expected {}",
                seen,
                height * width
            )));
        }

        DailyImage::new(date, metrics, data)
    }
}

impl Default for ImageWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<T: 'static>(batch: &RecordBatch, index: usize) -> Option<&T> {
    batch.column(index).as_any().downcast_ref::<T>()
}
