use crate::error::Result;
use crate::models::DailyImage;
use crate::utils::paths::image_file_name;
use crate::writers::ImageWriter;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable date-keyed store of compiled images.
///
/// Entries are published by atomic rename, so a reader either sees a
/// complete file or no entry at all. A file that exists but fails to load
/// is reported as corrupt rather than being recomputed.
pub struct ImageCache {
    dir: PathBuf,
    writer: ImageWriter,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writer: ImageWriter::new(),
        }
    }

    pub fn with_writer(mut self, writer: ImageWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(image_file_name(date))
    }

    pub fn path_for_key(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.parquet", key))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.path_for(date).is_file()
    }

    pub fn get(&self, date: NaiveDate) -> Result<Option<DailyImage>> {
        self.load(&self.path_for(date))
    }

    pub fn put(&self, image: &DailyImage) -> Result<PathBuf> {
        let path = self.path_for(image.date);
        self.writer.write_image(image, &path)?;
        debug!("Cached image for {} at {}", image.date, path.display());
        Ok(path)
    }

    /// Lookup by an arbitrary key, used for derived images such as forecasts.
    pub fn get_keyed(&self, key: &str) -> Result<Option<DailyImage>> {
        self.load(&self.path_for_key(key))
    }

    pub fn put_keyed(&self, key: &str, image: &DailyImage) -> Result<PathBuf> {
        let path = self.path_for_key(key);
        self.writer.write_image(image, &path)?;
        Ok(path)
    }

    /// Remove the cached image for `date`. Returns whether an entry existed.
    pub fn invalidate(&self, date: NaiveDate) -> Result<bool> {
        match fs::remove_file(self.path_for(date)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self, path: &Path) -> Result<Option<DailyImage>> {
        if !path.is_file() {
            return Ok(None);
        }
        self.writer.read_image(path).map(Some)
    }
}
