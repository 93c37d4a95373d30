use crate::archive::ChunkedArtifactStore;
use crate::error::{ProcessingError, Result};
use crate::grid::{GeoBounds, InterpolationStrategy, LandMask};
use crate::models::StationMetadata;
use crate::processors::DailyImageCompiler;
use crate::readers::StationReader;
use crate::sources::YearCache;
use crate::utils::constants::{
    COMPRESSION_SNAPPY, DAILY_SUMMARY_DIR, DEFAULT_ARTIFACT_CHUNK_SIZE, DEFAULT_ARTIFACT_EXTENSION,
    DEFAULT_ARTIFACT_PREFIX, DEFAULT_SMOOTHING_SIGMA, HISTORY_CACHE_DIR, IMAGE_CACHE_DIR,
    MASK_FILE, STATIONS_FILE,
};
use crate::writers::{ImageCache, ImageWriter};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

/// Environment variables `WXGRID__<SECTION>__<KEY>` override file values.
pub const ENV_PREFIX: &str = "WXGRID";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(nested)]
    pub grid: GeoBounds,
    pub paths: PathSettings,
    #[validate(nested)]
    pub compile: CompileSettings,
    #[validate(nested)]
    pub artifacts: ArtifactSettings,
    #[validate(nested)]
    pub processing: ProcessingSettings,
}

/// Locations of inputs and caches. Relative entries resolve against `data_root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub data_root: PathBuf,
    pub stations: PathBuf,
    pub mask: PathBuf,
    pub summaries: PathBuf,
    pub images: PathBuf,
    pub history_cache: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            stations: PathBuf::from(STATIONS_FILE),
            mask: PathBuf::from(MASK_FILE),
            summaries: PathBuf::from(DAILY_SUMMARY_DIR),
            images: PathBuf::from(IMAGE_CACHE_DIR),
            history_cache: PathBuf::from(HISTORY_CACHE_DIR),
        }
    }
}

impl PathSettings {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_root.join(path)
        }
    }

    pub fn stations_file(&self) -> PathBuf {
        self.resolve(&self.stations)
    }

    pub fn mask_file(&self) -> PathBuf {
        self.resolve(&self.mask)
    }

    /// Root of the `<year>/_<station>.csv` tree. The summary directory name
    /// is part of the layout, so this is its parent.
    pub fn summary_root(&self) -> PathBuf {
        let dir = self.resolve(&self.summaries);
        match (dir.file_name(), dir.parent()) {
            (Some(name), Some(parent)) if name == DAILY_SUMMARY_DIR => parent.to_path_buf(),
            _ => dir,
        }
    }

    pub fn image_dir(&self) -> PathBuf {
        self.resolve(&self.images)
    }

    pub fn history_cache_dir(&self) -> PathBuf {
        self.resolve(&self.history_cache)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CompileSettings {
    /// `nearest` or `idw`
    pub strategy: String,
    pub smoothing: bool,
    #[validate(range(min = 0.0, max = 10.0))]
    pub sigma: f64,
    pub cache_images: bool,
    /// Parquet codec for cached images
    pub compression: String,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            strategy: "nearest".to_string(),
            smoothing: true,
            sigma: DEFAULT_SMOOTHING_SIGMA,
            cache_images: true,
            compression: COMPRESSION_SNAPPY.to_string(),
        }
    }
}

impl CompileSettings {
    pub fn strategy(&self) -> Result<InterpolationStrategy> {
        self.strategy.parse()
    }

    pub fn sigma(&self) -> Option<f64> {
        self.smoothing.then_some(self.sigma)
    }

    pub fn image_writer(&self) -> Result<ImageWriter> {
        ImageWriter::new().with_compression(&self.compression)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ArtifactSettings {
    #[validate(length(min = 1))]
    pub prefix: String,
    pub extension: String,
    #[validate(range(min = 1))]
    pub chunk_size: usize,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
            chunk_size: DEFAULT_ARTIFACT_CHUNK_SIZE,
        }
    }
}

impl ArtifactSettings {
    pub fn store(&self) -> ChunkedArtifactStore {
        ChunkedArtifactStore::new(self.prefix.as_str(), self.extension.as_str())
            .with_chunk_size(self.chunk_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProcessingSettings {
    #[validate(range(min = 1, max = 1024))]
    pub max_workers: usize,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
        }
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then environment overrides.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(
            file,
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    fn load_with_env(file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            if !path.is_file() {
                return Err(ProcessingError::Config(format!(
                    "Settings file {} does not exist",
                    path.display()
                )));
            }
            debug!("Reading settings from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    pub fn check(&self) -> Result<()> {
        self.validate()?;
        self.grid.check()?;
        self.compile.strategy()?;
        self.compile.image_writer()?;
        Ok(())
    }

    pub fn read_stations(&self) -> Result<BTreeMap<String, StationMetadata>> {
        StationReader::with_bounds(self.grid).read_stations_map(&self.paths.stations_file())
    }

    /// The land mask file, or an all-valid mask when none is present.
    pub fn land_mask(&self) -> Result<LandMask> {
        let path = self.paths.mask_file();
        let (height, width) = self.grid.shape();
        if path.is_file() {
            LandMask::from_csv(&path, height, width)
        } else {
            debug!("No mask at {}, every cell is valid", path.display());
            Ok(LandMask::all_valid(height, width))
        }
    }

    /// A compiler over the summary archive, configured from these settings.
    pub fn compiler(&self) -> Result<DailyImageCompiler> {
        let source = YearCache::new(self.paths.summary_root(), self.read_stations()?);
        let compiler = DailyImageCompiler::new(self.grid, Arc::new(self.land_mask()?), Arc::new(source))?
            .with_strategy(self.compile.strategy()?)
            .with_smoothing(self.compile.sigma())?;

        Ok(if self.compile.cache_images {
            compiler.with_cache(
                ImageCache::new(self.paths.image_dir()).with_writer(self.compile.image_writer()?),
            )
        } else {
            compiler
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(Some(HashMap::new()))
    }

    #[test]
    fn test_defaults_match_deployment() -> Result<()> {
        let settings = Settings::load_with_env(None, no_env())?;

        assert_eq!(settings.grid, GeoBounds::default());
        assert_eq!(settings.grid.shape(), (48, 116));
        assert_eq!(settings.compile.sigma(), Some(0.6));
        assert_eq!(settings.artifacts.store().chunk_name(3), "model3.h5");
        assert_eq!(settings.paths.summary_root(), PathBuf::from("."));
        Ok(())
    }

    #[test]
    fn test_file_then_environment() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("wxgrid.toml");
        std::fs::write(
            &path,
            "[grid]\nwest = -110.0\neast = -100.0\nsouth = 30.0\nnorth = 40.0\npixels_per_degree = 1\n\n\
             [compile]\nstrategy = \"idw\"\nsmoothing = false\n\n\
             [paths]\ndata_root = \"/data\"\n",
        )?;

        let env = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(Some(HashMap::from([(
                "WXGRID__ARTIFACTS__CHUNK_SIZE".to_string(),
                "1024".to_string(),
            )])));
        let settings = Settings::load_with_env(Some(&path), env)?;

        assert_eq!(settings.grid.shape(), (10, 10));
        assert_eq!(
            settings.compile.strategy()?,
            InterpolationStrategy::InverseDistance { power: 2.0 }
        );
        assert_eq!(settings.compile.sigma(), None);
        assert_eq!(settings.artifacts.chunk_size, 1024);
        assert_eq!(settings.paths.image_dir(), PathBuf::from("/data/images"));
        assert_eq!(settings.paths.summary_root(), PathBuf::from("/data"));
        Ok(())
    }

    #[test]
    fn test_single_grid_key_keeps_other_defaults() -> Result<()> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(Some(HashMap::from([(
                "WXGRID__GRID__PIXELS_PER_DEGREE".to_string(),
                "4".to_string(),
            )])));
        let settings = Settings::load_with_env(None, env)?;

        assert_eq!(settings.grid.shape(), (96, 232));
        assert_eq!(settings.grid.margin, 1.0);
        Ok(())
    }

    #[test]
    fn test_invalid_settings_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[grid]\nwest = -60.0\neast = -70.0\nsouth = 30.0\nnorth = 40.0\npixels_per_degree = 2\n")?;
        assert!(Settings::load_with_env(Some(&path), no_env()).is_err());

        std::fs::write(&path, "[compile]\nstrategy = \"kriging\"\n")?;
        assert!(Settings::load_with_env(Some(&path), no_env()).is_err());

        std::fs::write(&path, "[compile]\ncompression = \"brotli\"\n")?;
        assert!(Settings::load_with_env(Some(&path), no_env()).is_err());

        assert!(Settings::load_with_env(Some(&dir.path().join("missing.toml")), no_env()).is_err());
        Ok(())
    }
}
