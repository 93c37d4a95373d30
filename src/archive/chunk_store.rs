use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    DEFAULT_ARTIFACT_CHUNK_SIZE, DEFAULT_ARTIFACT_EXTENSION, DEFAULT_ARTIFACT_PREFIX,
    MANIFEST_SUFFIX,
};
use crate::utils::paths::atomic_write;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Size and checksum of the artifact a chunk set was split from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub total_size: u64,
    pub chunk_size: usize,
    pub chunk_count: usize,
    pub crc32: u32,
}

/// Splits a large file into `<prefix><index>.<extension>` chunks and puts
/// it back together.
///
/// Chunks are ordered by the index embedded in their names, so `model10`
/// follows `model9` whatever order the directory lists them in.
#[derive(Debug, Clone)]
pub struct ChunkedArtifactStore {
    prefix: String,
    extension: String,
    chunk_size: usize,
}

impl ChunkedArtifactStore {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
            chunk_size: DEFAULT_ARTIFACT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_name(&self, index: usize) -> String {
        format!("{}{}.{}", self.prefix, index, self.extension)
    }

    pub fn manifest_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}{}", self.prefix, MANIFEST_SUFFIX))
    }

    /// Index embedded in a chunk file name, if the name belongs to this store.
    pub fn chunk_index(&self, file_name: &str) -> Option<usize> {
        let digits = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Write `source` into `out_dir` as numbered chunks plus a manifest.
    /// Existing chunks of this store in `out_dir` are replaced.
    pub fn split(&self, source: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        if self.chunk_size == 0 {
            return Err(ProcessingError::Config(
                "Chunk size must be positive".to_string(),
            ));
        }

        fs::create_dir_all(out_dir)?;
        for (_, stale) in self.discover(out_dir)? {
            fs::remove_file(stale)?;
        }

        let file = File::open(source)?;
        let total_size = file.metadata()?.len();

        let mut paths = Vec::new();
        let mut hasher = crc32fast::Hasher::new();

        // Zero-length files cannot be mapped
        if total_size > 0 {
            // SAFETY: the mapping is read-only and dropped before returning
            let mmap = unsafe { Mmap::map(&file)? };
            for (index, block) in mmap.chunks(self.chunk_size).enumerate() {
                let path = out_dir.join(self.chunk_name(index));
                atomic_write(&path, block)?;
                hasher.update(block);
                paths.push(path);
            }
        }

        let manifest = ArtifactManifest {
            total_size,
            chunk_size: self.chunk_size,
            chunk_count: paths.len(),
            crc32: hasher.finalize(),
        };
        atomic_write(&self.manifest_path(out_dir), &serde_json::to_vec_pretty(&manifest)?)?;

        info!(
            "Split {} ({} bytes) into {} chunks",
            source.display(),
            total_size,
            paths.len()
        );
        Ok(paths)
    }

    /// Chunk files in `dir`, ordered by embedded index.
    pub fn discover(&self, dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
        let mut chunks: Vec<(usize, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let index = self.chunk_index(name.to_str()?)?;
                Some((index, entry.path()))
            })
            .collect();
        chunks.sort_by_key(|(index, _)| *index);
        Ok(chunks)
    }

    pub fn read_manifest(&self, dir: &Path) -> Result<Option<ArtifactManifest>> {
        let path = self.manifest_path(dir);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&fs::read(path)?)?))
    }

    /// Concatenate the chunks in `dir` in index order.
    ///
    /// Fails if indices are not exactly `0..n`, or if a manifest is present
    /// and the result differs from it in chunk count, size or checksum.
    /// No chunks at all is only accepted when a manifest records an empty
    /// source.
    pub fn combine(&self, dir: &Path) -> Result<Vec<u8>> {
        let chunks = self.discover(dir)?;
        if chunks.is_empty() {
            // An empty source splits into a manifest and no chunks
            if let Some(manifest) = self.read_manifest(dir)? {
                if manifest.chunk_count == 0 && manifest.total_size == 0 {
                    verify(&manifest, 0, &[])?;
                    return Ok(Vec::new());
                }
            }
            return Err(ProcessingError::ArtifactReassembly(format!(
                "No '{}' chunks found in {}",
                self.chunk_name(0),
                dir.display()
            )));
        }

        let mut bytes = Vec::new();
        for (expected, (index, path)) in chunks.iter().enumerate() {
            if *index != expected {
                return Err(ProcessingError::ArtifactReassembly(format!(
                    "Chunk {} is missing (found {} next)",
                    expected, index
                )));
            }
            let block = fs::read(path)?;
            debug!("Chunk {}: {} bytes", index, block.len());
            bytes.extend_from_slice(&block);
        }

        if let Some(manifest) = self.read_manifest(dir)? {
            verify(&manifest, chunks.len(), &bytes)?;
        }

        Ok(bytes)
    }

    /// Reassemble into `dest`, which only appears once fully written.
    pub fn combine_to_file(&self, dir: &Path, dest: &Path) -> Result<u64> {
        let bytes = self.combine(dir)?;
        atomic_write(dest, &bytes)?;
        info!("Reassembled {} ({} bytes)", dest.display(), bytes.len());
        Ok(bytes.len() as u64)
    }
}

impl Default for ChunkedArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_PREFIX, DEFAULT_ARTIFACT_EXTENSION)
    }
}

fn verify(manifest: &ArtifactManifest, chunk_count: usize, bytes: &[u8]) -> Result<()> {
    if manifest.chunk_count != chunk_count {
        return Err(ProcessingError::ArtifactReassembly(format!(
            "Expected {} chunks, found {}",
            manifest.chunk_count, chunk_count
        )));
    }
    if manifest.total_size != bytes.len() as u64 {
        return Err(ProcessingError::ArtifactReassembly(format!(
            "Expected {} bytes, reassembled {}",
            manifest.total_size,
            bytes.len()
        )));
    }
    let crc = crc32fast::hash(bytes);
    if manifest.crc32 != crc {
        return Err(ProcessingError::ArtifactReassembly(format!(
            "Checksum mismatch: expected {:08x}, got {:08x}",
            manifest.crc32, crc
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_chunk_index_parsing() {
        let store = ChunkedArtifactStore::new("model", "h5");
        assert_eq!(store.chunk_index("model0.h5"), Some(0));
        assert_eq!(store.chunk_index("model12.h5"), Some(12));
        assert_eq!(store.chunk_index("model.h5"), None);
        assert_eq!(store.chunk_index("model1.h5.tmp"), None);
        assert_eq!(store.chunk_index("modelx.h5"), None);
        assert_eq!(store.chunk_index("other3.h5"), None);
        assert_eq!(store.chunk_index("model.manifest.json"), None);
    }

    #[test]
    fn test_split_combine_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let chunk = 64;
        let data = payload(3 * chunk + 17);
        let source = dir.path().join("weights.bin");
        fs::write(&source, &data)?;

        let store = ChunkedArtifactStore::default().with_chunk_size(chunk);
        let chunks_dir = dir.path().join("chunks");
        let paths = store.split(&source, &chunks_dir)?;

        assert_eq!(paths.len(), 4);
        assert_eq!(fs::metadata(&paths[3])?.len(), 17);
        assert_eq!(store.combine(&chunks_dir)?, data);
        Ok(())
    }

    #[test]
    fn test_index_order_beats_name_order() -> Result<()> {
        let dir = TempDir::new()?;
        let data = payload(12 * 8 + 3);
        let source = dir.path().join("weights.bin");
        fs::write(&source, &data)?;

        let store = ChunkedArtifactStore::new("part", "bin").with_chunk_size(8);
        let paths = store.split(&source, dir.path())?;
        assert_eq!(paths.len(), 13);

        // "part10.bin" sorts before "part2.bin" lexically
        let mut names: Vec<String> = fs::read_dir(dir.path())?
            .filter_map(|e| e.ok()?.file_name().into_string().ok())
            .filter(|n| store.chunk_index(n).is_some())
            .collect();
        names.sort();
        assert_eq!(names[2], "part10.bin");

        assert_eq!(store.combine(dir.path())?, data);
        Ok(())
    }

    #[test]
    fn test_missing_chunk_is_reassembly_error() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("w.bin");
        fs::write(&source, payload(100))?;

        let store = ChunkedArtifactStore::default().with_chunk_size(30);
        let out = dir.path().join("out");
        store.split(&source, &out)?;
        fs::remove_file(out.join(store.chunk_name(1)))?;

        assert!(matches!(
            store.combine(&out),
            Err(ProcessingError::ArtifactReassembly(_))
        ));
        Ok(())
    }

    #[test]
    fn test_truncated_chunk_fails_manifest_check() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("w.bin");
        fs::write(&source, payload(100))?;

        let store = ChunkedArtifactStore::default().with_chunk_size(30);
        let out = dir.path().join("out");
        store.split(&source, &out)?;
        fs::write(out.join(store.chunk_name(3)), [0u8; 5])?;

        let dest = dir.path().join("rebuilt.bin");
        assert!(matches!(
            store.combine_to_file(&out, &dest),
            Err(ProcessingError::ArtifactReassembly(_))
        ));
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_resplit_replaces_old_chunks() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("w.bin");
        let out = dir.path().join("out");
        let store = ChunkedArtifactStore::default().with_chunk_size(10);

        fs::write(&source, payload(95))?;
        store.split(&source, &out)?;
        fs::write(&source, payload(25))?;
        store.split(&source, &out)?;

        assert_eq!(store.discover(&out)?.len(), 3);
        assert_eq!(store.combine(&out)?, payload(25));
        Ok(())
    }

    #[test]
    fn test_empty_file() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("empty.bin");
        fs::write(&source, b"")?;

        let store = ChunkedArtifactStore::default().with_chunk_size(10);
        let out = dir.path().join("out");
        assert!(store.split(&source, &out)?.is_empty());
        assert_eq!(
            store.read_manifest(&out)?.map(|m| m.total_size),
            Some(0)
        );
        assert_eq!(store.combine(&out)?, Vec::<u8>::new());

        let rebuilt = dir.path().join("rebuilt.bin");
        assert_eq!(store.combine_to_file(&out, &rebuilt)?, 0);
        assert_eq!(fs::read(&rebuilt)?, Vec::<u8>::new());

        assert!(store.split(&source, &out).is_ok());
        assert!(ChunkedArtifactStore::default()
            .with_chunk_size(0)
            .split(&source, &out)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_no_chunks_without_empty_manifest_fails() -> Result<()> {
        let dir = TempDir::new()?;
        let store = ChunkedArtifactStore::default().with_chunk_size(10);
        assert!(store.combine(dir.path()).is_err());

        // Manifest promises data but the chunks are gone
        let source = dir.path().join("data.bin");
        fs::write(&source, payload(25))?;
        let out = dir.path().join("out");
        store.split(&source, &out)?;
        for (_, chunk) in store.discover(&out)? {
            fs::remove_file(chunk)?;
        }
        assert!(store.combine(&out).is_err());
        Ok(())
    }
}
