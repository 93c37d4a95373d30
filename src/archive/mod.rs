pub mod chunk_store;

pub use chunk_store::{ArtifactManifest, ChunkedArtifactStore};
