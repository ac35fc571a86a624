//! Track catalogs.
//!
//! A [`CatalogProvider`] resolves descriptors for tracks that arrive without
//! one. [`JsonCatalog`] is the file-backed provider used by the CLI: a JSON
//! array of [`RawTrack`] entries, each optionally carrying its descriptor.

use crate::track::{AudioDescriptor, RawTrack};
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Source of per-track audio descriptors.
pub trait CatalogProvider {
    /// Look up the descriptor for `track_id`; `None` when unavailable.
    fn fetch_descriptor(&self, track_id: &str) -> Option<AudioDescriptor>;
}

/// Provider that never has a descriptor; every track gets synthesized.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl CatalogProvider for EmptyCatalog {
    fn fetch_descriptor(&self, _track_id: &str) -> Option<AudioDescriptor> {
        None
    }
}

/// Catalog loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    tracks: Vec<RawTrack>,
    descriptors: HashMap<String, AudioDescriptor>,
}

impl JsonCatalog {
    /// Read and parse a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a JSON array of
    /// tracks, or repeats a track id.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let tracks: Vec<RawTrack> = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid catalog {}", path.display()))?;
        let catalog = Self::from_tracks(tracks)?;
        log::info!("Loaded {} tracks from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_tracks(tracks: Vec<RawTrack>) -> Result<Self> {
        let mut descriptors = HashMap::with_capacity(tracks.len());
        let mut seen = std::collections::HashSet::with_capacity(tracks.len());
        for track in &tracks {
            if !seen.insert(track.id.as_str()) {
                bail!("Duplicate track id in catalog: '{}'", track.id);
            }
            if let Some(features) = &track.features {
                descriptors.insert(track.id.clone(), features.clone());
            }
        }
        Ok(Self { tracks, descriptors })
    }

    #[must_use]
    pub fn tracks(&self) -> &[RawTrack] {
        &self.tracks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl CatalogProvider for JsonCatalog {
    fn fetch_descriptor(&self, track_id: &str) -> Option<AudioDescriptor> {
        self.descriptors.get(track_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CATALOG: &str = r#"[
        {"id": "a", "name": "Sunrise", "artist": "Low Tide",
         "features": {"tempo": 92.0, "key": 5, "energy": 0.3, "valence": 0.6, "danceability": 0.4}},
        {"id": "b", "name": "Static", "artist": "Grid"}
    ]"#;

    #[test]
    fn test_load_catalog() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("catalog.json");
        fs::write(&path, CATALOG)?;

        let catalog = JsonCatalog::load(&path)?;
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.fetch_descriptor("a").map(|d| d.key), Some(Some(5)));
        assert!(catalog.fetch_descriptor("b").is_none());
        assert!(catalog.fetch_descriptor("missing").is_none());
        Ok(())
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let track = RawTrack {
            id: "same".to_string(),
            uri: String::new(),
            name: "One".to_string(),
            artist: "Artist".to_string(),
            features: None,
        };
        let err = JsonCatalog::from_tracks(vec![track.clone(), track]).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = JsonCatalog::load(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog"));
    }
}
