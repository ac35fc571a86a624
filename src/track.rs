//! Track records: raw catalog entries, audio descriptors and analysis results.

use crate::mood::{Mood, MoodScores};
use serde::{Deserialize, Serialize};

/// Physical and perceptual measurements of a single track.
///
/// Unit-interval fields (`energy`, `valence`, ...) are expected in `[0, 1]`.
/// `key` is a pitch class `0..=11`; `None` (or anything out of range) means
/// the key could not be detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDescriptor {
    /// Beats per minute.
    pub tempo: f64,
    #[serde(default)]
    pub key: Option<u8>,
    /// 0 = minor, 1 = major.
    #[serde(default)]
    pub mode: u8,
    pub energy: f64,
    pub valence: f64,
    pub danceability: f64,
    #[serde(default)]
    pub acousticness: f64,
    #[serde(default)]
    pub instrumentalness: f64,
    #[serde(default)]
    pub speechiness: f64,
    #[serde(default)]
    pub liveness: f64,
    /// Integrated loudness in dB, typically `[-60, 0]`.
    #[serde(default)]
    pub loudness: f64,
    #[serde(default = "default_time_signature")]
    pub time_signature: u8,
}

fn default_time_signature() -> u8 {
    4
}

impl Default for AudioDescriptor {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            key: None,
            mode: 1,
            energy: 0.5,
            valence: 0.5,
            danceability: 0.5,
            acousticness: 0.5,
            instrumentalness: 0.0,
            speechiness: 0.05,
            liveness: 0.1,
            loudness: -8.0,
            time_signature: 4,
        }
    }
}

/// A catalog entry as it arrives from the catalog provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrack {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    pub name: String,
    pub artist: String,
    /// Descriptor shipped with the catalog entry, if any.
    #[serde(default)]
    pub features: Option<AudioDescriptor>,
}

/// Fully analyzed track. Created once by the analyzer and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub artist: String,
    pub features: AudioDescriptor,
    pub mood_score: MoodScores,
    pub mixing_compatibility: f64,
}

impl TrackAnalysis {
    #[must_use]
    pub fn tempo(&self) -> f64 {
        self.features.tempo
    }

    #[must_use]
    pub fn energy(&self) -> f64 {
        self.features.energy
    }

    #[must_use]
    pub fn key(&self) -> Option<u8> {
        self.features.key
    }

    #[must_use]
    pub fn score_for(&self, mood: Mood) -> f64 {
        self.mood_score.get(mood)
    }
}

impl std::fmt::Display for TrackAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults_fill_missing_fields() {
        let json = r#"{"tempo": 98.0, "energy": 0.3, "valence": 0.6, "danceability": 0.4}"#;
        let d: AudioDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.key, None);
        assert_eq!(d.time_signature, 4);
        assert_eq!(d.acousticness, 0.0);
    }

    #[test]
    fn test_raw_track_without_features() {
        let json = r#"{"id": "t1", "name": "Song", "artist": "Band"}"#;
        let raw: RawTrack = serde_json::from_str(json).unwrap();
        assert!(raw.features.is_none());
        assert!(raw.uri.is_empty());
    }
}
