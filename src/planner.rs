//! Transition planning between consecutive tracks.
//!
//! For an ordered pair the planner picks how the two tracks should blend:
//!
//! | condition (first match wins)              | type          | duration |
//! |-------------------------------------------|---------------|----------|
//! | tempo ratio within 0.1 % and key distance ≤ 2 | beatmatch | 16 s     |
//! | key distance ≤ 1                          | harmonic      | 12 s     |
//! | energy moves by more than 0.3             | energy build / drop | 10 s |
//! | otherwise                                 | crossfade     | 8 s      |
//!
//! Key distance is measured on the circle of fifths, so adjacent keys (C and G)
//! are one step apart even though they are seven semitones apart.
//!
//! The beatmatch tolerance is deliberately strict: a 0.1 % ratio is about
//! 0.12 BPM at 120 BPM, so 120 and 121 BPM are not beatmatched.
//!
//! Serialized transitions carry their timings as integer milliseconds.

use crate::config::MixConfig;
use crate::mood::Mood;
use crate::track::TrackAnalysis;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Pitch classes in circle-of-fifths order (C, G, D, A, E, B, F#, C#, ...).
const CIRCLE_OF_FIFTHS: [u8; 12] = [0, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10, 5];

/// Largest possible distance on the circle; also used for unknown keys.
pub const MAX_KEY_DISTANCE: u8 = 6;

/// Draw weights for the best, second and third ranked candidates.
const RANK_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];
/// Draw weight for any candidate ranked below the third.
const TAIL_WEIGHT: f64 = 0.1;

const ENERGY_JUMP: f64 = 0.3;

/// Tempo ratios closer to 1 than this (0.1 %) are treated as already locked.
const BEATMATCH_TEMPO_TOLERANCE: f64 = 0.001;

/// How two tracks are blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Crossfade,
    Beatmatch,
    Harmonic,
    EnergyBuild,
    EnergyDrop,
}

impl TransitionType {
    /// Length of the blend for this type.
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            TransitionType::Beatmatch => Duration::from_millis(16_000),
            TransitionType::Harmonic => Duration::from_millis(12_000),
            TransitionType::EnergyBuild | TransitionType::EnergyDrop => Duration::from_millis(10_000),
            TransitionType::Crossfade => Duration::from_millis(8_000),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TransitionType::Crossfade => "crossfade",
            TransitionType::Beatmatch => "beatmatch",
            TransitionType::Harmonic => "harmonic",
            TransitionType::EnergyBuild => "energy_build",
            TransitionType::EnergyDrop => "energy_drop",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned blend between two tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: TrackAnalysis,
    pub to: TrackAnalysis,
    pub transition_type: TransitionType,
    #[serde(with = "millis")]
    pub duration: Duration,
    /// Offset into the outgoing track's window at which the fade begins.
    #[serde(with = "millis")]
    pub fade_out_start: Duration,
    /// Offset into the incoming track at which it enters.
    #[serde(with = "millis")]
    pub fade_in_start: Duration,
    /// Playback-rate multiplier for the incoming track, within `[0.8, 1.2]`.
    pub tempo_adjustment: f64,
    /// `1 - key_distance / 6`.
    pub key_compatibility: f64,
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Circle-of-fifths distance between two pitch classes, in `0..=6`.
///
/// Unknown keys are treated as maximally distant.
#[must_use]
pub fn key_distance(a: Option<u8>, b: Option<u8>) -> u8 {
    let position = |key: Option<u8>| key.and_then(|k| CIRCLE_OF_FIFTHS.iter().position(|&p| p == k));
    match (position(a), position(b)) {
        (Some(p1), Some(p2)) => {
            let diff = p1.abs_diff(p2);
            // Bounded by 6, always fits.
            diff.min(12 - diff) as u8
        }
        _ => MAX_KEY_DISTANCE,
    }
}

/// `1.0` for identical keys down to `0.0` for opposite (or unknown) keys.
#[must_use]
pub fn key_compatibility(a: Option<u8>, b: Option<u8>) -> f64 {
    1.0 - f64::from(key_distance(a, b)) / f64::from(MAX_KEY_DISTANCE)
}

/// Ratio of incoming to outgoing tempo.
#[must_use]
pub fn tempo_ratio(from: &TrackAnalysis, to: &TrackAnalysis) -> f64 {
    if from.tempo() > 0.0 { to.tempo() / from.tempo() } else { 1.0 }
}

/// Pure transition classification for an ordered pair.
#[must_use]
pub fn classify_transition(from: &TrackAnalysis, to: &TrackAnalysis) -> TransitionType {
    let ratio = tempo_ratio(from, to);
    let distance = key_distance(from.key(), to.key());
    let energy_delta = to.energy() - from.energy();

    if (ratio - 1.0).abs() < BEATMATCH_TEMPO_TOLERANCE && distance <= 2 {
        TransitionType::Beatmatch
    } else if distance <= 1 {
        TransitionType::Harmonic
    } else if energy_delta.abs() > ENERGY_JUMP {
        if energy_delta > 0.0 { TransitionType::EnergyBuild } else { TransitionType::EnergyDrop }
    } else {
        TransitionType::Crossfade
    }
}

/// Plans transitions and picks follow-up tracks for the current mood.
#[derive(Debug, Clone)]
pub struct TransitionPlanner {
    mood: Mood,
    window: Duration,
    candidate_pool: usize,
    rng: StdRng,
}

impl TransitionPlanner {
    #[must_use]
    pub fn new(mood: Mood, config: &MixConfig) -> Self {
        Self::with_rng(mood, config, StdRng::from_entropy())
    }

    /// Planner whose candidate draws are reproducible.
    #[must_use]
    pub fn with_seed(mood: Mood, config: &MixConfig, seed: u64) -> Self {
        Self::with_rng(mood, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mood: Mood, config: &MixConfig, rng: StdRng) -> Self {
        Self {
            mood,
            window: config.transition_window(),
            candidate_pool: config.candidate_pool.max(1),
            rng,
        }
    }

    #[must_use]
    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn set_mood(&mut self, mood: Mood) {
        self.mood = mood;
    }

    /// Plan the blend from `from` into `to`. Deterministic for a given pair.
    #[must_use]
    pub fn calculate_transition(&self, from: &TrackAnalysis, to: &TrackAnalysis) -> Transition {
        let transition_type = classify_transition(from, to);
        let duration = transition_type.duration();

        let transition = Transition {
            from: from.clone(),
            to: to.clone(),
            transition_type,
            duration,
            fade_out_start: self.window.saturating_sub(duration),
            fade_in_start: Duration::ZERO,
            tempo_adjustment: tempo_ratio(from, to).clamp(0.8, 1.2),
            key_compatibility: key_compatibility(from.key(), to.key()),
        };
        log::debug!(
            "Planned {} from '{}' to '{}' ({}ms, key compat {:.2})",
            transition.transition_type,
            from.id,
            to.id,
            duration.as_millis(),
            transition.key_compatibility
        );
        transition
    }

    /// One transition per consecutive pair of `tracks`.
    #[must_use]
    pub fn plan_playlist(&self, tracks: &[TrackAnalysis]) -> Vec<Transition> {
        tracks
            .windows(2)
            .map(|pair| self.calculate_transition(&pair[0], &pair[1]))
            .collect()
    }

    /// How well `candidate` follows `current` under the planner's mood.
    #[must_use]
    pub fn score_candidate(&self, current: &TrackAnalysis, candidate: &TrackAnalysis) -> f64 {
        let tempo_compat = 1.0 - (current.tempo() - candidate.tempo()).abs() / 100.0;
        let key_compat = key_compatibility(current.key(), candidate.key());
        let energy_compat = 1.0 - (current.energy() - candidate.energy()).abs();
        let mood_compat = candidate.score_for(self.mood);

        0.3 * tempo_compat + 0.25 * key_compat + 0.25 * energy_compat + 0.2 * mood_compat
    }

    /// Pick a follow-up for `current` out of `remaining`.
    ///
    /// Candidates are ranked by [`score_candidate`](Self::score_candidate) and
    /// one of the top `candidate_pool` is drawn with weights 0.5 / 0.3 / 0.2
    /// (0.1 for lower ranks), so the best match is likely but not certain.
    /// Returns `None` only when `remaining` is empty.
    pub fn get_next_track<'a>(
        &mut self,
        current: &TrackAnalysis,
        remaining: &'a [TrackAnalysis],
    ) -> Option<&'a TrackAnalysis> {
        if remaining.is_empty() {
            return None;
        }

        let mut ranked: Vec<(&TrackAnalysis, f64)> = remaining
            .iter()
            .map(|candidate| (candidate, self.score_candidate(current, candidate)))
            .collect();
        ranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        ranked.truncate(self.candidate_pool);

        let weights: Vec<f64> = (0..ranked.len())
            .map(|rank| RANK_WEIGHTS.get(rank).copied().unwrap_or(TAIL_WEIGHT))
            .collect();
        let pick = WeightedIndex::new(&weights)
            .map(|dist| dist.sample(&mut self.rng))
            .unwrap_or(0);

        let (chosen, score) = ranked[pick];
        log::trace!("Next after '{}': '{}' (rank {}, score {:.3})", current.id, chosen.id, pick + 1, score);
        Some(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_track;
    use crate::track::{AudioDescriptor, RawTrack};

    fn track(id: &str, tempo: f64, key: Option<u8>, energy: f64) -> TrackAnalysis {
        let raw = RawTrack {
            id: id.to_string(),
            uri: String::new(),
            name: id.to_string(),
            artist: "Test".to_string(),
            features: None,
        };
        analyze_track(&raw, AudioDescriptor { tempo, key, energy, ..AudioDescriptor::default() })
    }

    fn planner() -> TransitionPlanner {
        TransitionPlanner::with_seed(Mood::Party, &MixConfig::default(), 11)
    }

    #[test]
    fn test_key_distance_properties() {
        for a in 0..12u8 {
            assert_eq!(key_distance(Some(a), Some(a)), 0);
            for b in 0..12u8 {
                let d = key_distance(Some(a), Some(b));
                assert_eq!(d, key_distance(Some(b), Some(a)));
                assert!(d <= MAX_KEY_DISTANCE);
            }
        }
        assert_eq!(key_distance(Some(0), Some(7)), 1, "C and G are neighbours");
        assert_eq!(key_distance(Some(0), Some(5)), 1, "wrap-around: C and F");
        assert_eq!(key_distance(Some(0), Some(6)), 6, "tritone is opposite");
    }

    #[test]
    fn test_unknown_key_is_maximally_distant() {
        assert_eq!(key_distance(None, Some(3)), 6);
        assert_eq!(key_distance(Some(3), None), 6);
        assert_eq!(key_distance(Some(12), Some(3)), 6);
        assert_eq!(key_compatibility(None, None), 0.0);
    }

    #[test]
    fn test_harmonic_scenario() {
        let t = planner().calculate_transition(&track("a", 120.0, Some(0), 0.5), &track("b", 121.0, Some(7), 0.5));
        assert_eq!(t.transition_type, TransitionType::Harmonic);
        assert_eq!(t.duration, Duration::from_millis(12_000));
        assert_eq!(t.fade_out_start, Duration::from_millis(18_000));

        let t = planner().calculate_transition(&track("a", 120.0, Some(0), 0.5), &track("b", 150.0, Some(5), 0.5));
        assert_eq!(t.transition_type, TransitionType::Harmonic);
    }

    #[test]
    fn test_beatmatch_scenario() {
        let t = planner().calculate_transition(&track("a", 120.0, Some(0), 0.5), &track("b", 120.05, Some(0), 0.5));
        assert_eq!(t.transition_type, TransitionType::Beatmatch);
        assert_eq!(t.duration, Duration::from_millis(16_000));
        assert_eq!(t.key_compatibility, 1.0);
        assert_eq!(t.fade_in_start, Duration::ZERO);
    }

    #[test]
    fn test_energy_build_and_drop() {
        let low = track("low", 80.0, Some(0), 0.2);
        let high = track("high", 160.0, Some(6), 0.6);

        let up = planner().calculate_transition(&low, &high);
        assert_eq!(up.transition_type, TransitionType::EnergyBuild);
        assert_eq!(up.duration, Duration::from_millis(10_000));

        let down = planner().calculate_transition(&high, &low);
        assert_eq!(down.transition_type, TransitionType::EnergyDrop);
    }

    #[test]
    fn test_crossfade_default() {
        let t = planner().calculate_transition(&track("a", 80.0, Some(0), 0.5), &track("b", 160.0, Some(6), 0.6));
        assert_eq!(t.transition_type, TransitionType::Crossfade);
        assert_eq!(t.duration, Duration::from_millis(8_000));
        assert_eq!(t.fade_out_start, Duration::from_millis(22_000));
    }

    #[test]
    fn test_tempo_adjustment_is_clamped() {
        let t = planner().calculate_transition(&track("a", 80.0, Some(0), 0.5), &track("b", 160.0, Some(6), 0.5));
        assert_eq!(t.tempo_adjustment, 1.2);
        let t = planner().calculate_transition(&track("a", 160.0, Some(0), 0.5), &track("b", 80.0, Some(6), 0.5));
        assert_eq!(t.tempo_adjustment, 0.8);
    }

    #[test]
    fn test_calculate_transition_is_deterministic() {
        let a = track("a", 97.0, Some(2), 0.4);
        let b = track("b", 131.0, Some(9), 0.9);
        let first = planner().calculate_transition(&a, &b);
        let second = TransitionPlanner::with_seed(Mood::Chill, &MixConfig::default(), 99).calculate_transition(&a, &b);
        assert_eq!(first.transition_type, second.transition_type);
        assert_eq!(first.duration, second.duration);
        assert_eq!(first.key_compatibility, second.key_compatibility);
    }

    #[test]
    fn test_plan_playlist_pairs() {
        let tracks = vec![track("a", 120.0, Some(0), 0.5), track("b", 121.0, Some(7), 0.5), track("c", 90.0, None, 0.2)];
        let plan = planner().plan_playlist(&tracks);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].from.id, "a");
        assert_eq!(plan[1].to.id, "c");
        assert!(planner().plan_playlist(&tracks[..1]).is_empty());
    }

    #[test]
    fn test_get_next_track_draws_from_top_candidates() {
        let current = track("cur", 120.0, Some(0), 0.5);
        let remaining = vec![
            track("close", 121.0, Some(0), 0.5),
            track("near", 125.0, Some(7), 0.55),
            track("ok", 130.0, Some(2), 0.6),
            track("far", 60.0, Some(6), 0.0),
            track("farther", 200.0, None, 1.0),
        ];

        let mut planner = planner();
        for _ in 0..100 {
            let pick = planner.get_next_track(&current, &remaining).unwrap();
            assert!(["close", "near", "ok"].contains(&pick.id.as_str()), "picked {}", pick.id);
        }
    }

    #[test]
    fn test_get_next_track_empty_pool() {
        let current = track("cur", 120.0, Some(0), 0.5);
        assert!(planner().get_next_track(&current, &[]).is_none());
    }

    #[test]
    fn test_candidate_score_prefers_similar_tracks() {
        let p = planner();
        let current = track("cur", 120.0, Some(0), 0.5);
        let similar = track("s", 120.0, Some(0), 0.5);
        let distant = track("d", 180.0, Some(6), 1.0);
        assert!(p.score_candidate(&current, &similar) > p.score_candidate(&current, &distant));
    }

    #[test]
    fn test_transition_type_serde_names() {
        let json = serde_json::to_string(&TransitionType::EnergyDrop).unwrap();
        assert_eq!(json, "\"energy_drop\"");
        assert_eq!(TransitionType::EnergyBuild.to_string(), "energy_build");
    }

    #[test]
    fn test_transition_timings_serialize_as_millis() {
        let a = track("a", 120.0, Some(0), 0.5);
        let b = track("b", 121.0, Some(7), 0.5);
        let transition = planner().calculate_transition(&a, &b);

        let value = serde_json::to_value(&transition).unwrap();
        assert_eq!(value["duration"], 12_000);
        assert_eq!(value["fade_out_start"], 18_000);
        assert_eq!(value["fade_in_start"], 0);

        let back: Transition = serde_json::from_value(value).unwrap();
        assert_eq!(back, transition);
    }
}
