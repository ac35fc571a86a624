//! # Playlist Curation
//!
//! Builds mood playlists in two passes:
//!
//! 1. **Energy flow**: every slot gets an energy target drawn from a
//!    mood-specific curve, and the best-scoring unused track close to that
//!    target fills it. When nothing fits, the next best unused track is taken,
//!    so a non-empty pool always yields a full playlist.
//! 2. **Ordering**: a greedy walk re-orders the selection so that each step
//!    goes to a track the [`TransitionPlanner`] rates as a good follow-up.
//!
//! ## Energy curves
//!
//! ```text
//! chill  0.20 + 0.15·sin(0.3i) + noise
//! cafe   0.40 + 0.20·sin(0.2i) + noise
//! study  0.25 + noise
//! party  0.50 + 0.30·(i/n) + 0.20·sin(0.5i)
//! ```
//!
//! `noise` is uniform in `[0, 0.1)`; every target is clamped to `[0.1, 0.9]`.

use crate::config::MixConfig;
use crate::mood::Mood;
use crate::planner::TransitionPlanner;
use crate::track::TrackAnalysis;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

const ENERGY_FLOOR: f64 = 0.1;
const ENERGY_CEILING: f64 = 0.9;
const NOISE_AMPLITUDE: f64 = 0.1;

/// Selects and orders tracks for a mood.
#[derive(Debug, Clone)]
pub struct PlaylistCurator {
    energy_tolerance: f64,
    mood_threshold: f64,
    rng: StdRng,
}

impl PlaylistCurator {
    #[must_use]
    pub fn new(config: &MixConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Curator whose energy-curve noise is reproducible.
    #[must_use]
    pub fn with_seed(config: &MixConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &MixConfig, rng: StdRng) -> Self {
        Self {
            energy_tolerance: config.energy_tolerance,
            mood_threshold: config.mood_threshold,
            rng,
        }
    }

    /// Energy target for each of `n` playlist slots.
    pub fn generate_energy_flow(&mut self, mood: Mood, n: usize) -> Vec<f64> {
        (0..n)
            .map(|slot| {
                #[allow(clippy::cast_precision_loss)]
                let i = slot as f64;
                let target = match mood {
                    Mood::Chill => 0.2 + 0.15 * (0.3 * i).sin() + self.noise(),
                    Mood::Cafe => 0.4 + 0.2 * (0.2 * i).sin() + self.noise(),
                    Mood::Study => 0.25 + self.noise(),
                    #[allow(clippy::cast_precision_loss)]
                    Mood::Party => 0.5 + 0.3 * (i / n as f64) + 0.2 * (0.5 * i).sin(),
                };
                target.clamp(ENERGY_FLOOR, ENERGY_CEILING)
            })
            .collect()
    }

    fn noise(&mut self) -> f64 {
        self.rng.gen_range(0.0..NOISE_AMPLITUDE)
    }

    /// Pick up to `max_tracks` tracks for `mood`, one per energy slot.
    ///
    /// The result never repeats a track id and is never longer than the
    /// number of distinct tracks in `tracks`.
    pub fn create_mood_playlist(
        &mut self,
        tracks: &[TrackAnalysis],
        mood: Mood,
        max_tracks: usize,
    ) -> Vec<TrackAnalysis> {
        let mut ranked: Vec<&TrackAnalysis> = tracks.iter().collect();
        ranked.sort_by(|a, b| b.score_for(mood).total_cmp(&a.score_for(mood)));

        let energy_flow = self.generate_energy_flow(mood, max_tracks);
        let mut used: HashSet<&str> = HashSet::with_capacity(max_tracks);
        let mut playlist = Vec::with_capacity(max_tracks.min(tracks.len()));

        for (slot, target) in energy_flow.into_iter().enumerate() {
            let unused = || ranked.iter().copied().filter(|t| !used.contains(t.id.as_str()));

            let fitting = unused().find(|t| {
                (t.energy() - target).abs() <= self.energy_tolerance
                    && t.score_for(mood) > self.mood_threshold
            });
            let chosen = match fitting {
                Some(track) => track,
                None => match unused().next() {
                    Some(track) => {
                        log::debug!("Slot {slot}: no track near energy {target:.2}, using '{}'", track.id);
                        track
                    }
                    None => break,
                },
            };

            used.insert(chosen.id.as_str());
            playlist.push(chosen.clone());
        }

        log::info!("Curated {} tracks for {mood} (requested {max_tracks})", playlist.len());
        playlist
    }

    /// Re-order `tracks` so consecutive pairs blend well.
    ///
    /// Starts from the most mixable track and repeatedly asks `planner` for a
    /// follow-up. The output is always a permutation of the input.
    pub fn optimize_track_order(
        &self,
        tracks: Vec<TrackAnalysis>,
        planner: &mut TransitionPlanner,
    ) -> Vec<TrackAnalysis> {
        if tracks.len() <= 1 {
            return tracks;
        }

        let start = tracks
            .iter()
            .enumerate()
            .fold(0, |best, (i, t)| {
                if t.mixing_compatibility > tracks[best].mixing_compatibility { i } else { best }
            });

        let mut remaining = tracks;
        let mut path = Vec::with_capacity(remaining.len());
        path.push(remaining.remove(start));

        while !remaining.is_empty() {
            let next = path.last().and_then(|current| {
                planner
                    .get_next_track(current, &remaining)
                    .and_then(|chosen| remaining.iter().position(|t| std::ptr::eq(t, chosen)))
            });

            match next {
                Some(index) => path.push(remaining.remove(index)),
                None => {
                    log::debug!("No follow-up candidate, appending {} tracks as-is", remaining.len());
                    path.append(&mut remaining);
                }
            }
        }

        path
    }

    /// Select for `mood`, then order for smooth transitions.
    pub fn curate(
        &mut self,
        tracks: &[TrackAnalysis],
        mood: Mood,
        max_tracks: usize,
        planner: &mut TransitionPlanner,
    ) -> Vec<TrackAnalysis> {
        let selection = self.create_mood_playlist(tracks, mood, max_tracks);
        self.optimize_track_order(selection, planner)
    }
}
