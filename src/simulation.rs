//! In-memory audio engine and transport.
//!
//! Used by the `simulate` command to dry-run a mix without audio hardware, and
//! by tests to observe every gain, rate and effect write. The engine can be
//! told to fail node construction or source starts to exercise the bypass and
//! skip paths.

use crate::engine::{AudioEngine, Deck, EffectNode, EffectParam, Transport, TransportEvent};
use crate::track::TrackAnalysis;
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// Where simulated spectrum frames come from.
#[derive(Debug, Clone)]
enum Spectrum {
    Fixed(Vec<u8>),
    Random(StdRng),
}

/// A source started on a deck.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedSource {
    pub deck: Deck,
    pub track_id: String,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    sample_rate: f64,
    nodes: Vec<EffectNode>,
    failing_nodes: HashSet<EffectNode>,
    fail_sources: bool,
    effects: HashMap<EffectParam, f64>,
    gains: HashMap<Deck, f64>,
    rates: HashMap<Deck, f64>,
    playing: HashMap<Deck, String>,
    started: Vec<StartedSource>,
    spectrum: Spectrum,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    /// Engine at 44.1 kHz reporting a flat mid-level spectrum.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sample_rate: 44_100.0,
            nodes: Vec::new(),
            failing_nodes: HashSet::new(),
            fail_sources: false,
            effects: HashMap::new(),
            gains: HashMap::new(),
            rates: HashMap::new(),
            playing: HashMap::new(),
            started: Vec::new(),
            spectrum: Spectrum::Fixed(vec![120]),
        }
    }

    /// Engine whose spectrum frames are random noise from `seed`.
    #[must_use]
    pub fn with_random_spectrum(seed: u64) -> Self {
        Self { spectrum: Spectrum::Random(StdRng::seed_from_u64(seed)), ..Self::new() }
    }

    /// Report `levels` on every read; the pattern repeats across all bins.
    pub fn set_spectrum(&mut self, levels: Vec<u8>) {
        self.spectrum = Spectrum::Fixed(if levels.is_empty() { vec![0] } else { levels });
    }

    /// Make `create_node` fail for `node`.
    pub fn fail_node(&mut self, node: EffectNode) {
        self.failing_nodes.insert(node);
    }

    /// Make every `start_source` fail.
    pub fn fail_sources(&mut self, fail: bool) {
        self.fail_sources = fail;
    }

    #[must_use]
    pub fn nodes(&self) -> &[EffectNode] {
        &self.nodes
    }

    #[must_use]
    pub fn effect(&self, param: EffectParam) -> Option<f64> {
        self.effects.get(&param).copied()
    }

    #[must_use]
    pub fn gain(&self, deck: Deck) -> Option<f64> {
        self.gains.get(&deck).copied()
    }

    #[must_use]
    pub fn playback_rate(&self, deck: Deck) -> Option<f64> {
        self.rates.get(&deck).copied()
    }

    #[must_use]
    pub fn playing(&self, deck: Deck) -> Option<&str> {
        self.playing.get(&deck).map(String::as_str)
    }

    #[must_use]
    pub fn started(&self) -> &[StartedSource] {
        &self.started
    }
}

impl AudioEngine for SimulatedEngine {
    fn create_node(&mut self, node: EffectNode) -> Result<()> {
        if self.failing_nodes.contains(&node) {
            bail!("Simulated construction failure for {node:?}");
        }
        self.nodes.push(node);
        Ok(())
    }

    fn set_effect(&mut self, param: EffectParam, value: f64) -> Result<()> {
        if !self.nodes.contains(&param.node()) {
            bail!("Node {:?} is not connected", param.node());
        }
        self.effects.insert(param, value);
        Ok(())
    }

    fn set_gain(&mut self, deck: Deck, value: f64) -> Result<()> {
        self.gains.insert(deck, value);
        Ok(())
    }

    fn set_playback_rate(&mut self, deck: Deck, rate: f64) -> Result<()> {
        self.rates.insert(deck, rate);
        Ok(())
    }

    fn start_source(&mut self, deck: Deck, track: &TrackAnalysis, delay: Duration) -> Result<()> {
        if self.fail_sources {
            bail!("Simulated decode failure for '{}'", track.id);
        }
        self.playing.insert(deck, track.id.clone());
        self.started.push(StartedSource { deck, track_id: track.id.clone(), delay });
        Ok(())
    }

    fn stop_source(&mut self, deck: Deck) -> Result<()> {
        self.playing.remove(&deck);
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn read_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        match &mut self.spectrum {
            Spectrum::Fixed(levels) => {
                for (bin, value) in out.iter_mut().enumerate() {
                    *value = levels[bin % levels.len()];
                }
            }
            Spectrum::Random(rng) => rng.fill(out),
        }
        Ok(())
    }
}

/// Transport with a manually advanced clock.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    current: Option<String>,
    position: Duration,
    track_length: Duration,
    paused: bool,
    skips: usize,
    events: VecDeque<TransportEvent>,
}

impl SimulatedTransport {
    /// Every track is reported as `track_length` long.
    #[must_use]
    pub fn new(track_length: Duration) -> Self {
        Self {
            current: None,
            position: Duration::ZERO,
            track_length,
            paused: false,
            skips: 0,
            events: VecDeque::new(),
        }
    }

    /// Move the playhead forward, raising `Ended` when the track runs out.
    pub fn advance(&mut self, elapsed: Duration) {
        if self.paused || self.current.is_none() {
            return;
        }
        let before = self.position;
        self.position = (self.position + elapsed).min(self.track_length);
        if before < self.track_length && self.position >= self.track_length {
            self.events.push_back(TransportEvent::Ended);
        }
    }

    /// Queue an arbitrary notification.
    pub fn push_event(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn skips(&self) -> usize {
        self.skips
    }
}

impl Transport for SimulatedTransport {
    fn play(&mut self, track: &TrackAnalysis) -> Result<()> {
        self.current = Some(track.id.clone());
        self.position = Duration::ZERO;
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.paused = false;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if position > self.track_length {
            bail!("Seek to {}ms beyond end of track", position.as_millis());
        }
        self.position = position;
        Ok(())
    }

    fn current_position(&self) -> Duration {
        self.position
    }

    fn duration(&self) -> Option<Duration> {
        self.current.as_ref().map(|_| self.track_length)
    }

    fn next_track(&mut self) -> Result<()> {
        self.skips += 1;
        Ok(())
    }

    fn previous_track(&mut self) -> Result<()> {
        self.position = Duration::ZERO;
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_spectrum_repeats_pattern() -> Result<()> {
        let mut engine = SimulatedEngine::new();
        engine.set_spectrum(vec![1, 2, 3]);
        let mut frame = [0u8; 7];
        engine.read_frequency_data(&mut frame)?;
        assert_eq!(frame, [1, 2, 3, 1, 2, 3, 1]);
        Ok(())
    }

    #[test]
    fn test_effect_write_requires_node() -> Result<()> {
        let mut engine = SimulatedEngine::new();
        assert!(engine.set_effect(EffectParam::Gain, 0.5).is_err());
        engine.create_node(EffectNode::MasterGain)?;
        engine.set_effect(EffectParam::Gain, 0.5)?;
        assert_eq!(engine.effect(EffectParam::Gain), Some(0.5));
        Ok(())
    }

    #[test]
    fn test_transport_raises_ended_once() {
        let mut transport = SimulatedTransport::new(Duration::from_secs(10));
        let track = crate::analyzer::analyze_track(
            &crate::track::RawTrack {
                id: "t".to_string(),
                uri: String::new(),
                name: "T".to_string(),
                artist: "A".to_string(),
                features: None,
            },
            crate::track::AudioDescriptor::default(),
        );
        transport.play(&track).unwrap();
        transport.advance(Duration::from_secs(6));
        assert!(transport.poll_event().is_none());
        transport.advance(Duration::from_secs(6));
        assert_eq!(transport.poll_event(), Some(TransportEvent::Ended));
        transport.advance(Duration::from_secs(6));
        assert!(transport.poll_event().is_none());
    }
}
