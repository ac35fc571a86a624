//! # Adaptive Effects
//!
//! Keeps the master effects chain tuned to what is playing. Every analysis
//! frame (nominally 10 Hz) the processor reads the spectrum, averages it into
//! bass (< 250 Hz), mid (250–2000 Hz) and treble (> 2000 Hz) levels on a
//! 0–255 scale, and nudges the mood preset:
//!
//! | band level      | adjustment                         |
//! |-----------------|------------------------------------|
//! | bass > 180      | filter −300 Hz                     |
//! | bass < 80       | filter +200 Hz                     |
//! | mid > 160       | gain +0.05                         |
//! | mid < 80        | gain −0.05                         |
//! | treble > 180    | compression −2, filter −150 Hz     |
//! | treble < 60     | filter +100 Hz                     |
//!
//! Adjustments are always applied to the preset, never accumulated, and the
//! result is clamped to filter `[1000, 8000]` Hz, gain `[0.3, 1.0]` and
//! compression ratio `[2, 20]`. Applied values approach their targets
//! exponentially, so a frame never produces a jump.

use crate::config::MixConfig;
use crate::engine::{AudioEngine, EffectNode, EffectParam, Interval};
use crate::mood::Mood;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

pub const FILTER_BOUNDS: (f64, f64) = (1000.0, 8000.0);
pub const GAIN_BOUNDS: (f64, f64) = (0.3, 1.0);
pub const COMPRESSION_BOUNDS: (f64, f64) = (2.0, 20.0);

const BASS_CEILING_HZ: f64 = 250.0;
const MID_CEILING_HZ: f64 = 2000.0;

/// Baseline effect settings for a mood.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectsPreset {
    /// Low-pass cutoff in Hz.
    pub filter_frequency: f64,
    pub gain: f64,
    pub compression_ratio: f64,
    /// High-pass cutoff in Hz.
    pub high_pass: f64,
    pub distortion: f64,
    /// Reverb wet level.
    pub reverb: f64,
    pub vinyl_volume: f64,
    pub stereo_width: f64,
}

impl EffectsPreset {
    #[must_use]
    pub const fn for_mood(mood: Mood) -> Self {
        match mood {
            Mood::Chill => Self {
                filter_frequency: 3500.0,
                gain: 0.7,
                compression_ratio: 4.0,
                high_pass: 40.0,
                distortion: 0.0,
                reverb: 0.35,
                vinyl_volume: 0.06,
                stereo_width: 1.2,
            },
            Mood::Cafe => Self {
                filter_frequency: 5000.0,
                gain: 0.75,
                compression_ratio: 3.0,
                high_pass: 60.0,
                distortion: 0.02,
                reverb: 0.2,
                vinyl_volume: 0.08,
                stereo_width: 1.0,
            },
            Mood::Study => Self {
                filter_frequency: 2500.0,
                gain: 0.6,
                compression_ratio: 6.0,
                high_pass: 80.0,
                distortion: 0.0,
                reverb: 0.1,
                vinyl_volume: 0.03,
                stereo_width: 0.9,
            },
            Mood::Party => Self {
                filter_frequency: 7000.0,
                gain: 0.9,
                compression_ratio: 8.0,
                high_pass: 30.0,
                distortion: 0.08,
                reverb: 0.15,
                vinyl_volume: 0.0,
                stereo_width: 1.4,
            },
        }
    }

    #[must_use]
    pub const fn get(&self, param: EffectParam) -> f64 {
        match param {
            EffectParam::FilterFrequency => self.filter_frequency,
            EffectParam::Gain => self.gain,
            EffectParam::CompressionRatio => self.compression_ratio,
            EffectParam::HighPass => self.high_pass,
            EffectParam::Distortion => self.distortion,
            EffectParam::Reverb => self.reverb,
            EffectParam::VinylVolume => self.vinyl_volume,
            EffectParam::StereoWidth => self.stereo_width,
        }
    }

    fn get_mut(&mut self, param: EffectParam) -> &mut f64 {
        match param {
            EffectParam::FilterFrequency => &mut self.filter_frequency,
            EffectParam::Gain => &mut self.gain,
            EffectParam::CompressionRatio => &mut self.compression_ratio,
            EffectParam::HighPass => &mut self.high_pass,
            EffectParam::Distortion => &mut self.distortion,
            EffectParam::Reverb => &mut self.reverb,
            EffectParam::VinylVolume => &mut self.vinyl_volume,
            EffectParam::StereoWidth => &mut self.stereo_width,
        }
    }

    /// Apply `deltas` to this preset and clamp to the adaptive bounds.
    #[must_use]
    pub fn adapted(&self, deltas: EffectDeltas) -> Self {
        Self {
            filter_frequency: (self.filter_frequency + deltas.filter_frequency)
                .clamp(FILTER_BOUNDS.0, FILTER_BOUNDS.1),
            gain: (self.gain + deltas.gain).clamp(GAIN_BOUNDS.0, GAIN_BOUNDS.1),
            compression_ratio: (self.compression_ratio + deltas.compression_ratio)
                .clamp(COMPRESSION_BOUNDS.0, COMPRESSION_BOUNDS.1),
            ..*self
        }
    }
}

/// Average magnitude per band, 0–255.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandLevels {
    pub bass: f64,
    pub mid: f64,
    pub treble: f64,
}

impl BandLevels {
    /// Split a spectrum frame into bands. Bin `i` is centred on
    /// `i · sample_rate / 2 / bins.len()` Hz. Empty bands read as 0.
    #[must_use]
    pub fn from_spectrum(bins: &[u8], sample_rate: f64) -> Self {
        if bins.is_empty() {
            return Self::default();
        }
        #[allow(clippy::cast_precision_loss)]
        let bin_hz = sample_rate / 2.0 / bins.len() as f64;

        let mut sums = [0.0f64; 3];
        let mut counts = [0usize; 3];
        for (i, &magnitude) in bins.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let frequency = i as f64 * bin_hz;
            let band = if frequency < BASS_CEILING_HZ {
                0
            } else if frequency < MID_CEILING_HZ {
                1
            } else {
                2
            };
            sums[band] += f64::from(magnitude);
            counts[band] += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let average = |band: usize| if counts[band] == 0 { 0.0 } else { sums[band] / counts[band] as f64 };
        Self { bass: average(0), mid: average(1), treble: average(2) }
    }
}

/// Offsets applied on top of a preset for one analysis frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EffectDeltas {
    pub filter_frequency: f64,
    pub gain: f64,
    pub compression_ratio: f64,
}

impl EffectDeltas {
    #[must_use]
    pub fn from_levels(levels: BandLevels) -> Self {
        let mut deltas = Self::default();

        if levels.bass > 180.0 {
            deltas.filter_frequency -= 300.0;
        } else if levels.bass < 80.0 {
            deltas.filter_frequency += 200.0;
        }

        if levels.mid > 160.0 {
            deltas.gain += 0.05;
        } else if levels.mid < 80.0 {
            deltas.gain -= 0.05;
        }

        if levels.treble > 180.0 {
            deltas.compression_ratio -= 2.0;
            deltas.filter_frequency -= 150.0;
        } else if levels.treble < 60.0 {
            deltas.filter_frequency += 100.0;
        }

        deltas
    }
}

/// Closed-loop effect tuning around a mood preset.
#[derive(Debug)]
pub struct AdaptiveEffectsProcessor {
    mood: Mood,
    base: EffectsPreset,
    target: EffectsPreset,
    current: EffectsPreset,
    bypassed: HashSet<EffectNode>,
    chain_built: bool,
    interval: Interval,
    smoothing: Duration,
    last_frame: Option<Duration>,
    spectrum: Vec<u8>,
}

impl AdaptiveEffectsProcessor {
    #[must_use]
    pub fn new(mood: Mood, config: &MixConfig) -> Self {
        let base = EffectsPreset::for_mood(mood);
        Self {
            mood,
            base,
            target: base,
            current: base,
            bypassed: HashSet::new(),
            chain_built: false,
            interval: Interval::new(config.analysis_interval()),
            smoothing: config.smoothing(),
            last_frame: None,
            spectrum: vec![0; config.frequency_bins.max(1)],
        }
    }

    #[must_use]
    pub fn mood(&self) -> Mood {
        self.mood
    }

    /// Preset the processor adapts around.
    #[must_use]
    pub fn base(&self) -> EffectsPreset {
        self.base
    }

    /// Values most recently written to the engine.
    #[must_use]
    pub fn current(&self) -> EffectsPreset {
        self.current
    }

    #[must_use]
    pub fn target(&self) -> EffectsPreset {
        self.target
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.interval.is_running()
    }

    #[must_use]
    pub fn is_bypassed(&self, node: EffectNode) -> bool {
        self.bypassed.contains(&node)
    }

    /// Build the chain (once) and start sampling at `now`.
    ///
    /// Nodes the engine cannot construct are bypassed: their parameters are
    /// never written and the signal passes through them unchanged.
    pub fn start(&mut self, engine: &mut dyn AudioEngine, now: Duration) {
        if !self.chain_built {
            for node in EffectNode::CHAIN {
                if let Err(e) = engine.create_node(node) {
                    log::warn!("Effect {node:?} unavailable, bypassing: {e:#}");
                    self.bypassed.insert(node);
                }
            }
            self.chain_built = true;
        }

        self.current = self.base;
        self.target = self.base;
        self.last_frame = None;
        self.write_current(engine);
        self.interval.start(now);
        log::info!("Adaptive effects started for {}", self.mood);
    }

    /// Switch to another mood's preset; the next frames glide towards it.
    pub fn set_mood(&mut self, mood: Mood) {
        if mood == self.mood {
            return;
        }
        log::info!("Effects preset {} -> {mood}", self.mood);
        self.mood = mood;
        self.base = EffectsPreset::for_mood(mood);
        self.target = self.base;
        if !self.is_running() {
            self.current = self.base;
        }
    }

    /// Run one analysis frame if due. Returns the band levels it acted on.
    pub fn tick(&mut self, engine: &mut dyn AudioEngine, now: Duration) -> Option<BandLevels> {
        if !self.interval.poll(now) {
            return None;
        }

        let elapsed = self
            .last_frame
            .map_or(self.interval.period(), |last| now.saturating_sub(last));
        self.last_frame = Some(now);

        if let Err(e) = engine.read_frequency_data(&mut self.spectrum) {
            log::warn!("Spectrum read failed, skipping frame: {e:#}");
            return None;
        }
        let levels = BandLevels::from_spectrum(&self.spectrum, engine.sample_rate());
        let deltas = EffectDeltas::from_levels(levels);
        self.target = self.base.adapted(deltas);

        let alpha = smoothing_factor(elapsed, self.smoothing);
        for param in EffectParam::ALL {
            let target = self.target.get(param);
            let value = self.current.get_mut(param);
            *value += (target - *value) * alpha;
        }
        log::trace!(
            "Bands b{:.0}/m{:.0}/t{:.0} -> filter {:.0}Hz gain {:.2} ratio {:.1}",
            levels.bass,
            levels.mid,
            levels.treble,
            self.current.filter_frequency,
            self.current.gain,
            self.current.compression_ratio
        );

        self.write_current(engine);
        Some(levels)
    }

    /// Stop sampling and put the preset back on the chain.
    pub fn stop(&mut self, engine: &mut dyn AudioEngine) {
        self.interval.stop();
        self.last_frame = None;
        self.current = self.base;
        self.target = self.base;
        self.write_current(engine);
        log::info!("Adaptive effects stopped, {} preset restored", self.mood);
    }

    fn write_current(&self, engine: &mut dyn AudioEngine) {
        for param in EffectParam::ALL {
            if self.bypassed.contains(&param.node()) {
                continue;
            }
            if let Err(e) = engine.set_effect(param, self.current.get(param)) {
                log::warn!("Failed to set {param:?}: {e:#}");
            }
        }
    }
}

/// Fraction of the remaining distance covered after `elapsed` with time
/// constant `tau`.
fn smoothing_factor(elapsed: Duration, tau: Duration) -> f64 {
    if tau.is_zero() {
        return 1.0;
    }
    1.0 - (-elapsed.as_secs_f64() / tau.as_secs_f64()).exp()
}
