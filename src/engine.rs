//! Audio engine and transport contracts.
//!
//! Cadence never touches audio hardware. Node construction, parameter writes,
//! physical playback and spectrum sampling are delegated to an
//! [`AudioEngine`]; track-level playback control goes through a
//! [`Transport`]. Both are implemented by the surrounding player (and by
//! [`crate::simulation`] for tests and the `simulate` command).
//!
//! Periodic work is cooperative: callers poll [`Interval`] timers from a
//! single tick instead of spawning threads.

use crate::track::TrackAnalysis;
use anyhow::Result;
use std::time::Duration;

/// One of the two playback slots a transition blends between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deck {
    A,
    B,
}

impl Deck {
    #[must_use]
    pub const fn other(self) -> Deck {
        match self {
            Deck::A => Deck::B,
            Deck::B => Deck::A,
        }
    }
}

/// Processing nodes of the effects chain, in signal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectNode {
    HighPass,
    LowPass,
    Compressor,
    Distortion,
    Reverb,
    Vinyl,
    Stereo,
    MasterGain,
}

impl EffectNode {
    pub const CHAIN: [EffectNode; 8] = [
        EffectNode::HighPass,
        EffectNode::LowPass,
        EffectNode::Compressor,
        EffectNode::Distortion,
        EffectNode::Reverb,
        EffectNode::Vinyl,
        EffectNode::Stereo,
        EffectNode::MasterGain,
    ];
}

/// Individually addressable effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectParam {
    FilterFrequency,
    Gain,
    CompressionRatio,
    HighPass,
    Distortion,
    Reverb,
    VinylVolume,
    StereoWidth,
}

impl EffectParam {
    pub const ALL: [EffectParam; 8] = [
        EffectParam::FilterFrequency,
        EffectParam::Gain,
        EffectParam::CompressionRatio,
        EffectParam::HighPass,
        EffectParam::Distortion,
        EffectParam::Reverb,
        EffectParam::VinylVolume,
        EffectParam::StereoWidth,
    ];

    /// The node that owns this parameter.
    #[must_use]
    pub const fn node(self) -> EffectNode {
        match self {
            EffectParam::FilterFrequency => EffectNode::LowPass,
            EffectParam::Gain => EffectNode::MasterGain,
            EffectParam::CompressionRatio => EffectNode::Compressor,
            EffectParam::HighPass => EffectNode::HighPass,
            EffectParam::Distortion => EffectNode::Distortion,
            EffectParam::Reverb => EffectNode::Reverb,
            EffectParam::VinylVolume => EffectNode::Vinyl,
            EffectParam::StereoWidth => EffectNode::Stereo,
        }
    }
}

/// Graph construction, parameter writes and spectrum reads.
///
/// Every call is fallible; callers treat failures as "this enhancement is
/// unavailable" rather than aborting playback.
pub trait AudioEngine {
    /// Create `node` and connect it into the chain towards the destination.
    fn create_node(&mut self, node: EffectNode) -> Result<()>;

    fn set_effect(&mut self, param: EffectParam, value: f64) -> Result<()>;

    fn set_gain(&mut self, deck: Deck, value: f64) -> Result<()>;

    fn set_playback_rate(&mut self, deck: Deck, rate: f64) -> Result<()>;

    /// Begin playing `track` on `deck` after `delay`.
    fn start_source(&mut self, deck: Deck, track: &TrackAnalysis, delay: Duration) -> Result<()>;

    fn stop_source(&mut self, deck: Deck) -> Result<()>;

    /// Sample rate of the analysed signal in Hz.
    fn sample_rate(&self) -> f64;

    /// Fill `out` with current frequency-bin magnitudes (0-255), lowest bin first.
    fn read_frequency_data(&mut self, out: &mut [u8]) -> Result<()>;
}

/// Notifications raised by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The current track finished playing.
    Ended,
    /// Playback failed (decode error, lost stream, ...).
    Error(String),
}

/// Track-level playback control.
pub trait Transport {
    fn play(&mut self, track: &TrackAnalysis) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn seek(&mut self, position: Duration) -> Result<()>;
    fn current_position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn next_track(&mut self) -> Result<()>;
    fn previous_track(&mut self) -> Result<()>;
    /// Take the next pending notification, if any.
    fn poll_event(&mut self) -> Option<TransportEvent>;
}

/// Shortest period an [`Interval`] accepts; a zero period would never re-arm.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Recurring timer polled from a cooperative tick.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    next_due: Option<Duration>,
}

impl Interval {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period: period.max(MIN_PERIOD), next_due: None }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arm the timer so it first fires at `now`.
    pub fn start(&mut self, now: Duration) {
        self.next_due = Some(now);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns true when the timer is due at `now` and re-arms it.
    ///
    /// Missed periods are coalesced into a single firing.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                let mut next = due + self.period;
                while next <= now {
                    next += self.period;
                }
                self.next_due = Some(next);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_other() {
        assert_eq!(Deck::A.other(), Deck::B);
        assert_eq!(Deck::B.other().other(), Deck::B);
    }

    #[test]
    fn test_interval_fires_on_period() {
        let mut timer = Interval::new(Duration::from_millis(100));
        assert!(!timer.poll(Duration::ZERO), "stopped timer never fires");

        timer.start(Duration::ZERO);
        assert!(timer.poll(Duration::ZERO));
        assert!(!timer.poll(Duration::from_millis(50)));
        assert!(timer.poll(Duration::from_millis(100)));
        assert!(!timer.poll(Duration::from_millis(150)));
    }

    #[test]
    fn test_interval_coalesces_missed_periods() {
        let mut timer = Interval::new(Duration::from_millis(100));
        timer.start(Duration::ZERO);
        assert!(timer.poll(Duration::ZERO));
        assert!(timer.poll(Duration::from_millis(1_000)));
        assert!(!timer.poll(Duration::from_millis(1_050)));
        assert!(timer.poll(Duration::from_millis(1_100)));
    }

    #[test]
    fn test_interval_stop() {
        let mut timer = Interval::new(Duration::from_millis(10));
        timer.start(Duration::ZERO);
        timer.stop();
        assert!(!timer.is_running());
        assert!(!timer.poll(Duration::from_secs(1)));
    }

    #[test]
    fn test_interval_zero_period_is_clamped() {
        let mut timer = Interval::new(Duration::ZERO);
        assert_eq!(timer.period(), Duration::from_millis(1));

        timer.start(Duration::ZERO);
        assert!(timer.poll(Duration::from_secs(5)));
        assert!(!timer.poll(Duration::from_secs(5)));
        assert!(timer.poll(Duration::from_millis(5_001)));
    }

    #[test]
    fn test_params_map_to_nodes() {
        assert_eq!(EffectParam::FilterFrequency.node(), EffectNode::LowPass);
        assert_eq!(EffectParam::Gain.node(), EffectNode::MasterGain);
        for param in [EffectParam::Reverb, EffectParam::StereoWidth] {
            assert!(EffectNode::CHAIN.contains(&param.node()));
        }
    }
}
