//! # Transition Execution
//!
//! Drives a planned [`Transition`] on the audio engine. The executor owns the
//! two decks: the *current* deck plays the outgoing track and the other deck
//! receives the incoming one. A transition moves through
//!
//! ```text
//! idle --execute--> transitioning --progress reaches 1--> idle
//! ```
//!
//! Only one transition can be in flight; a second request while busy returns
//! [`Dispatch::NotReady`] and changes nothing.
//!
//! Gain animation is cooperative: the caller polls [`TransitionExecutor::tick`]
//! and the executor writes a frame whenever its animation interval is due.
//! Completion is announced on every channel handed out by
//! [`TransitionExecutor::subscribe`].

use crate::config::MixConfig;
use crate::engine::{AudioEngine, Deck, Interval};
use crate::fade::GainCurve;
use crate::planner::{Transition, TransitionType};
use crate::track::TrackAnalysis;
use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Started,
    /// Another transition is still running.
    NotReady,
}

/// Sent when a new track has taken over the current deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionComplete {
    pub track_id: String,
    pub track_name: String,
    pub artist: String,
    /// `None` for hard cuts (skips and the initial cue).
    pub transition_type: Option<TransitionType>,
}

impl TransitionComplete {
    fn new(track: &TrackAnalysis, transition_type: Option<TransitionType>) -> Self {
        Self {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            artist: track.artist.clone(),
            transition_type,
        }
    }
}

/// Observable progress of the running transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionState {
    pub is_transitioning: bool,
    pub progress: f64,
    pub gain_out: f64,
    pub gain_in: f64,
}

impl Default for TransitionState {
    fn default() -> Self {
        Self { is_transitioning: false, progress: 0.0, gain_out: 1.0, gain_in: 0.0 }
    }
}

#[derive(Debug, Clone)]
struct ActiveTransition {
    transition: Transition,
    curve: GainCurve,
    started_at: Duration,
    entry_delay: Duration,
}

/// Delay until the next beat boundary of a track at `bpm`, given the
/// playhead `position`. Zero when already on a boundary or tempo is unknown.
#[must_use]
pub fn beat_alignment_delay(bpm: f64, position: Duration) -> Duration {
    if bpm <= 0.0 || !bpm.is_finite() {
        return Duration::ZERO;
    }
    let beat_ms = 60_000.0 / bpm;
    #[allow(clippy::cast_precision_loss)]
    let position_ms = position.as_micros() as f64 / 1000.0;
    let into_beat = position_ms % beat_ms;
    if into_beat < 1e-6 || beat_ms - into_beat < 1e-6 {
        Duration::ZERO
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let micros = ((beat_ms - into_beat) * 1000.0).round() as u64;
        Duration::from_micros(micros)
    }
}

#[derive(Debug)]
pub struct TransitionExecutor {
    current_deck: Deck,
    current_track: Option<TrackAnalysis>,
    active: Option<ActiveTransition>,
    state: TransitionState,
    frame: Interval,
    drop_delay: Duration,
    listeners: Vec<Sender<TransitionComplete>>,
}

impl TransitionExecutor {
    #[must_use]
    pub fn new(config: &MixConfig) -> Self {
        Self {
            current_deck: Deck::A,
            current_track: None,
            active: None,
            state: TransitionState::default(),
            frame: Interval::new(config.animation_interval()),
            drop_delay: config.drop_delay(),
            listeners: Vec::new(),
        }
    }

    /// Register for completion notifications.
    pub fn subscribe(&mut self) -> Receiver<TransitionComplete> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    #[must_use]
    pub fn state(&self) -> TransitionState {
        self.state
    }

    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.active.is_some()
    }

    /// How long the incoming source of the running transition was held back
    /// before it began playing.
    #[must_use]
    pub fn entry_delay(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.entry_delay)
    }

    #[must_use]
    pub fn current_deck(&self) -> Deck {
        self.current_deck
    }

    #[must_use]
    pub fn current_track(&self) -> Option<&TrackAnalysis> {
        self.current_track.as_ref()
    }

    /// Put `track` on the current deck at full gain, with no blend.
    ///
    /// Any running transition is cancelled first. Used for the first track of
    /// a session and for skips.
    pub fn hard_cut(&mut self, engine: &mut dyn AudioEngine, track: &TrackAnalysis) -> Result<()> {
        self.cancel(engine);
        if let Err(e) = engine.stop_source(self.current_deck) {
            log::warn!("Failed to stop {:?}: {e:#}", self.current_deck);
        }
        engine.set_playback_rate(self.current_deck, 1.0)?;
        engine.set_gain(self.current_deck, 1.0)?;
        engine.set_gain(self.current_deck.other(), 0.0)?;
        engine
            .start_source(self.current_deck, track, Duration::ZERO)
            .with_context(|| format!("Failed to start '{}'", track.id))?;

        self.current_track = Some(track.clone());
        self.notify(&TransitionComplete::new(track, None));
        Ok(())
    }

    /// Begin `transition` at `now`.
    ///
    /// `outgoing_position` is the playhead of the outgoing track, used to
    /// align beatmatched entries to its beat grid.
    ///
    /// # Errors
    ///
    /// Returns an error when the incoming source cannot be started; the
    /// executor stays idle in that case.
    pub fn execute(
        &mut self,
        transition: Transition,
        engine: &mut dyn AudioEngine,
        now: Duration,
        outgoing_position: Duration,
    ) -> Result<Dispatch> {
        if self.active.is_some() {
            log::debug!("Transition to '{}' rejected: already transitioning", transition.to.id);
            return Ok(Dispatch::NotReady);
        }

        let incoming = self.current_deck.other();
        let (rate, delay) = match transition.transition_type {
            TransitionType::Beatmatch => (
                transition.tempo_adjustment,
                beat_alignment_delay(transition.from.tempo(), outgoing_position),
            ),
            TransitionType::EnergyDrop => (1.0, self.drop_delay),
            _ => (1.0, Duration::ZERO),
        };
        if let Err(e) = engine.set_playback_rate(incoming, rate) {
            log::warn!("Playback rate unavailable on {incoming:?}: {e:#}");
        }

        engine.set_gain(incoming, 0.0)?;
        engine
            .start_source(incoming, &transition.to, delay)
            .with_context(|| format!("Failed to start incoming track '{}'", transition.to.id))?;

        log::info!(
            "Starting {} into '{}' over {}ms (entry delay {}ms)",
            transition.transition_type,
            transition.to.id,
            transition.duration.as_millis(),
            delay.as_millis()
        );

        let curve = GainCurve::for_transition(&transition);
        self.active = Some(ActiveTransition { transition, curve, started_at: now, entry_delay: delay });
        self.state = TransitionState { is_transitioning: true, ..TransitionState::default() };
        self.frame.start(now);
        Ok(Dispatch::Started)
    }

    /// Advance the running transition to `now`.
    ///
    /// Returns the completion notice on the frame that finishes it.
    pub fn tick(&mut self, engine: &mut dyn AudioEngine, now: Duration) -> Option<TransitionComplete> {
        let active = self.active.as_ref()?;
        if !self.frame.poll(now) {
            return None;
        }

        let elapsed = now.saturating_sub(active.started_at);
        let progress = if active.transition.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / active.transition.duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        let (gain_out, gain_in) = active.curve.gains(progress);

        let incoming = self.current_deck.other();
        for (deck, gain) in [(self.current_deck, gain_out), (incoming, gain_in)] {
            if let Err(e) = engine.set_gain(deck, gain) {
                log::warn!("Gain write to {deck:?} failed: {e:#}");
            }
        }
        self.state = TransitionState { is_transitioning: true, progress, gain_out, gain_in };
        log::trace!("Transition progress {progress:.3} (out {gain_out:.3}, in {gain_in:.3})");

        if progress < 1.0 {
            return None;
        }
        self.finish(engine)
    }

    fn finish(&mut self, engine: &mut dyn AudioEngine) -> Option<TransitionComplete> {
        let active = self.active.take()?;
        let outgoing = self.current_deck;
        if let Err(e) = engine.stop_source(outgoing) {
            log::warn!("Failed to stop outgoing {outgoing:?}: {e:#}");
        }
        self.current_deck = outgoing.other();
        for (deck, gain) in [(self.current_deck, 1.0), (outgoing, 0.0)] {
            if let Err(e) = engine.set_gain(deck, gain) {
                log::warn!("Gain reset on {deck:?} failed: {e:#}");
            }
        }

        let event = TransitionComplete::new(&active.transition.to, Some(active.transition.transition_type));
        self.current_track = Some(active.transition.to);
        self.state = TransitionState::default();
        self.frame.stop();

        log::info!("Transition complete, now playing '{}'", event.track_id);
        self.notify(&event);
        Some(event)
    }

    /// Abort the running transition and restore baseline gains.
    pub fn cancel(&mut self, engine: &mut dyn AudioEngine) {
        let Some(active) = self.active.take() else {
            return;
        };
        log::info!("Cancelling transition into '{}'", active.transition.to.id);

        let incoming = self.current_deck.other();
        if let Err(e) = engine.stop_source(incoming) {
            log::warn!("Failed to stop incoming {incoming:?}: {e:#}");
        }
        for (deck, gain) in [(self.current_deck, 1.0), (incoming, 0.0)] {
            if let Err(e) = engine.set_gain(deck, gain) {
                log::warn!("Gain reset on {deck:?} failed: {e:#}");
            }
        }
        self.state = TransitionState::default();
        self.frame.stop();
    }

    fn notify(&mut self, event: &TransitionComplete) {
        // Drop listeners whose receiver has gone away.
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
