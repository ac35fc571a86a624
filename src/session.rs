//! # Mix Session
//!
//! Runs a curated playlist end to end. A [`MixSession`] owns the planner,
//! the transition executor, the adaptive effects processor, the audio engine
//! and the transport, and drives all of them from one cooperative
//! [`MixSession::tick`]:
//!
//! 1. Transport notifications are drained first. `Ended` outside a blend and
//!    any `Error` cut straight to the next playlist entry. The transport only
//!    moves to the incoming track once a blend completes, so an error during
//!    a blend belongs to the outgoing track and the incoming one is cut in.
//! 2. The running transition (if any) is advanced. When it completes the
//!    transport is pointed at the new track.
//! 3. Once the playhead enters the mixing window of the current track, the
//!    transition to the next entry is planned and started.
//! 4. The effects processor gets its analysis frame.
//!
//! The mixing window is the last `transition_window` of a track. A planned
//! transition begins `fade_out_start` into that window, so its blend ends
//! with the outgoing track.

use crate::config::MixConfig;
use crate::effects::AdaptiveEffectsProcessor;
use crate::engine::{AudioEngine, Transport, TransportEvent};
use crate::executor::{Dispatch, TransitionComplete, TransitionExecutor, TransitionState};
use crate::mood::Mood;
use crate::planner::{Transition, TransitionPlanner};
use crate::track::TrackAnalysis;
use anyhow::{bail, Result};
use log::{debug, error, info, warn};
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Playing,
    /// Stopped explicitly or ran out of tracks.
    Stopped,
}

/// Playhead offset at which `transition` should begin in a track of
/// `track_length`, given the mixing `window`.
///
/// Tracks shorter than the window start the blend early enough to finish by
/// the end of the track.
#[must_use]
pub fn transition_start(track_length: Duration, transition: &Transition, window: Duration) -> Duration {
    let planned = track_length.saturating_sub(window) + transition.fade_out_start;
    planned.min(track_length.saturating_sub(transition.duration))
}

#[derive(Debug)]
struct InFlight {
    transition: Transition,
    target: usize,
    /// Time the incoming source was held back after the blend began.
    entry_delay: Duration,
}

pub struct MixSession<E: AudioEngine, T: Transport> {
    config: MixConfig,
    engine: E,
    transport: T,
    planner: TransitionPlanner,
    executor: TransitionExecutor,
    effects: AdaptiveEffectsProcessor,
    playlist: Vec<TrackAnalysis>,
    index: usize,
    in_flight: Option<InFlight>,
    /// Playlist index whose outgoing transition was already attempted.
    attempted: Option<usize>,
    state: SessionState,
}

impl<E: AudioEngine, T: Transport> MixSession<E, T> {
    #[must_use]
    pub fn new(config: MixConfig, mood: Mood, engine: E, transport: T) -> Self {
        let planner = TransitionPlanner::new(mood, &config);
        Self::with_planner(config, planner, engine, transport)
    }

    /// Session around an existing planner (for a seeded planner in tests and
    /// simulations).
    #[must_use]
    pub fn with_planner(config: MixConfig, planner: TransitionPlanner, engine: E, transport: T) -> Self {
        let executor = TransitionExecutor::new(&config);
        let effects = AdaptiveEffectsProcessor::new(planner.mood(), &config);
        Self {
            config,
            engine,
            transport,
            planner,
            executor,
            effects,
            playlist: Vec::new(),
            index: 0,
            in_flight: None,
            attempted: None,
            state: SessionState::Idle,
        }
    }

    /// Register for a notice whenever a new track takes over.
    pub fn subscribe(&mut self) -> Receiver<TransitionComplete> {
        self.executor.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn mood(&self) -> Mood {
        self.planner.mood()
    }

    #[must_use]
    pub fn playlist(&self) -> &[TrackAnalysis] {
        &self.playlist
    }

    /// Index of the track on the current deck.
    #[must_use]
    pub fn position(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn current_track(&self) -> Option<&TrackAnalysis> {
        self.executor.current_track()
    }

    #[must_use]
    pub fn transition_state(&self) -> TransitionState {
        self.executor.state()
    }

    #[must_use]
    pub fn effects(&self) -> &AdaptiveEffectsProcessor {
        &self.effects
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Transition from the current track to the next entry, if there is one.
    #[must_use]
    pub fn upcoming_transition(&self) -> Option<Transition> {
        let from = self.playlist.get(self.index)?;
        let to = self.playlist.get(self.index + 1)?;
        Some(self.planner.calculate_transition(from, to))
    }

    /// Load `playlist` and cue its first playable track at `now`.
    ///
    /// # Errors
    ///
    /// Fails when the playlist is empty or no track in it can be started.
    pub fn start(&mut self, playlist: Vec<TrackAnalysis>, now: Duration) -> Result<()> {
        if playlist.is_empty() {
            bail!("Cannot start a session with an empty playlist");
        }
        info!("Starting {} session with {} tracks", self.planner.mood(), playlist.len());

        self.playlist = playlist;
        self.in_flight = None;
        self.attempted = None;
        self.state = SessionState::Playing;
        self.effects.start(&mut self.engine, now);

        if !self.cue_from(0)? {
            self.stop();
            bail!("None of the {} playlist tracks could be started", self.playlist.len());
        }
        Ok(())
    }

    /// Advance everything to `now`.
    ///
    /// # Errors
    ///
    /// Propagates transport failures while switching tracks.
    pub fn tick(&mut self, now: Duration) -> Result<()> {
        if self.state != SessionState::Playing {
            return Ok(());
        }

        while let Some(event) = self.transport.poll_event() {
            self.handle_event(event)?;
            if self.state != SessionState::Playing {
                return Ok(());
            }
        }

        if let Some(done) = self.executor.tick(&mut self.engine, now) {
            self.complete(&done)?;
        }

        self.maybe_begin_transition(now);
        self.effects.tick(&mut self.engine, now);
        Ok(())
    }

    /// Cut straight to the next entry.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn skip(&mut self) -> Result<()> {
        if self.state != SessionState::Playing {
            return Ok(());
        }
        info!("Skipping '{}'", self.describe_current());
        self.transport.next_track()?;
        self.advance_after(self.index)
    }

    /// Change the target mood. Affects candidate scoring and the effects
    /// preset; the running playlist order is kept.
    pub fn set_mood(&mut self, mood: Mood) {
        self.planner.set_mood(mood);
        self.effects.set_mood(mood);
    }

    /// Halt playback: cancel any blend, restore the effects preset and stop
    /// the current source.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.executor.cancel(&mut self.engine);
        self.in_flight = None;
        self.effects.stop(&mut self.engine);
        let deck = self.executor.current_deck();
        if let Err(e) = self.engine.stop_source(deck) {
            warn!("Failed to stop {deck:?}: {e:#}");
        }
        self.state = SessionState::Stopped;
        info!("Session stopped");
    }

    fn handle_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Ended if self.in_flight.is_some() => {
                debug!("Outgoing track ended during blend; incoming deck carries on");
                Ok(())
            }
            TransportEvent::Ended => {
                debug!("'{}' ended without a transition", self.describe_current());
                self.advance_after(self.index)
            }
            TransportEvent::Error(message) => {
                warn!("Playback error on '{}': {message}", self.describe_current());
                self.transport.next_track()?;
                self.advance_after(self.index)
            }
        }
    }

    /// Hard-cut to the first playable entry after `index`, or stop at the
    /// end of the playlist.
    fn advance_after(&mut self, index: usize) -> Result<()> {
        self.in_flight = None;
        if !self.cue_from(index + 1)? {
            info!("End of playlist reached");
            self.stop();
        }
        Ok(())
    }

    /// Hard-cut to the first entry at or after `start` that the engine can
    /// play. Returns false when none could be started.
    fn cue_from(&mut self, start: usize) -> Result<bool> {
        for index in start..self.playlist.len() {
            let track = &self.playlist[index];
            match self.executor.hard_cut(&mut self.engine, track) {
                Ok(()) => {
                    self.transport.play(track)?;
                    self.index = index;
                    self.attempted = None;
                    info!("Now playing {track}");
                    return Ok(true);
                }
                Err(e) => error!("Skipping unplayable track '{}': {e:#}", track.id),
            }
        }
        Ok(false)
    }

    fn maybe_begin_transition(&mut self, now: Duration) {
        if self.in_flight.is_some() || self.executor.is_transitioning() || self.attempted == Some(self.index) {
            return;
        }
        let Some(track_length) = self.transport.duration() else {
            return;
        };
        let Some(transition) = self.upcoming_transition() else {
            return;
        };

        let position = self.transport.current_position();
        if position < transition_start(track_length, &transition, self.config.transition_window()) {
            return;
        }

        self.attempted = Some(self.index);
        let target = self.index + 1;
        match self.executor.execute(transition.clone(), &mut self.engine, now, position) {
            Ok(Dispatch::Started) => {
                let entry_delay = self.executor.entry_delay().unwrap_or_default();
                self.in_flight = Some(InFlight { transition, target, entry_delay });
            }
            Ok(Dispatch::NotReady) => debug!("Executor busy, transition deferred"),
            Err(e) => warn!("Transition into '{}' failed, will cut at end of track: {e:#}", transition.to.id),
        }
    }

    fn complete(&mut self, done: &TransitionComplete) -> Result<()> {
        let Some(in_flight) = self.in_flight.take() else {
            return Ok(());
        };
        self.index = in_flight.target;
        let track = &self.playlist[self.index];
        self.transport.play(track)?;
        // The incoming track has been audible since its entry delay elapsed.
        let played = in_flight.transition.duration.saturating_sub(in_flight.entry_delay);
        if let Err(e) = self.transport.seek(played) {
            warn!("Could not align transport with '{}': {e:#}", track.id);
        }
        info!("Mixed into {track} via {}", in_flight.transition.transition_type);
        debug_assert_eq!(done.track_id, track.id);
        Ok(())
    }

    fn describe_current(&self) -> String {
        self.playlist
            .get(self.index)
            .map_or_else(|| "nothing".to_string(), ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze_track;
    use crate::engine::Deck;
    use crate::planner::TransitionType;
    use crate::simulation::{SimulatedEngine, SimulatedTransport};
    use crate::track::{AudioDescriptor, RawTrack};

    fn track(id: &str, tempo: f64, key: Option<u8>, energy: f64) -> TrackAnalysis {
        let raw = RawTrack {
            id: id.to_string(),
            uri: format!("sim:{id}"),
            name: id.to_uppercase(),
            artist: "Test".to_string(),
            features: None,
        };
        analyze_track(&raw, AudioDescriptor { tempo, key, energy, ..AudioDescriptor::default() })
    }

    fn session(track_secs: u64) -> MixSession<SimulatedEngine, SimulatedTransport> {
        let config = MixConfig::default();
        let planner = TransitionPlanner::with_seed(Mood::Party, &config, 3);
        MixSession::with_planner(
            config,
            planner,
            SimulatedEngine::new(),
            SimulatedTransport::new(Duration::from_secs(track_secs)),
        )
    }

    /// Advance transport and session together in 50ms steps.
    fn run(session: &mut MixSession<SimulatedEngine, SimulatedTransport>, from: u64, to: u64) -> Result<()> {
        let mut now = from;
        while now < to {
            now += 50;
            session.transport_mut().advance(Duration::from_millis(50));
            session.tick(Duration::from_millis(now))?;
        }
        Ok(())
    }

    #[test]
    fn test_transition_start_offsets() {
        let a = track("a", 80.0, Some(0), 0.5);
        let b = track("b", 160.0, Some(6), 0.6);
        let planner = TransitionPlanner::with_seed(Mood::Chill, &MixConfig::default(), 1);
        let crossfade = planner.calculate_transition(&a, &b);
        let window = Duration::from_secs(30);

        assert_eq!(transition_start(Duration::from_secs(200), &crossfade, window), Duration::from_secs(192));
        assert_eq!(transition_start(Duration::from_secs(20), &crossfade, window), Duration::from_secs(12));
        assert_eq!(transition_start(Duration::from_secs(5), &crossfade, window), Duration::ZERO);
    }

    #[test]
    fn test_empty_playlist_is_rejected() {
        let mut session = session(60);
        assert!(session.start(Vec::new(), Duration::ZERO).is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_cues_first_track() -> Result<()> {
        let mut session = session(60);
        let events = session.subscribe();
        session.start(vec![track("a", 80.0, Some(0), 0.5), track("b", 160.0, Some(6), 0.6)], Duration::ZERO)?;

        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.transport().current(), Some("a"));
        assert_eq!(session.engine().playing(Deck::A), Some("a"));
        assert!(session.effects().is_running());
        let cue = events.try_recv()?;
        assert_eq!((cue.track_id.as_str(), cue.transition_type), ("a", None));
        Ok(())
    }

    #[test]
    fn test_plays_through_with_transitions() -> Result<()> {
        let mut session = session(60);
        let events = session.subscribe();
        let playlist = vec![
            track("a", 80.0, Some(0), 0.5),
            track("b", 160.0, Some(6), 0.6),
            track("c", 160.0, Some(6), 0.6),
        ];
        session.start(playlist, Duration::ZERO)?;
        assert_eq!(events.try_recv()?.transition_type, None);

        // a -> b is a crossfade (8s) starting at 52s.
        run(&mut session, 0, 51_000)?;
        assert!(!session.transition_state().is_transitioning);
        run(&mut session, 51_000, 53_000)?;
        assert!(session.transition_state().is_transitioning);

        run(&mut session, 53_000, 61_000)?;
        let mixed = events.try_recv()?;
        assert_eq!(mixed.track_id, "b");
        assert_eq!(mixed.transition_type, Some(TransitionType::Crossfade));
        assert_eq!(session.position(), 1);
        assert_eq!(session.transport().current(), Some("b"));
        // Aligned to 8s at 60s, then played on for another second.
        assert_eq!(session.transport().current_position(), Duration::from_secs(9));

        // b -> c: same tempo and key, beatmatched. It starts at 44s into b,
        // 125ms past a 375ms beat, so c enters 250ms late and has played
        // 15.75s when the blend completes at 112s.
        run(&mut session, 61_000, 120_000)?;
        let mixed = events.try_recv()?;
        assert_eq!(mixed.track_id, "c");
        assert_eq!(mixed.transition_type, Some(TransitionType::Beatmatch));
        assert_eq!(session.transport().current_position(), Duration::from_millis(23_750));

        // c is the last track; it plays out and the session stops.
        run(&mut session, 120_000, 200_000)?;
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.effects().is_running());
        Ok(())
    }

    #[test]
    fn test_ended_without_duration_cuts_to_next() -> Result<()> {
        let mut session = session(60);
        let events = session.subscribe();
        session.start(vec![track("a", 80.0, Some(0), 0.5), track("b", 160.0, Some(6), 0.6)], Duration::ZERO)?;
        events.try_recv()?;

        session.transport_mut().push_event(TransportEvent::Ended);
        session.tick(Duration::from_millis(100))?;

        let cut = events.try_recv()?;
        assert_eq!((cut.track_id.as_str(), cut.transition_type), ("b", None));
        assert_eq!(session.transport().current(), Some("b"));
        Ok(())
    }

    #[test]
    fn test_error_skips_to_next() -> Result<()> {
        let mut session = session(60);
        session.start(
            vec![track("a", 80.0, Some(0), 0.5), track("b", 160.0, Some(6), 0.6), track("c", 90.0, Some(1), 0.4)],
            Duration::ZERO,
        )?;

        session.transport_mut().push_event(TransportEvent::Error("decode failed".to_string()));
        session.tick(Duration::from_millis(100))?;
        assert_eq!(session.position(), 1);
        assert_eq!(session.transport().skips(), 1);

        session.skip()?;
        assert_eq!(session.position(), 2);
        session.skip()?;
        assert_eq!(session.state(), SessionState::Stopped);
        Ok(())
    }

    #[test]
    fn test_error_during_blend_cuts_to_incoming_track() -> Result<()> {
        let mut session = session(60);
        let events = session.subscribe();
        session.start(
            vec![track("a", 80.0, Some(0), 0.5), track("b", 160.0, Some(6), 0.6), track("c", 90.0, Some(1), 0.4)],
            Duration::ZERO,
        )?;
        run(&mut session, 0, 55_000)?;
        assert!(session.transition_state().is_transitioning);
        assert_eq!(session.transport().current(), Some("a"));
        events.try_iter().for_each(drop);

        session.transport_mut().push_event(TransportEvent::Error("decode failed".to_string()));
        session.tick(Duration::from_millis(55_050))?;

        assert_eq!(session.position(), 1);
        assert_eq!(session.transport().current(), Some("b"));
        assert!(!session.transition_state().is_transitioning);
        assert_eq!(session.engine().playing(session.executor.current_deck()), Some("b"));
        let cut = events.try_recv()?;
        assert_eq!((cut.track_id.as_str(), cut.transition_type), ("b", None));
        assert_eq!(session.state(), SessionState::Playing);
        Ok(())
    }

    #[test]
    fn test_delayed_entry_aligns_transport() -> Result<()> {
        let mut session = session(60);
        let events = session.subscribe();
        session.start(vec![track("hi", 80.0, Some(0), 0.9), track("lo", 160.0, Some(6), 0.2)], Duration::ZERO)?;
        events.try_recv()?;

        // Energy drop (10s) from 50s, with the incoming track held back 2s.
        run(&mut session, 0, 60_000)?;
        let mixed = events.try_recv()?;
        assert_eq!(mixed.track_id, "lo");
        assert_eq!(mixed.transition_type, Some(TransitionType::EnergyDrop));
        assert_eq!(session.transport().current_position(), Duration::from_secs(8));
        Ok(())
    }

    #[test]
    fn test_zero_animation_interval_still_completes() -> Result<()> {
        let config = MixConfig { animation_interval_ms: 0, analysis_interval_ms: 0, ..MixConfig::default() };
        let planner = TransitionPlanner::with_seed(Mood::Party, &config, 3);
        let transport = SimulatedTransport::new(Duration::from_secs(60));
        let mut session = MixSession::with_planner(config, planner, SimulatedEngine::new(), transport);
        let events = session.subscribe();
        session.start(vec![track("a", 80.0, Some(0), 0.5), track("b", 160.0, Some(6), 0.6)], Duration::ZERO)?;

        run(&mut session, 0, 61_000)?;
        assert_eq!(events.try_iter().last().map(|e| e.track_id), Some("b".to_string()));
        assert_eq!(session.position(), 1);
        Ok(())
    }

    #[test]
    fn test_unplayable_playlist_fails_to_start() {
        let mut session = session(60);
        session.engine.fail_sources(true);
        assert!(session.start(vec![track("a", 80.0, None, 0.5)], Duration::ZERO).is_err());
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_set_mood_updates_planner_and_effects() -> Result<()> {
        let mut session = session(60);
        session.start(vec![track("a", 80.0, None, 0.5)], Duration::ZERO)?;
        session.set_mood(Mood::Study);
        assert_eq!(session.mood(), Mood::Study);
        assert_eq!(session.effects().mood(), Mood::Study);
        Ok(())
    }

    #[test]
    fn test_stop_cancels_blend_and_restores_preset() -> Result<()> {
        let mut session = session(60);
        session.start(vec![track("a", 80.0, Some(0), 0.5), track("b", 160.0, Some(6), 0.6)], Duration::ZERO)?;
        run(&mut session, 0, 55_000)?;
        assert!(session.transition_state().is_transitioning);

        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.transition_state().is_transitioning);
        assert_eq!(session.engine().playing(Deck::A), None);
        assert_eq!(session.engine().playing(Deck::B), None);
        assert_eq!(session.effects().current(), session.effects().base());
        Ok(())
    }
}
