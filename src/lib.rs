//! Mood-driven playlist curation and DJ-style mixing.
//!
//! Cadence turns a catalog of tracks into a continuous, mood-targeted mix. It
//! decides *what* to play and *how* to blend it; audio I/O is left to the
//! surrounding player through the [`engine::AudioEngine`] and
//! [`engine::Transport`] traits.
//!
//! Core modules:
//! - [`analyzer`] - Mood affinity and mixing compatibility scoring
//! - [`curator`] - Energy-flow playlist selection and transition-aware ordering
//! - [`planner`] - Transition classification and next-track choice
//! - [`executor`] - Timed gain-curve blends between two decks
//! - [`effects`] - Spectrum-driven effect parameter tuning
//! - [`session`] - Orchestration of all of the above from one tick
//!
//! ### Supporting Modules
//!
//! - [`mood`], [`track`] - Data model
//! - [`catalog`] - Descriptor providers and the JSON catalog
//! - [`engine`] - Audio engine and transport contracts, cooperative timers
//! - [`fade`] - Gain curve shapes
//! - [`simulation`] - In-memory engine and transport
//! - [`config`] - Configuration file management
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use cadence::analyzer::TrackAnalyzer;
//! use cadence::catalog::JsonCatalog;
//! use cadence::config::MixConfig;
//! use cadence::curator::PlaylistCurator;
//! use cadence::mood::Mood;
//! use cadence::planner::TransitionPlanner;
//! use std::path::Path;
//!
//! let config = MixConfig::default();
//! let catalog = JsonCatalog::load(Path::new("tracks.json"))?;
//! let tracks = TrackAnalyzer::with_seed(7).analyze_tracks(catalog.tracks(), &catalog);
//!
//! let mut planner = TransitionPlanner::with_seed(Mood::Party, &config, 7);
//! let playlist = PlaylistCurator::with_seed(&config, 7).curate(&tracks, Mood::Party, 12, &mut planner);
//!
//! for transition in planner.plan_playlist(&playlist) {
//!     println!("{} -> {}: {}", transition.from, transition.to, transition.transition_type);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Running a session
//!
//! ```no_run
//! # use cadence::config::MixConfig;
//! # use cadence::mood::Mood;
//! # use cadence::session::MixSession;
//! # use cadence::simulation::{SimulatedEngine, SimulatedTransport};
//! # use std::time::Duration;
//! # let playlist = Vec::new();
//! let transport = SimulatedTransport::new(Duration::from_secs(180));
//! let mut session = MixSession::new(MixConfig::default(), Mood::Chill, SimulatedEngine::new(), transport);
//! let changes = session.subscribe();
//! session.start(playlist, Duration::ZERO)?;
//!
//! let mut now = Duration::ZERO;
//! loop {
//!     now += Duration::from_millis(50);
//!     session.transport_mut().advance(Duration::from_millis(50));
//!     session.tick(now)?;
//!     for change in changes.try_iter() {
//!         println!("now playing {} - {}", change.artist, change.track_name);
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return `anyhow::Result`. Only boundary problems are
//! errors (unreadable catalog, unknown mood, invalid config, an empty
//! playlist). Degraded playback is logged and worked around: missing
//! descriptors are synthesized, unbuildable effect nodes are bypassed and
//! unplayable tracks are skipped.

pub mod analyzer;
pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod curator;
pub mod effects;
pub mod engine;
pub mod executor;
pub mod fade;
pub mod mood;
pub mod planner;
pub mod session;
pub mod simulation;
pub mod track;
