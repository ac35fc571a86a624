//! # Cadence - Mood-Driven Mixing Engine
//!
//! Command-line front end for the Cadence library. Every command reads a JSON
//! track catalog, analyzes it, and then curates, plans or simulates a mix.
//!
//! ## Usage
//!
//! ```bash
//! # Score a catalog
//! cadence analyze tracks.json
//!
//! # Curate a party playlist and show its transitions
//! cadence playlist tracks.json --mood party
//!
//! # Dry-run a whole chill session
//! cadence simulate tracks.json --mood chill
//! ```

use anyhow::{bail, Context, Result};
use cadence::analyzer::{statistics, TrackAnalyzer};
use cadence::catalog::JsonCatalog;
use cadence::cli::{self, CatalogArgs, ConfigAction};
use cadence::completion;
use cadence::config::{self, MixConfig};
use cadence::curator::PlaylistCurator;
use cadence::executor::TransitionComplete;
use cadence::mood::Mood;
use cadence::planner::{Transition, TransitionPlanner};
use cadence::session::{MixSession, SessionState};
use cadence::simulation::{SimulatedEngine, SimulatedTransport};
use cadence::track::TrackAnalysis;
use clap::{CommandFactory, Parser};
use log::{debug, info};
use path_absolutize::Absolutize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Playlist as emitted by `playlist --json`.
#[derive(Serialize)]
struct PlaylistReport<'a> {
    mood: Mood,
    tracks: &'a [TrackAnalysis],
    transitions: &'a [Transition],
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => config::get_config_path(),
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<MixConfig> {
    let path = config_path(explicit)?;
    let config = MixConfig::load_or_default(&path)?;
    config.validate().with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Load and analyze the catalog named by `args`.
fn analyze_catalog(args: &CatalogArgs) -> Result<Vec<TrackAnalysis>> {
    let display_path = args.catalog.absolutize()?.into_owned();
    info!("Analyzing catalog {}", display_path.display());

    let catalog = JsonCatalog::load(&args.catalog)?;
    if catalog.is_empty() {
        bail!("Catalog {} contains no tracks", display_path.display());
    }
    let mut analyzer = args.seed.map_or_else(TrackAnalyzer::new, TrackAnalyzer::with_seed);
    Ok(analyzer.analyze_tracks(catalog.tracks(), &catalog))
}

/// Seeded components each get their own stream derived from the user seed.
fn derived_seed(seed: Option<u64>, stream: u64) -> Option<u64> {
    seed.map(|s| s.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(stream))
}

fn curate(
    tracks: &[TrackAnalysis],
    mood: Mood,
    max_tracks: usize,
    optimize: bool,
    seed: Option<u64>,
    config: &MixConfig,
) -> (Vec<TrackAnalysis>, TransitionPlanner) {
    let mut curator = derived_seed(seed, 1).map_or_else(
        || PlaylistCurator::new(config),
        |s| PlaylistCurator::with_seed(config, s),
    );
    let mut planner = derived_seed(seed, 2).map_or_else(
        || TransitionPlanner::new(mood, config),
        |s| TransitionPlanner::with_seed(mood, config, s),
    );

    let selection = curator.create_mood_playlist(tracks, mood, max_tracks);
    let playlist = if optimize {
        curator.optimize_track_order(selection, &mut planner)
    } else {
        selection
    };
    (playlist, planner)
}

fn find_track<'a>(tracks: &'a [TrackAnalysis], id: &str) -> Result<&'a TrackAnalysis> {
    tracks
        .iter()
        .find(|t| t.id == id)
        .with_context(|| format!("Track '{id}' is not in the catalog"))
}

fn print_transition(transition: &Transition) {
    println!(
        "    ↳ {} {:>4.1}s  key {:.2}  rate {:.3}  from {:.1}s",
        transition.transition_type,
        transition.duration.as_secs_f64(),
        transition.key_compatibility,
        transition.tempo_adjustment,
        transition.fade_out_start.as_secs_f64()
    );
}

fn print_track_change(now: Duration, event: &TransitionComplete) {
    let how = event.transition_type.map_or("cut", |t| t.as_str());
    println!("[{:>7.1}s] {:<12} {} - {}", now.as_secs_f64(), how, event.artist, event.track_name);
}

fn run_analyze(args: &CatalogArgs, stats: bool, json: bool) -> Result<()> {
    let tracks = analyze_catalog(args)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tracks)?);
        return Ok(());
    }

    println!("{:<32} {:>6} {:>6} {:>6} {:>6} {:>6}  dominant", "track", "chill", "cafe", "study", "party", "mix");
    for track in &tracks {
        let s = &track.mood_score;
        println!(
            "{:<32} {:>6.3} {:>6.3} {:>6.3} {:>6.3} {:>6.3}  {}",
            track.to_string(),
            s.chill,
            s.cafe,
            s.study,
            s.party,
            track.mixing_compatibility,
            s.dominant()
        );
    }

    if stats {
        println!();
        for mood in Mood::ALL {
            if let Some(st) = statistics::analyze_score_distribution(&tracks, mood) {
                println!(
                    "{:<6} mean {:.3}  sd {:.3}  min {:.3}  max {:.3}  (n={})",
                    st.mood, st.mean, st.std_deviation, st.min, st.max, st.count
                );
            }
        }
    }
    Ok(())
}

fn run_playlist(
    args: &CatalogArgs,
    mood: Mood,
    max_tracks: usize,
    optimize: bool,
    json: bool,
    config: &MixConfig,
) -> Result<()> {
    let tracks = analyze_catalog(args)?;
    let (playlist, planner) = curate(&tracks, mood, max_tracks, optimize, args.seed, config);
    let transitions = planner.plan_playlist(&playlist);

    if json {
        let report = PlaylistReport { mood, tracks: &playlist, transitions: &transitions };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{mood} playlist ({} of {} tracks)", playlist.len(), tracks.len());
    for (i, track) in playlist.iter().enumerate() {
        println!(
            "{:>3}. {}  [{:.0} BPM, energy {:.2}, score {:.3}]",
            i + 1,
            track,
            track.tempo(),
            track.energy(),
            track.score_for(mood)
        );
        if let Some(transition) = transitions.get(i) {
            print_transition(transition);
        }
    }
    Ok(())
}

fn run_transition(args: &CatalogArgs, from: &str, to: &str, json: bool, config: &MixConfig) -> Result<()> {
    let tracks = analyze_catalog(args)?;
    let from = find_track(&tracks, from)?;
    let to = find_track(&tracks, to)?;

    let planner = TransitionPlanner::new(from.mood_score.dominant(), config);
    let transition = planner.calculate_transition(from, to);
    if json {
        println!("{}", serde_json::to_string_pretty(&transition)?);
    } else {
        println!("{from} -> {to}");
        print_transition(&transition);
    }
    Ok(())
}

fn run_simulate(
    args: &CatalogArgs,
    mood: Mood,
    max_tracks: usize,
    track_length: u64,
    step_ms: u64,
    config: MixConfig,
) -> Result<()> {
    if step_ms == 0 {
        bail!("--step-ms must be at least 1");
    }
    let tracks = analyze_catalog(args)?;
    let (playlist, planner) = curate(&tracks, mood, max_tracks, true, args.seed, &config);

    let engine = SimulatedEngine::with_random_spectrum(derived_seed(args.seed, 3).unwrap_or_else(rand::random));
    let track_length = Duration::from_secs(track_length);
    let transport = SimulatedTransport::new(track_length);
    let mut session = MixSession::with_planner(config, planner, engine, transport);
    let events = session.subscribe();

    let step = Duration::from_millis(step_ms);
    // Every track plays at most once; leave a little slack for the last frame.
    let limit = track_length * u32::try_from(playlist.len() + 1)?;
    let mut now = Duration::ZERO;
    session.start(playlist, now)?;

    while session.state() == SessionState::Playing && now < limit {
        now += step;
        session.transport_mut().advance(step);
        session.tick(now)?;
        for event in events.try_iter() {
            print_track_change(now, &event);
        }
    }

    let fx = session.effects().current();
    debug!("Final effects state: {fx:?}");
    println!(
        "Session ended after {:.1}s: filter {:.0} Hz, gain {:.2}, ratio {:.1}",
        now.as_secs_f64(),
        fx.filter_frequency,
        fx.gain,
        fx.compression_ratio
    );
    session.stop();
    Ok(())
}

fn run_config(action: ConfigAction, explicit: Option<PathBuf>) -> Result<()> {
    let path = config_path(explicit)?;
    match action {
        ConfigAction::Show => {
            let config = MixConfig::load_or_default(&path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("Config file already exists at {} (use --force to overwrite)", path.display());
            }
            MixConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", display(&path));
        }
        ConfigAction::Path => println!("{}", display(&path)),
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.absolutize()
        .map_or_else(|_| path.display().to_string(), |p| p.display().to_string())
}

/// Main entry point for Cadence.
///
/// Initializes logging, parses command-line arguments, and routes commands.
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug cadence playlist tracks.json` - Enable debug logging
/// - `RUST_LOG=cadence::effects=trace cadence simulate tracks.json` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Analyze { catalog, stats, json } => run_analyze(&catalog, stats, json)?,
        cli::Command::Playlist { catalog, mood, max_tracks, no_optimize, json } => {
            let config = load_config(args.config)?;
            run_playlist(&catalog, mood, max_tracks, !no_optimize, json, &config)?;
        }
        cli::Command::Transition { catalog, from, to, json } => {
            let config = load_config(args.config)?;
            run_transition(&catalog, &from, &to, json, &config)?;
        }
        cli::Command::Simulate { catalog, mood, max_tracks, track_length, step_ms } => {
            let config = load_config(args.config)?;
            run_simulate(&catalog, mood, max_tracks, track_length, step_ms, config)?;
        }
        cli::Command::Config { action } => run_config(action, args.config)?,
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
        cli::Command::CompletionEnhanced { shell } => {
            completion::write_enhanced_completion(shell, &mut std::io::stdout())?;
        }
    }

    Ok(())
}
