//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Cadence using Clap derive
//! macros. Every command works from a JSON track catalog (see
//! [`crate::catalog::JsonCatalog`]); tracks without a descriptor are given a
//! synthesized one.
//!
//! ## Commands
//!
//! - `analyze`: Score every catalog track against all moods
//! - `playlist`: Curate and order a playlist for a mood
//! - `transition`: Show how two tracks would be blended
//! - `simulate`: Dry-run a full mix against the in-memory engine
//! - `config`: Inspect or create the configuration file
//!
//! ## Examples
//!
//! ```bash
//! cadence analyze tracks.json --stats
//! cadence playlist tracks.json --mood party --max-tracks 12
//! cadence transition tracks.json intro-track closer-track
//! cadence simulate tracks.json --mood chill --track-length 90
//! ```

use crate::mood::Mood;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Cadence: mood-driven playlist curation and DJ-style transitions")]
#[command(version)]
pub struct Args {
    /// Configuration file to use instead of the platform default
    #[arg(long, global = true, env = "CADENCE_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by every command that reads a catalog.
#[derive(clap::Args, Debug, Clone)]
pub struct CatalogArgs {
    /// JSON catalog: an array of tracks, each optionally carrying `features`
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub catalog: PathBuf,

    /// Seed for descriptor synthesis and every random choice
    ///
    /// With the same seed and catalog every command produces the same output.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score every catalog track against all moods
    ///
    /// Prints each track's four mood scores, its dominant mood and its mixing
    /// compatibility.
    Analyze {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Also print the score distribution for each mood
        #[arg(long)]
        stats: bool,

        /// Emit the analyses as JSON
        #[arg(long)]
        json: bool,
    },

    /// Curate a playlist for a mood
    ///
    /// Selects tracks along the mood's energy curve, then reorders them so
    /// each step is a good transition. Prints the planned transition between
    /// each pair.
    Playlist {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Target mood: chill, cafe, study or party
        #[arg(short, long, default_value = "chill")]
        mood: Mood,

        /// Maximum number of tracks in the playlist
        #[arg(short = 'n', long, default_value = "20")]
        max_tracks: usize,

        /// Keep the energy-curve order instead of optimizing for transitions
        #[arg(long)]
        no_optimize: bool,

        /// Emit the playlist and its transitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how one track would blend into another
    Transition {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Id of the outgoing track
        from: String,

        /// Id of the incoming track
        to: String,

        /// Emit the transition as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dry-run a mix session against the in-memory engine
    ///
    /// Curates a playlist, then plays it through simulated decks, printing
    /// each track change and a summary of the effect parameters.
    Simulate {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Target mood: chill, cafe, study or party
        #[arg(short, long, default_value = "chill")]
        mood: Mood,

        /// Maximum number of tracks to play
        #[arg(short = 'n', long, default_value = "8")]
        max_tracks: usize,

        /// Simulated length of every track, in seconds
        #[arg(long, default_value = "90")]
        track_length: u64,

        /// Simulation step, in milliseconds
        #[arg(long, default_value = "50")]
        step_ms: u64,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    ///
    /// Usage: cadence completion bash > ~/.local/share/bash-completion/completions/cadence
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// Generate enhanced completion with mood completion
    ///
    /// Usage: cadence completion-enhanced fish > ~/.config/fish/completions/cadence.fish
    CompletionEnhanced {
        /// Shell to generate enhanced completions for (bash and fish supported)
        shell: Shell,
    },
}

/// Configuration file actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file location
    Path,
}
