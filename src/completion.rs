//! # Shell Completion Module
//!
//! This module provides shell completion for Cadence:
//! - Generation of completion scripts for various shells through clap
//! - Enhanced bash and fish scripts that also complete mood names
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! cadence completion bash > ~/.local/share/bash-completion/completions/cadence
//!
//! # Generate fish completions with mood names
//! cadence completion-enhanced fish > ~/.config/fish/completions/cadence.fish
//! ```

use crate::cli::Shell;
use crate::mood::Mood;
use anyhow::{bail, Result};
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

fn mood_words() -> String {
    Mood::ALL.map(Mood::as_str).join(" ")
}

/// Write the enhanced completion script for `shell` to `out`.
///
/// # Errors
///
/// Fails for shells without an enhanced script, or when `out` cannot be
/// written.
pub fn write_enhanced_completion(shell: Shell, out: &mut impl Write) -> Result<()> {
    let script = match shell {
        Shell::Bash => enhanced_bash_completion(),
        Shell::Fish => enhanced_fish_completion(),
        other => bail!("Enhanced completions only supported for bash and fish, not {other:?}"),
    };
    out.write_all(script.as_bytes())?;
    Ok(())
}

/// Enhanced fish completion script.
#[must_use]
pub fn enhanced_fish_completion() -> String {
    let mut script = String::from(
        r"# Enhanced Cadence completion script for Fish shell
# Install with: cadence completion-enhanced fish > ~/.config/fish/completions/cadence.fish

# Clear existing completions to avoid conflicts
complete -c cadence -e

# Global options
complete -c cadence -s h -l help -d 'Print help information'
complete -c cadence -s V -l version -d 'Print version information'
complete -c cadence -l config -r -F -d 'Configuration file to use'

# Main commands
complete -c cadence -f -n '__fish_is_first_token' -a 'analyze' -d 'Score every catalog track against all moods'
complete -c cadence -f -n '__fish_is_first_token' -a 'playlist' -d 'Curate a playlist for a mood'
complete -c cadence -f -n '__fish_is_first_token' -a 'transition' -d 'Show how one track would blend into another'
complete -c cadence -f -n '__fish_is_first_token' -a 'simulate' -d 'Dry-run a mix session'
complete -c cadence -f -n '__fish_is_first_token' -a 'config' -d 'Manage the configuration file'
complete -c cadence -f -n '__fish_is_first_token' -a 'completion' -d 'Generate shell completions'
complete -c cadence -f -n '__fish_is_first_token' -a 'completion-enhanced' -d 'Generate enhanced shell completions'

# Catalog commands take a JSON file
complete -c cadence -n '__fish_seen_subcommand_from analyze playlist transition simulate' -F
complete -c cadence -f -n '__fish_seen_subcommand_from analyze playlist transition simulate' -l seed -r -d 'Random seed'
complete -c cadence -f -n '__fish_seen_subcommand_from analyze' -l stats -d 'Print score distributions'
complete -c cadence -f -n '__fish_seen_subcommand_from analyze playlist transition' -l json -d 'Emit JSON'
complete -c cadence -f -n '__fish_seen_subcommand_from playlist' -l no-optimize -d 'Keep energy-curve order'
complete -c cadence -f -n '__fish_seen_subcommand_from playlist simulate' -s n -l max-tracks -r -d 'Maximum number of tracks'
complete -c cadence -f -n '__fish_seen_subcommand_from simulate' -l track-length -r -d 'Track length in seconds'
complete -c cadence -f -n '__fish_seen_subcommand_from simulate' -l step-ms -r -d 'Simulation step in milliseconds'

# config actions
complete -c cadence -f -n '__fish_seen_subcommand_from config' -a 'show' -d 'Print the effective configuration'
complete -c cadence -f -n '__fish_seen_subcommand_from config' -a 'init' -d 'Write a default configuration file'
complete -c cadence -f -n '__fish_seen_subcommand_from config' -a 'path' -d 'Print the configuration file location'

# completion commands
complete -c cadence -f -n '__fish_seen_subcommand_from completion' -a 'bash zsh fish power-shell elvish'
complete -c cadence -f -n '__fish_seen_subcommand_from completion-enhanced' -a 'bash fish'

# Moods
",
    );
    for mood in Mood::ALL {
        script.push_str(&format!(
            "complete -c cadence -f -n '__fish_seen_subcommand_from playlist simulate' -s m -l mood -a '{mood}' -d '{mood} mood'\n"
        ));
    }
    script
}

/// Enhanced bash completion script.
#[must_use]
pub fn enhanced_bash_completion() -> String {
    format!(
        r#"#!/bin/bash
# Enhanced Cadence completion script with mood completion
# Install with: cadence completion-enhanced bash > ~/.local/share/bash-completion/completions/cadence

_cadence() {{
    local cur prev words cword
    _init_completion || return

    case "${{prev}}" in
        --mood|-m)
            COMPREPLY=($(compgen -W "{moods}" -- "${{cur}}"))
            return 0
            ;;
        --config)
            _filedir
            return 0
            ;;
        completion)
            COMPREPLY=($(compgen -W "bash zsh fish power-shell elvish" -- "${{cur}}"))
            return 0
            ;;
        completion-enhanced)
            COMPREPLY=($(compgen -W "bash fish" -- "${{cur}}"))
            return 0
            ;;
        config)
            COMPREPLY=($(compgen -W "show init path" -- "${{cur}}"))
            return 0
            ;;
        --seed|--max-tracks|-n|--track-length|--step-ms)
            return 0
            ;;
    esac

    local subcommands="analyze playlist transition simulate config completion completion-enhanced help"

    if [[ $cword -eq 1 ]]; then
        COMPREPLY=($(compgen -W "$subcommands --config --help --version" -- "${{cur}}"))
    else
        case "${{words[1]}}" in
            analyze)
                COMPREPLY=($(compgen -W "--seed --stats --json --help" -- "${{cur}}"))
                ;;
            playlist)
                COMPREPLY=($(compgen -W "--mood --max-tracks --seed --no-optimize --json --help" -- "${{cur}}"))
                ;;
            transition)
                COMPREPLY=($(compgen -W "--seed --json --help" -- "${{cur}}"))
                ;;
            simulate)
                COMPREPLY=($(compgen -W "--mood --max-tracks --seed --track-length --step-ms --help" -- "${{cur}}"))
                ;;
            *)
                COMPREPLY=($(compgen -W "$subcommands" -- "${{cur}}"))
                ;;
        esac
        [[ "${{cur}}" != -* ]] && _filedir json
    fi
}} &&
complete -F _cadence cadence

# ex: filetype=sh
"#,
        moods = mood_words()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_conversion() {
        assert_eq!(shell_to_completion_shell(Shell::Bash), CompletionShell::Bash);
        assert_eq!(shell_to_completion_shell(Shell::PowerShell), CompletionShell::PowerShell);
    }

    #[test]
    fn test_enhanced_scripts_complete_moods() {
        let bash = enhanced_bash_completion();
        assert!(bash.contains("chill cafe study party"));
        assert!(bash.contains("complete -F _cadence cadence"));

        let fish = enhanced_fish_completion();
        for mood in Mood::ALL {
            assert!(fish.contains(&format!("-a '{mood}'")));
        }
    }

    #[test]
    fn test_enhanced_completion_rejects_other_shells() {
        let mut out = Vec::new();
        assert!(write_enhanced_completion(Shell::Zsh, &mut out).is_err());
        assert!(out.is_empty());
        write_enhanced_completion(Shell::Fish, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("# Enhanced Cadence"));
    }
}
