//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands::{self, PlayOptions};
use crate::logging;
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// A terminal audio player with a scrolling waveform and a live frequency spectrum
#[derive(Parser)]
#[command(name = "wavescope")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "A terminal audio player with a scrolling waveform and a live frequency spectrum.\n\nDEFAULT COMMAND:\n    If no command is specified, 'play' is used by default.\n\nKEYS:\n    Space      pause/resume\n    r          restart from the beginning\n    q, Esc     quit\n\nEXAMPLES:\n    # Play a file with the configured settings\n    $ wavescope song.wav\n\n    # Use a smaller analysis window on output device 2\n    $ wavescope play song.wav --window-length 4096 --device 2\n\n    # Edit configuration file\n    $ wavescope config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/wavescope/wavescope.toml\n    Logs:               ~/.local/state/wavescope/wavescope.log.*"
)]
struct Cli {
    #[command(flatten)]
    play: PlayArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct PlayArgs {
    /// WAV file to play
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Output device name or ID from 'wavescope list-devices'
    #[arg(short, long)]
    device: Option<String>,

    /// Samples per channel in each spectrum window
    #[arg(short, long, value_name = "N")]
    window_length: Option<usize>,

    /// Raw samples the spectrum window advances per elapsed frame
    #[arg(short, long, value_name = "FACTOR")]
    multiplier: Option<f64>,

    /// Frames drawn across the waveform view
    #[arg(short, long, value_name = "N")]
    samples_per_frame: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a WAV file with spectrum and waveform visualization (default)
    ///
    /// Press Space to pause/resume, 'r' to restart, Escape/q to quit.
    #[command(visible_alias = "p")]
    Play(PlayArgs),

    /// Open configuration file in your preferred editor
    ///
    /// Creates the file with default values if it does not exist yet.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio output devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct output device in wavescope.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   wavescope completions bash > wavescope.bash
    ///   wavescope completions zsh > _wavescope
    ///   wavescope completions fish > wavescope.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl PlayArgs {
    fn into_options(self) -> PlayOptions {
        let file = match self.file {
            Some(file) => file,
            None => Cli::command()
                .error(
                    ErrorKind::MissingRequiredArgument,
                    "a WAV file to play is required: wavescope <FILE>",
                )
                .exit(),
        };
        PlayOptions {
            file,
            device: self.device,
            window_length: self.window_length,
            multiplier: self.multiplier,
            samples_per_frame: self.samples_per_frame,
        }
    }
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "wavescope", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return commands::handle_list_devices(),
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None => commands::handle_play(cli.play.into_options()),
        Some(Commands::Play(args)) => commands::handle_play(args.into_options()),
        Some(Commands::Config) => commands::handle_config(),
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }
}
