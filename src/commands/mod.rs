//! Application command handlers for wavescope.
//!
//! # Commands
//! - `play`: Play a WAV file with live spectrum and waveform visualization
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio output devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod play;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use play::{handle_play, PlayOptions};
