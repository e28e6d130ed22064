//! Configuration management for wavescope.
//!
//! This module handles loading and saving application configuration from a TOML file
//! in the user's config directory. Command-line flags are applied on top of the
//! loaded values by the command that uses them.

pub mod file;

pub use file::{get_config_path, DisplayConfig, VisualizerConfig};
