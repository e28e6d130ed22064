//! Terminal screens used by wavescope.

pub mod error;
pub mod tui;

pub use error::ErrorScreen;
pub use tui::{PlaybackCommand, PlaybackState, StatusLine, VisualizerTui};
