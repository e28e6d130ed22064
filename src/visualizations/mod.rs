//! Visualization modules for playback display.
//!
//! Each module turns one stream of data from the core into column heights (0-100)
//! that the terminal UI draws as sparklines. Views never feed back into the core.

pub mod spectrum;
pub mod waveform;

pub use spectrum::SpectrumView;
pub use waveform::WaveformView;
