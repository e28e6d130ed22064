//! Playback for wavescope.
//!
//! Provides the decoded waveform, audio output, the wall-clock playback position and
//! the refresh cadence that drives the views.

pub mod cadence;
pub mod clock;
pub mod player;
pub mod waveform;

pub use cadence::RenderCadence;
pub use clock::PlaybackClock;
pub use player::AudioPlayer;
pub use waveform::Waveform;
