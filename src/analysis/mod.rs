//! Spectral analysis of the playing waveform.

pub mod spectrum;

pub use spectrum::SpectralAnalyzer;
