//! Frequency spectrum of a rolling window of the waveform.
//!
//! Each channel's window is read at a stride equal to the channel count, transformed
//! with a forward FFT, and the per-bin magnitudes of all channels are summed and
//! scaled by `1 / window_length`. Reads outside the waveform contribute silence.

use rustfft::{num_complex::Complex, FftPlanner};
use std::collections::TryReserveError;
use thiserror::Error;

use crate::playback::Waveform;

/// Window length used when none is configured.
pub const DEFAULT_WINDOW_LENGTH: usize = 16384;

/// Errors raised at the analyzer boundary.
#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("analysis window length must be positive")]
    InvalidWindowLength,

    #[error("failed to allocate transform buffers for a {window_length}-sample window")]
    Allocation {
        window_length: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Stateful analyzer holding the session's FFT planner and working buffers.
///
/// The planner caches transform plans by length, so the plan for the session's window
/// length is built once. Working buffers are overwritten on every call; no result
/// depends on an earlier call.
pub struct SpectralAnalyzer {
    planner: FftPlanner<f64>,
    workspace: Workspace,
    window_length: usize,
}

impl SpectralAnalyzer {
    /// Creates an analyzer for a fixed window length.
    ///
    /// # Errors
    /// - If `window_length` is zero
    pub fn new(window_length: usize) -> Result<Self, SpectrumError> {
        if window_length == 0 {
            return Err(SpectrumError::InvalidWindowLength);
        }
        if !window_length.is_power_of_two() {
            tracing::warn!(
                "Window length {} is not a power of two; transforms will be slower",
                window_length
            );
        }

        let mut planner = FftPlanner::new();
        planner.plan_fft_forward(window_length);

        Ok(Self {
            planner,
            workspace: Workspace::default(),
            window_length,
        })
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    /// Returns the amplitude curve for the window starting at raw sample `position`.
    ///
    /// # Errors
    /// - If the working buffers cannot be allocated
    pub fn analyze(&mut self, position: i64, waveform: &Waveform) -> Result<Vec<f32>, SpectrumError> {
        compute_amplitudes(
            position,
            self.window_length,
            waveform,
            &mut self.planner,
            &mut self.workspace,
        )
    }
}

/// Width of one frequency bin in Hz.
pub fn bin_width_hz(sample_rate: u32, window_length: usize) -> f64 {
    sample_rate as f64 / window_length as f64
}

/// Index of the bin closest to `frequency_hz`.
pub fn bin_for_frequency(frequency_hz: f64, sample_rate: u32, window_length: usize) -> usize {
    (frequency_hz.max(0.0) / bin_width_hz(sample_rate, window_length)).round() as usize
}

/// Per-channel windows plus FFT scratch space.
#[derive(Default)]
struct Workspace {
    channels: Vec<Vec<Complex<f64>>>,
    scratch: Vec<Complex<f64>>,
    sums: Vec<f64>,
}

impl Workspace {
    fn prepare(
        &mut self,
        channel_count: usize,
        window_length: usize,
        scratch_length: usize,
    ) -> Result<(), SpectrumError> {
        let zero = Complex::new(0.0, 0.0);
        let allocation = |source| SpectrumError::Allocation {
            window_length,
            source,
        };

        self.channels.resize_with(channel_count, Vec::new);
        for buffer in &mut self.channels {
            buffer.clear();
            buffer.try_reserve_exact(window_length).map_err(allocation)?;
            buffer.resize(window_length, zero);
        }

        self.scratch.clear();
        self.scratch.try_reserve_exact(scratch_length).map_err(allocation)?;
        self.scratch.resize(scratch_length, zero);

        let half = window_length / 2;
        self.sums.clear();
        self.sums.try_reserve_exact(half).map_err(allocation)?;
        self.sums.resize(half, 0.0);

        Ok(())
    }
}

fn compute_amplitudes(
    position: i64,
    window_length: usize,
    waveform: &Waveform,
    planner: &mut FftPlanner<f64>,
    workspace: &mut Workspace,
) -> Result<Vec<f32>, SpectrumError> {
    if window_length == 0 {
        return Err(SpectrumError::InvalidWindowLength);
    }

    let stride = waveform.channels() as usize;
    let fft = planner.plan_fft_forward(window_length);
    workspace.prepare(stride, window_length, fft.get_inplace_scratch_len())?;

    let half = window_length / 2;
    let Workspace {
        channels,
        scratch,
        sums,
    } = workspace;

    for (channel, buffer) in channels.iter_mut().enumerate() {
        fill_window(buffer, position, channel, stride, waveform.samples());
        fft.process_with_scratch(buffer, scratch);

        for (sum, coefficient) in sums.iter_mut().zip(&buffer[..half]) {
            *sum += coefficient.norm();
        }
    }

    let mut amplitudes = Vec::new();
    amplitudes
        .try_reserve_exact(half)
        .map_err(|source| SpectrumError::Allocation {
            window_length,
            source,
        })?;

    let scale = 1.0 / window_length as f64;
    amplitudes.extend(sums.iter().map(|sum| (sum * scale) as f32));
    Ok(amplitudes)
}

/// Copies one channel's window, substituting silence outside the signal.
///
/// A negative start position silences the whole window.
fn fill_window(
    buffer: &mut [Complex<f64>],
    position: i64,
    channel: usize,
    stride: usize,
    samples: &[i16],
) {
    for (i, slot) in buffer.iter_mut().enumerate() {
        let value = if position < 0 {
            0.0
        } else {
            i64::try_from(stride * i + channel)
                .ok()
                .and_then(|offset| position.checked_add(offset))
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|index| samples.get(index))
                .map_or(0.0, |&sample| f64::from(sample))
        };
        *slot = Complex::new(value, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackClock;
    use std::f64::consts::PI;
    use std::time::{Duration, Instant};

    /// Stereo waveform holding `amplitude * sin(2πft)` on both channels for frames in
    /// `[start_frame, end_frame)`, silence elsewhere.
    fn stereo_tone(
        sample_rate: u32,
        total_frames: usize,
        frequency_hz: f64,
        amplitude: f64,
        start_frame: usize,
        end_frame: usize,
    ) -> Waveform {
        let mut samples = Vec::with_capacity(total_frames * 2);
        for frame in 0..total_frames {
            let value = if (start_frame..end_frame).contains(&frame) {
                (amplitude * (2.0 * PI * frequency_hz * frame as f64 / sample_rate as f64).sin())
                    .round() as i16
            } else {
                0
            };
            samples.push(value);
            samples.push(value);
        }
        Waveform::from_interleaved(samples, sample_rate, 2).unwrap()
    }

    fn peak_bin(amplitudes: &[f32]) -> usize {
        amplitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap()
    }

    #[test]
    fn test_zero_window_length_rejected() {
        let waveform = stereo_tone(8000, 64, 1000.0, 1000.0, 0, 64);
        let mut planner = FftPlanner::new();

        assert!(matches!(
            SpectralAnalyzer::new(0),
            Err(SpectrumError::InvalidWindowLength)
        ));
        assert!(matches!(
            compute_amplitudes(0, 0, &waveform, &mut planner, &mut Workspace::default()),
            Err(SpectrumError::InvalidWindowLength)
        ));
    }

    #[test]
    fn test_output_is_half_window_and_non_negative() {
        let waveform = stereo_tone(44100, 20000, 440.0, 12000.0, 0, 20000);

        for window_length in [2usize, 64, 1024, 4096, 16384] {
            let mut analyzer = SpectralAnalyzer::new(window_length).unwrap();
            let amplitudes = analyzer.analyze(1000, &waveform).unwrap();
            assert_eq!(amplitudes.len(), window_length / 2);
            assert!(amplitudes.iter().all(|a| *a >= 0.0 && a.is_finite()));
        }
    }

    #[test]
    fn test_window_past_end_is_silent() {
        let waveform = stereo_tone(44100, 4096, 440.0, 12000.0, 0, 4096);
        let mut analyzer = SpectralAnalyzer::new(1024).unwrap();

        let at_end = analyzer.analyze(waveform.sample_count() as i64, &waveform).unwrap();
        assert!(at_end.iter().all(|a| *a == 0.0));

        let far_past = analyzer.analyze(i64::MAX - 10, &waveform).unwrap();
        assert!(far_past.iter().all(|a| *a == 0.0));
    }

    #[test]
    fn test_negative_position_is_silent() {
        let waveform = stereo_tone(44100, 4096, 440.0, 12000.0, 0, 4096);
        let mut analyzer = SpectralAnalyzer::new(1024).unwrap();

        for position in [-1i64, -100, -(2 * 1024), i64::MIN] {
            let amplitudes = analyzer.analyze(position, &waveform).unwrap();
            assert_eq!(amplitudes.len(), 512);
            assert!(amplitudes.iter().all(|a| *a == 0.0));
        }
    }

    #[test]
    fn test_partial_window_is_zero_padded() {
        let samples: Vec<i16> = vec![1000, 1000, 1000, 1000];
        let waveform = Waveform::from_interleaved(samples, 8000, 2).unwrap();
        let mut analyzer = SpectralAnalyzer::new(8).unwrap();

        // Two frames of DC at 1000 on both channels, six frames of silence.
        let amplitudes = analyzer.analyze(0, &waveform).unwrap();
        assert_eq!(amplitudes.len(), 4);
        approx::assert_relative_eq!(amplitudes[0], 500.0, epsilon = 1e-3);
    }

    #[test]
    fn test_sinusoid_peaks_at_its_bin() {
        let sample_rate = 44100;
        let window_length = 4096;
        let target_bin = 100;
        let frequency = target_bin as f64 * sample_rate as f64 / window_length as f64;
        let amplitude = 8000.0;
        let waveform = stereo_tone(sample_rate, window_length, frequency, amplitude, 0, window_length);

        let mut analyzer = SpectralAnalyzer::new(window_length).unwrap();
        let amplitudes = analyzer.analyze(0, &waveform).unwrap();

        assert_eq!(peak_bin(&amplitudes), target_bin);
        assert_eq!(
            bin_for_frequency(frequency, sample_rate, window_length),
            target_bin
        );
        // Each channel contributes amplitude / 2 at the tone's bin.
        approx::assert_relative_eq!(amplitudes[target_bin], amplitude as f32, max_relative = 1e-3);

        // Quantization to i16 bounds every other bin by 0.5 per channel.
        for (bin, value) in amplitudes.iter().enumerate() {
            if bin != target_bin {
                assert!(*value < 1.0, "bin {bin} too large: {value}");
            }
        }
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let waveform = stereo_tone(44100, 10000, 1234.5, 9000.0, 2000, 9000);
        let mut analyzer = SpectralAnalyzer::new(2048).unwrap();

        let first = analyzer.analyze(3000, &waveform).unwrap();
        let _other = analyzer.analyze(-5, &waveform).unwrap();
        let second = analyzer.analyze(3000, &waveform).unwrap();
        let fresh = SpectralAnalyzer::new(2048)
            .unwrap()
            .analyze(3000, &waveform)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, fresh);
    }

    #[test]
    fn test_mono_reads_at_stride_one() {
        let mono = Waveform::from_interleaved(vec![500; 64], 8000, 1).unwrap();
        let mut analyzer = SpectralAnalyzer::new(64).unwrap();

        let amplitudes = analyzer.analyze(0, &mono).unwrap();
        approx::assert_relative_eq!(amplitudes[0], 500.0, epsilon = 1e-3);
        assert!(amplitudes[1..].iter().all(|a| *a < 1e-6));
    }

    #[test]
    fn test_tone_found_at_playback_position() {
        let sample_rate = 44100;
        let window_length = 16384;
        let waveform = stereo_tone(
            sample_rate,
            2 * sample_rate as usize,
            1000.0,
            10000.0,
            sample_rate as usize / 2,
            sample_rate as usize,
        );

        let t0 = Instant::now();
        let clock = PlaybackClock::start_at(t0);
        let position = clock.sample_position_at(t0 + Duration::from_millis(750), sample_rate, 2.0);
        assert_eq!(position, 66150);

        let mut analyzer = SpectralAnalyzer::new(window_length).unwrap();
        let amplitudes = analyzer.analyze(position, &waveform).unwrap();

        let expected = (1000.0f64 * window_length as f64 / sample_rate as f64).round() as usize;
        assert_eq!(expected, 372);
        assert!(peak_bin(&amplitudes).abs_diff(expected) <= 1);
    }

    #[test]
    fn test_bin_helpers() {
        approx::assert_relative_eq!(bin_width_hz(44100, 16384), 2.691650390625);
        assert_eq!(bin_for_frequency(0.0, 44100, 16384), 0);
        assert_eq!(bin_for_frequency(-10.0, 44100, 16384), 0);
        assert_eq!(bin_for_frequency(22050.0, 44100, 16384), 8192);
    }
}
