//! In-memory decoded waveform.
//!
//! The waveform is loaded once from a WAV file and then shared read-only between the
//! frame loop (views and spectral analysis) and the audio output callback.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::time::Duration;

/// Highest channel count the visualizer accepts.
pub const MAX_CHANNELS: u16 = 2;

/// Pull-based access to interleaved samples, consumed by the audio output stream.
pub trait SampleSource: Send + Sync {
    /// Sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels.
    fn channels(&self) -> u16;

    /// Total number of interleaved samples.
    fn sample_count(&self) -> usize;

    /// Copies interleaved samples starting at `offset` into `out`.
    ///
    /// Positions past the end are filled with silence. Returns how many samples were
    /// actually taken from the source.
    fn read_samples(&self, offset: usize, out: &mut [i16]) -> usize;
}

/// Immutable interleaved signal with its sample rate and channel count.
#[derive(Debug, Clone)]
pub struct Waveform {
    /// Interleaved i16 PCM samples
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl Waveform {
    /// Builds a waveform from interleaved samples.
    ///
    /// A trailing partial frame is dropped so every channel has the same length.
    ///
    /// # Errors
    /// - If the channel count is zero or above [`MAX_CHANNELS`]
    /// - If the sample rate is zero
    pub fn from_interleaved(mut samples: Vec<i16>, sample_rate: u32, channels: u16) -> Result<Self> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(anyhow!(
                "Unsupported channel count {channels}: only mono and stereo audio can be visualized"
            ));
        }
        if sample_rate == 0 {
            return Err(anyhow!("Sample rate must be positive"));
        }

        let remainder = samples.len() % channels as usize;
        if remainder != 0 {
            tracing::warn!("Dropping {} trailing samples of an incomplete frame", remainder);
            samples.truncate(samples.len() - remainder);
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Decodes a WAV file into memory.
    ///
    /// Integer formats are rescaled to the 16-bit range, 32-bit float samples are
    /// scaled from [-1.0, 1.0].
    ///
    /// # Errors
    /// - If the file cannot be opened or is not a valid WAV file
    /// - If the sample format is not supported
    /// - If the file has more than two channels
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        let spec = reader.spec();

        tracing::debug!(
            "WAV spec: {}Hz, {} channels, {} bits, {:?}",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        );

        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, bits @ 1..=32) => reader
                .samples::<i32>()
                .map(|s| s.map(|v| rescale_int(v, bits)))
                .collect::<Result<_, _>>()
                .context("Failed to decode PCM samples")?,
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<Result<_, _>>()
                .context("Failed to decode float samples")?,
            (format, bits) => {
                return Err(anyhow!("Unsupported WAV sample format: {bits}-bit {format:?}"));
            }
        };

        let waveform = Self::from_interleaved(samples, spec.sample_rate, spec.channels)?;

        tracing::info!(
            "Loaded {}: {} samples, {}Hz, {} channels, {:.1}s",
            path.display(),
            waveform.sample_count(),
            waveform.sample_rate,
            waveform.channels,
            waveform.duration().as_secs_f32()
        );

        Ok(waveform)
    }

    /// Returns all interleaved samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the total number of interleaved samples.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Returns the number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Returns the playback length.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Returns the sample at an interleaved index, or silence outside the signal.
    pub fn sample_at(&self, index: i64) -> i16 {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.samples.get(i))
            .copied()
            .unwrap_or(0)
    }
}

impl SampleSource for Waveform {
    fn sample_rate(&self) -> u32 {
        Waveform::sample_rate(self)
    }

    fn channels(&self) -> u16 {
        Waveform::channels(self)
    }

    fn sample_count(&self) -> usize {
        Waveform::sample_count(self)
    }

    fn read_samples(&self, offset: usize, out: &mut [i16]) -> usize {
        let available = self.samples.get(offset..).unwrap_or(&[]);
        let copied = available.len().min(out.len());
        out[..copied].copy_from_slice(&available[..copied]);
        out[copied..].fill(0);
        copied
    }
}

/// Moves an integer sample of `bits` width into the i16 range.
fn rescale_int(value: i32, bits: u16) -> i16 {
    if bits >= 16 {
        (value >> (bits - 16)) as i16
    } else {
        (value << (16 - bits)) as i16
    }
}
