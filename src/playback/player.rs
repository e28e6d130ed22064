//! Audio output through cpal.
//!
//! The output callback pulls interleaved samples from a [`SampleSource`] on the audio
//! thread. The frame loop only shares the immutable source, an atomic read cursor and
//! the pause flag with it.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::waveform::SampleSource;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Streams a sample source to an output device.
///
/// Features:
/// - Plays on a specified output device or the system default
/// - Maps the source channels onto however many channels the device has
/// - Pause, resume and restart without rebuilding the stream
pub struct AudioPlayer {
    source: Arc<dyn SampleSource>,
    /// Interleaved offset of the next sample the callback will read
    cursor: Arc<AtomicUsize>,
    /// Whether playback is currently paused
    is_paused: Arc<Mutex<bool>>,
    /// Active audio output stream (kept alive during playback)
    stream: Option<cpal::Stream>,
    /// Device name or "default" to use the system default device
    device_name: String,
}

impl AudioPlayer {
    /// Creates a player for `source` on the given device.
    ///
    /// # Arguments
    /// * `source` - Samples to play
    /// * `device_name` - Device name/ID to use. Use "default" for system default device
    pub fn new(source: Arc<dyn SampleSource>, device_name: String) -> Self {
        Self {
            source,
            cursor: Arc::new(AtomicUsize::new(0)),
            is_paused: Arc::new(Mutex::new(false)),
            stream: None,
            device_name,
        }
    }

    /// Opens the output device and starts playback from the beginning.
    ///
    /// The stream runs at the source's sample rate; no resampling is performed.
    ///
    /// # Errors
    /// - If the specified device is not available
    /// - If the device's sample format is not supported
    /// - If audio stream creation fails
    pub fn start_playback(&mut self) -> Result<()> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();

            if self.device_name == "default" {
                host.default_output_device()
                    .ok_or_else(|| anyhow!("No audio output device available"))
            } else {
                find_device_by_name(&host, &self.device_name)
            }
        })?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Playback device: {}", device_name);

        let device_config = device.default_output_config()?;
        let sample_format = device_config.sample_format();
        let device_sample_rate = device_config.sample_rate().0;

        if device_sample_rate != self.source.sample_rate() {
            tracing::warn!(
                "Device prefers {}Hz but audio is {}Hz. Requesting the audio rate.",
                device_sample_rate,
                self.source.sample_rate()
            );
        }

        let stream_config = cpal::StreamConfig {
            channels: device_config.channels(),
            sample_rate: cpal::SampleRate(self.source.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        tracing::debug!(
            "Output configuration: {}Hz, {} channels, {:?}",
            stream_config.sample_rate.0,
            stream_config.channels,
            sample_format
        );

        self.cursor.store(0, Ordering::Relaxed);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(&device, &stream_config)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&device, &stream_config)?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(&device, &stream_config)?,
            cpal::SampleFormat::I32 => self.build_stream::<i32>(&device, &stream_config)?,
            other => return Err(anyhow!("Unsupported output sample format: {other:?}")),
        };

        stream.play()?;
        self.stream = Some(stream);

        tracing::debug!("Audio stream started");
        Ok(())
    }

    fn build_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<i16>,
    {
        let source = Arc::clone(&self.source);
        let cursor = Arc::clone(&self.cursor);
        let pause_arc = Arc::clone(&self.is_paused);
        let output_channels = config.channels as usize;
        let mut scratch: Vec<i16> = Vec::new();

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let is_paused = pause_arc.lock().map_or(true, |paused| *paused);
                if is_paused {
                    data.fill(T::EQUILIBRIUM);
                    return;
                }
                Self::handle_audio_callback(
                    data,
                    source.as_ref(),
                    &cursor,
                    &mut scratch,
                    output_channels,
                );
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }

    /// Fills one device buffer from the source and advances the cursor.
    ///
    /// Source channels are mapped onto device channels by index; surplus device
    /// channels repeat the last source channel.
    fn handle_audio_callback<T>(
        data: &mut [T],
        source: &dyn SampleSource,
        cursor: &AtomicUsize,
        scratch: &mut Vec<i16>,
        output_channels: usize,
    ) where
        T: Sample + FromSample<i16>,
    {
        let source_channels = source.channels() as usize;
        let frames = data.len() / output_channels;
        let wanted = frames * source_channels;

        scratch.resize(wanted, 0);
        let offset = cursor.fetch_add(wanted, Ordering::Relaxed);
        source.read_samples(offset, scratch);

        for (frame_index, frame) in data.chunks_mut(output_channels).enumerate() {
            let base = frame_index * source_channels;
            for (channel, sample) in frame.iter_mut().enumerate() {
                let source_channel = channel.min(source_channels - 1);
                *sample = T::from_sample(scratch[base + source_channel]);
            }
        }
    }

    /// Stops the output stream.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Audio stream stopped");
        }
    }

    /// Rewinds playback to the first sample.
    pub fn restart(&self) {
        self.cursor.store(0, Ordering::Relaxed);
        tracing::debug!("Playback restarted");
    }

    /// Returns the coarse position of the device read cursor.
    ///
    /// This is a UI signal only; the visualization follows the wall clock.
    pub fn playing_offset(&self) -> Duration {
        let channels = self.source.channels() as usize;
        let consumed = self
            .cursor
            .load(Ordering::Relaxed)
            .min(self.source.sample_count());
        Duration::from_secs_f64((consumed / channels) as f64 / self.source.sample_rate() as f64)
    }

    /// Returns whether the device has consumed every sample.
    pub fn is_finished(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) >= self.source.sample_count()
    }

    /// Returns whether playback is currently paused.
    pub fn is_paused(&self) -> bool {
        self.is_paused.lock().map_or(false, |paused| *paused)
    }

    /// Toggles between paused and playing states.
    pub fn toggle_pause(&self) {
        if let Ok(mut paused) = self.is_paused.lock() {
            *paused = !*paused;
            if *paused {
                tracing::debug!("Playback paused");
            } else {
                tracing::debug!("Playback resumed");
            }
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Finds an audio output device by name or numeric index.
///
/// # Arguments
/// * `host` - The cpal audio host
/// * `device_spec` - Either a device name or a numeric index (0, 1, 2, etc.)
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    if let Ok(index) = device_spec.parse::<usize>() {
        let mut devices: Vec<_> = host
            .output_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();

        let count = devices.len();
        if index < count {
            return Ok(devices.swap_remove(index));
        }
        return Err(anyhow!(
            "Device index {} is out of range (0-{})",
            index,
            count.saturating_sub(1)
        ));
    }

    let devices = host
        .output_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio output device '{device_spec}' not found. Use 'wavescope list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}
