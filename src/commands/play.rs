//! Audio playback with live spectrum and waveform visualization.
//!
//! Runs the frame loop: poll input, advance the render cadence and, for each view whose
//! refresh interval has elapsed, read the playback clock and rebuild that view. The wall
//! clock drives the visualization; the audio device's own cursor is only logged.

use anyhow::anyhow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analysis::spectrum::bin_width_hz;
use crate::analysis::SpectralAnalyzer;
use crate::config::VisualizerConfig;
use crate::playback::{AudioPlayer, PlaybackClock, RenderCadence, Waveform};
use crate::ui::{ErrorScreen, PlaybackCommand, PlaybackState, StatusLine, VisualizerTui};
use crate::visualizations::{SpectrumView, WaveformView};

/// Longest time the loop blocks waiting for a key press.
const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(5);

/// Rendered frames between drift log entries.
const DRIFT_LOG_INTERVAL: u64 = 60;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    pub file: PathBuf,
    pub device: Option<String>,
    pub window_length: Option<usize>,
    pub multiplier: Option<f64>,
    pub samples_per_frame: Option<usize>,
}

impl PlayOptions {
    /// Overwrites config values with any flags given on the command line.
    pub fn apply(&self, config: &mut VisualizerConfig) {
        if let Some(device) = &self.device {
            config.audio.device = device.clone();
        }
        if let Some(window_length) = self.window_length {
            config.analysis.window_length = window_length;
        }
        if let Some(multiplier) = self.multiplier {
            config.analysis.analysis_rate_multiplier = multiplier;
        }
        if let Some(samples_per_frame) = self.samples_per_frame {
            config.waveform.samples_per_frame = samples_per_frame;
        }
    }
}

/// Plays a WAV file while drawing its spectrum and waveform.
///
/// # Errors
/// - If the configuration cannot be loaded or is invalid
/// - If the file cannot be decoded
/// - If the audio device cannot be opened
/// - If the analyzer cannot allocate its buffers
/// - If the terminal fails
pub fn handle_play(options: PlayOptions) -> anyhow::Result<()> {
    tracing::info!("=== wavescope started: {} ===", options.file.display());

    let config = match load_config(&options) {
        Ok(config) => config,
        Err(err) => {
            return Err(fatal(
                "Configuration Error",
                &format!("{err:#}\n\nCheck ~/.config/wavescope/wavescope.toml and the command-line flags."),
                err,
            ))
        }
    };

    let waveform = match Waveform::load(&options.file) {
        Ok(waveform) => Arc::new(waveform),
        Err(err) => {
            return Err(fatal(
                "Cannot Play File",
                &format!("{}\n\n{err:#}", options.file.display()),
                err,
            ))
        }
    };

    let sample_rate = waveform.sample_rate();
    let window_length = config.analysis.window_length;
    let multiplier = config.analysis.analysis_rate_multiplier;

    tracing::info!(
        "Configuration: device={}, window_length={}, bin_width={:.3}Hz, multiplier={}, samples_per_frame={}",
        config.audio.device,
        window_length,
        bin_width_hz(sample_rate, window_length),
        multiplier,
        config.waveform.samples_per_frame
    );

    if spectrum_outpaces_playback(waveform.channels(), multiplier) {
        tracing::warn!(
            "Mono audio with analysis_rate_multiplier={}: the spectrum moves {}x faster than playback (1.0 keeps it in step)",
            multiplier,
            multiplier
        );
    }

    let mut analyzer = SpectralAnalyzer::new(window_length)?;
    let mut cadence = RenderCadence::new(
        config.cadence.waveform_interval()?,
        config.cadence.spectrum_interval()?,
    )?;

    let mut player = AudioPlayer::new(waveform.clone(), config.audio.device.clone());
    if let Err(err) = player.start_playback() {
        return Err(fatal(
            "Audio Output Error",
            &format!("{err:#}\n\nRun 'wavescope list-devices' to see available output devices."),
            err,
        ));
    }

    let mut tui = VisualizerTui::new(&config.display)?;
    let mut columns = tui.columns()?;
    let mut spectrum_view = SpectrumView::new(
        columns,
        config.analysis.min_frequency_hz,
        config.analysis.max_frequency_hz,
        config.analysis.reference_level_db,
    );
    let mut waveform_view = WaveformView::new(columns, config.waveform.samples_per_frame);

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, term.clone())
        .map_err(|e| anyhow!("Failed to register signal handler: {e}"))?;

    let mut clock = PlaybackClock::start();
    let mut frame_count = 0u64;
    let mut dirty = true;
    let mut device_finished = false;

    tracing::debug!("Entering frame loop. Space pauses, 'r' restarts, 'q'/Escape quits.");

    loop {
        if term.load(Ordering::Relaxed) {
            tracing::info!("Received SIGTERM: stopping playback");
            break;
        }

        match tui.handle_input(INPUT_POLL_TIMEOUT)? {
            PlaybackCommand::Continue => {}
            PlaybackCommand::Quit => break,
            PlaybackCommand::TogglePause => {
                player.toggle_pause();
                clock.toggle_pause();
                dirty = true;
            }
            PlaybackCommand::Restart => {
                player.restart();
                clock.restart();
                cadence.reset();
                device_finished = false;
                dirty = true;
            }
        }

        let current_columns = tui.columns()?;
        if current_columns != columns {
            tracing::debug!("Terminal resized: {} -> {} columns", columns, current_columns);
            columns = current_columns;
            spectrum_view.resize(columns);
            waveform_view.resize(columns);
            dirty = true;
        }

        let now = Instant::now();
        let tick = cadence.poll(now);

        if tick.waveform {
            waveform_view.update(&waveform, clock.sample_position_at(now, sample_rate, 1.0));
        }
        if tick.spectrum {
            let position = clock.sample_position_at(now, sample_rate, multiplier);
            let amplitudes = analyzer.analyze(position, &waveform).map_err(|e| {
                tracing::error!("Spectrum analysis failed: {}", e);
                e
            })?;
            spectrum_view.update(&amplitudes, sample_rate);
        }

        if !(tick.any() || dirty) {
            continue;
        }

        if !device_finished && player.is_finished() {
            tracing::info!("Audio device reached the end of the stream");
            device_finished = true;
        }

        let elapsed = clock.elapsed_at(now);
        let status = StatusLine {
            state: playback_state(player.is_paused(), elapsed, waveform.duration()),
            elapsed: elapsed.min(waveform.duration()),
            total: waveform.duration(),
            device_offset: player.playing_offset(),
            window_length: analyzer.window_length(),
        };
        tui.render(&spectrum_view, &waveform_view, &status)?;
        dirty = false;

        frame_count += 1;
        if frame_count.is_multiple_of(DRIFT_LOG_INTERVAL) {
            let clock_position = clock.current_sample_position(sample_rate);
            let device_position =
                (player.playing_offset().as_secs_f64() * sample_rate as f64).round() as i64;
            tracing::debug!(
                "Drift: clock={} device={} ({:+} frames)",
                clock_position,
                device_position,
                clock_position - device_position
            );
        }
    }

    player.stop();
    tui.cleanup()?;

    tracing::info!("=== wavescope exited after {} frames ===", frame_count);
    Ok(())
}

fn load_config(options: &PlayOptions) -> anyhow::Result<VisualizerConfig> {
    let mut config = VisualizerConfig::load()?;
    options.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn playback_state(paused: bool, elapsed: Duration, total: Duration) -> PlaybackState {
    if elapsed >= total {
        PlaybackState::Finished
    } else if paused {
        PlaybackState::Paused
    } else {
        PlaybackState::Playing
    }
}

/// Whether the analysis window advances faster than real time.
///
/// The window steps `multiplier` raw samples per frame, which matches playback only
/// when it equals the channel count.
fn spectrum_outpaces_playback(channels: u16, multiplier: f64) -> bool {
    channels == 1 && multiplier != 1.0
}

/// Logs `err`, shows it full-screen and returns it for the exit status.
fn fatal(title: &str, message: &str, err: anyhow::Error) -> anyhow::Error {
    tracing::error!("{}: {:#}", title, err);
    if let Err(screen_err) = show_error_screen(title, message) {
        tracing::warn!("Failed to show error screen: {}", screen_err);
    }
    err
}

fn show_error_screen(title: &str, message: &str) -> anyhow::Result<()> {
    let mut error_screen = ErrorScreen::new()?;
    error_screen.show(title, message)?;
    error_screen.cleanup()
}
