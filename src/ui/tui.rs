//! Terminal user interface for playback with spectrum and waveform visualization.
//!
//! Draws the spectrum view on top, the two waveform channels mirrored below it and a
//! one-line status footer, and translates key presses into playback commands.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    text::Span,
    widgets::{Paragraph, Sparkline},
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use crate::config::DisplayConfig;
use crate::visualizations::{SpectrumView, WaveformView};

/// User input command during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// Keep playing (no key or an unbound key)
    Continue,
    /// Stop playback and exit (Escape, 'q' or Ctrl+C)
    Quit,
    /// Pause/resume playback (Space)
    TogglePause,
    /// Restart from the beginning ('r')
    Restart,
}

/// Playback state shown in the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Finished,
}

/// Values shown in the footer line.
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub state: PlaybackState,
    /// Wall-clock playback position
    pub elapsed: Duration,
    pub total: Duration,
    /// Position reported by the audio device
    pub device_offset: Duration,
    pub window_length: usize,
}

/// Screen regions of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameLayout {
    spectrum: Rect,
    upper_channel: Rect,
    lower_channel: Rect,
    footer: Rect,
}

/// Terminal UI for playback visualization.
pub struct VisualizerTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    display: DisplayConfig,
}

impl VisualizerTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new(display: &DisplayConfig) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(VisualizerTui {
            terminal,
            display: display.clone(),
        })
    }

    /// Number of drawable columns, honoring the configured width limit.
    ///
    /// # Errors
    /// - If the terminal size cannot be queried
    pub fn columns(&self) -> anyhow::Result<usize> {
        let size = self.terminal.size()?;
        let area = Rect::new(0, 0, size.width, size.height);
        Ok(drawing_area(area, &self.display).width as usize)
    }

    /// Draws one frame.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(
        &mut self,
        spectrum: &SpectrumView,
        waveform: &WaveformView,
        status: &StatusLine,
    ) -> anyhow::Result<()> {
        let display = self.display.clone();

        // Mono material mirrors its only channel
        let upper = waveform.channel(0);
        let lower = if waveform.channel_count() > 1 {
            waveform.channel(1)
        } else {
            upper
        };
        let inverted_lower: Vec<u64> = lower.iter().map(|&v| 100_u64.saturating_sub(v)).collect();

        self.terminal.draw(|frame| {
            let layout = frame_layout(frame.area(), &display);

            let spectrum_sparkline = Sparkline::default()
                .data(spectrum.data())
                .max(100)
                .style(
                    Style::default()
                        .bg(Color::Rgb(0, 0, 0))
                        .fg(Color::Rgb(240, 180, 90)),
                );
            frame.render_widget(spectrum_sparkline, layout.spectrum);

            let upper_sparkline = Sparkline::default().data(upper).max(100).style(
                Style::default()
                    .bg(Color::Rgb(0, 0, 0))
                    .fg(Color::Rgb(206, 224, 220)),
            );
            frame.render_widget(upper_sparkline, layout.upper_channel);

            let lower_sparkline = Sparkline::default().data(&inverted_lower).max(100).style(
                Style::default()
                    .bg(Color::Rgb(185, 207, 212))
                    .fg(Color::Rgb(0, 0, 0)),
            );
            frame.render_widget(lower_sparkline, layout.lower_channel);

            let footer = Paragraph::new(status_line(status)).style(
                Style::default()
                    .fg(Color::Rgb(185, 207, 212))
                    .bg(Color::Rgb(0, 0, 0)),
            );
            frame.render_widget(footer, layout.footer);
        })?;

        Ok(())
    }

    /// Waits up to `timeout` for a key press and returns the matching command.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&self, timeout: Duration) -> anyhow::Result<PlaybackCommand> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(command_for_key(key));
            }
        }
        Ok(PlaybackCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for VisualizerTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn command_for_key(key: KeyEvent) -> PlaybackCommand {
    if key.kind == KeyEventKind::Release {
        return PlaybackCommand::Continue;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            tracing::debug!("Escape or 'q' pressed: stopping playback");
            PlaybackCommand::Quit
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            tracing::debug!("Ctrl+C pressed: stopping playback");
            PlaybackCommand::Quit
        }
        KeyCode::Char(' ') => {
            tracing::debug!("Space pressed: toggling pause");
            PlaybackCommand::TogglePause
        }
        KeyCode::Char('r') => {
            tracing::debug!("'r' pressed: restarting playback");
            PlaybackCommand::Restart
        }
        _ => PlaybackCommand::Continue,
    }
}

/// Limits `area` to the configured width and height; zero means unlimited.
fn drawing_area(area: Rect, display: &DisplayConfig) -> Rect {
    let limit = |available: u16, configured: u16| {
        if configured == 0 {
            available
        } else {
            available.min(configured)
        }
    };
    Rect {
        x: area.x,
        y: area.y,
        width: limit(area.width, display.width),
        height: limit(area.height, display.height),
    }
}

fn frame_layout(area: Rect, display: &DisplayConfig) -> FrameLayout {
    let area = drawing_area(area, display);
    let footer_height = 1.min(area.height);
    let content_height = area.height - footer_height;

    let spectrum_height = content_height / 2;
    let upper_height = (content_height - spectrum_height) / 2;
    let lower_height = content_height - spectrum_height - upper_height;

    let row = |y: u16, height: u16| Rect {
        x: area.x,
        y,
        width: area.width,
        height,
    };

    FrameLayout {
        spectrum: row(area.y, spectrum_height),
        upper_channel: row(area.y + spectrum_height, upper_height),
        lower_channel: row(area.y + spectrum_height + upper_height, lower_height),
        footer: row(area.y + content_height, footer_height),
    }
}

fn status_line(status: &StatusLine) -> Line<'static> {
    let indicator = match status.state {
        PlaybackState::Playing => Span::styled("▶ ", Style::default().fg(Color::Green)),
        PlaybackState::Paused => Span::styled("⏸ ", Style::default().fg(Color::Yellow)),
        PlaybackState::Finished => Span::styled("■ ", Style::default().fg(Color::Red)),
    };

    Line::from(vec![
        indicator,
        Span::raw(format!(
            "{} / {}",
            format_duration(status.elapsed),
            format_duration(status.total)
        )),
        Span::raw(format!(" / device {}", format_duration(status.device_offset))),
        Span::raw(format!(" / fft {}", status.window_length)),
        Span::styled(
            "   space pause · r restart · q quit",
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

/// Formats a duration as `m:ss`.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);

        assert_eq!(command_for_key(key(KeyCode::Char('q'))), PlaybackCommand::Quit);
        assert_eq!(command_for_key(key(KeyCode::Esc)), PlaybackCommand::Quit);
        assert_eq!(
            command_for_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            PlaybackCommand::Quit
        );
        assert_eq!(command_for_key(key(KeyCode::Char('c'))), PlaybackCommand::Continue);
        assert_eq!(
            command_for_key(key(KeyCode::Char(' '))),
            PlaybackCommand::TogglePause
        );
        assert_eq!(command_for_key(key(KeyCode::Char('r'))), PlaybackCommand::Restart);
        assert_eq!(command_for_key(key(KeyCode::Enter)), PlaybackCommand::Continue);
    }

    #[test]
    fn test_key_release_ignored() {
        let mut release = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;

        assert_eq!(command_for_key(release), PlaybackCommand::Continue);
    }

    #[test]
    fn test_layout_fills_terminal() {
        let layout = frame_layout(Rect::new(0, 0, 80, 25), &DisplayConfig::default());

        assert_eq!(layout.spectrum, Rect::new(0, 0, 80, 12));
        assert_eq!(layout.upper_channel, Rect::new(0, 12, 80, 6));
        assert_eq!(layout.lower_channel, Rect::new(0, 18, 80, 6));
        assert_eq!(layout.footer, Rect::new(0, 24, 80, 1));
    }

    #[test]
    fn test_layout_honors_display_limits() {
        let display = DisplayConfig {
            width: 40,
            height: 9,
        };
        let layout = frame_layout(Rect::new(0, 0, 80, 25), &display);

        assert_eq!(layout.spectrum.width, 40);
        assert_eq!(layout.footer, Rect::new(0, 8, 40, 1));
        assert_eq!(
            layout.spectrum.height + layout.upper_channel.height + layout.lower_channel.height,
            8
        );

        // Limits larger than the terminal are ignored
        let display = DisplayConfig {
            width: 200,
            height: 0,
        };
        assert_eq!(drawing_area(Rect::new(0, 0, 80, 25), &display).width, 80);
    }

    #[test]
    fn test_layout_tiny_terminal() {
        let layout = frame_layout(Rect::new(0, 0, 10, 0), &DisplayConfig::default());

        assert_eq!(layout.footer.height, 0);
        assert_eq!(layout.spectrum.height, 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(750)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3600)), "60:00");
    }

    #[test]
    fn test_status_line_indicator() {
        let status = StatusLine {
            state: PlaybackState::Paused,
            elapsed: Duration::from_secs(5),
            total: Duration::from_secs(90),
            device_offset: Duration::from_secs(5),
            window_length: 16384,
        };

        let text: String = status_line(&status)
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert!(text.starts_with("⏸ 0:05 / 1:30"));
        assert!(text.contains("fft 16384"));
    }
}
