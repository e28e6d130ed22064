//! Full-screen error display for failures that stop playback before it starts.

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::Span,
    widgets::{Block, Paragraph, Wrap},
};
use std::io::{self, Stdout};
use std::time::Duration;

const ERROR_BACKGROUND: Color = Color::Rgb(160, 20, 20);

/// Red full-screen message that waits for a key press.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// Creates a new error screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(ErrorScreen { terminal })
    }

    /// Shows `title` above `message` until any key is pressed.
    ///
    /// # Errors
    /// - If terminal rendering or event polling fails
    pub fn show(&mut self, title: &str, message: &str) -> anyhow::Result<()> {
        let lines = error_lines(title, message);

        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                frame.render_widget(Block::default().bg(ERROR_BACKGROUND), area);

                let text_area = centered(area, lines.len() as u16);
                let paragraph = Paragraph::new(lines.clone())
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .style(Style::default().fg(Color::White).bg(ERROR_BACKGROUND));

                frame.render_widget(paragraph, text_area);
            })?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Release {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be restored
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn error_lines(title: &str, message: &str) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    lines.extend(message.lines().map(|line| Line::from(line.to_string())));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "press any key to exit",
        Style::default().add_modifier(Modifier::DIM),
    )));
    lines
}

/// Middle 80% of `area`, vertically centered around `text_height` rows.
fn centered(area: Rect, text_height: u16) -> Rect {
    let width = area.width * 4 / 5;
    let height = text_height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
