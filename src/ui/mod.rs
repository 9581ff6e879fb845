pub mod header;
pub mod help;
pub mod panel;
pub mod statusbar;
pub mod theme;

use color_eyre::eyre::{Result, WrapErr, bail};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::{DefaultTerminal, Frame};

use crate::app::App;
use crate::display::TrayBackend;
use crate::system::snapshot::MetricsSnapshot;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    header::render(
        frame,
        chunks[0],
        app.snapshot.as_ref(),
        &app.settings.current().metrics,
        &app.theme,
    );

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);
    panel::render_tray(frame, body[0], &app.tray_text, &app.theme);
    panel::render_settings(
        frame,
        body[1],
        &app.draft,
        app.has_unsaved_changes(),
        &app.theme,
    );

    statusbar::render(
        frame,
        chunks[2],
        &app.keybinds,
        app.status_message.as_ref(),
        app.updates,
        &app.theme,
    );

    // Help overlay, rendered last to appear on top
    if app.show_help() {
        help::render(frame, frame.area(), &app.help_entries(), &app.theme);
    }
}

/// Tray rendered into the terminal. Owns the panel state; the event loop
/// feeds it keys and snapshots.
pub struct TerminalTray {
    terminal: Option<DefaultTerminal>,
    app: App,
}

impl TerminalTray {
    pub fn new(app: App) -> Self {
        TerminalTray {
            terminal: None,
            app,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    pub fn draw(&mut self) -> Result<()> {
        let Some(terminal) = self.terminal.as_mut() else {
            bail!("terminal tray is not started");
        };
        let app = &self.app;
        terminal
            .draw(|frame| draw(frame, app))
            .wrap_err("failed to draw terminal tray")?;
        Ok(())
    }
}

impl TrayBackend for TerminalTray {
    fn start(&mut self) -> Result<()> {
        if self.terminal.is_some() {
            return Ok(());
        }
        // ratatui::init installs a panic hook that restores the terminal
        self.terminal = Some(ratatui::init());
        tracing::info!("terminal tray started");
        self.draw()
    }

    fn update_metrics(&mut self, snapshot: &MetricsSnapshot) {
        self.app.update_metrics(*snapshot);
        if self.terminal.is_some()
            && let Err(err) = self.draw()
        {
            tracing::warn!(error = %err, "redraw after metrics update failed");
        }
    }

    fn stop(&mut self) -> Result<()> {
        if self.terminal.take().is_some() {
            ratatui::restore();
            tracing::info!(updates = self.app.updates, "terminal tray stopped");
        }
        Ok(())
    }
}
