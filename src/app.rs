use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::Action;
use crate::config::{Config, KeybindsConfig, MetricKind, Settings, parse_key};
use crate::display::TrayText;
use crate::scheduler::IntervalSignal;
use crate::system::snapshot::MetricsSnapshot;
use crate::ui::theme::Theme;

/// Upper bound of the panel's interval control. Larger values from the file
/// are kept but cannot be stepped up further.
pub const MAX_PANEL_INTERVAL_SECS: u32 = 10;

const STATUS_TTL_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Help,
}

#[derive(Debug, Clone)]
pub struct ResolvedKeybinds {
    pub quit: KeyCode,
    pub save: KeyCode,
    pub revert: KeyCode,
    pub toggle_cpu: KeyCode,
    pub toggle_memory: KeyCode,
    pub toggle_disk: KeyCode,
    pub toggle_network: KeyCode,
    pub interval_up: KeyCode,
    pub interval_down: KeyCode,
    pub help: KeyCode,
}

impl ResolvedKeybinds {
    pub fn from_config(kb: &KeybindsConfig) -> Self {
        Self {
            quit: parse_key(&kb.quit).unwrap_or(KeyCode::Char('q')),
            save: parse_key(&kb.save).unwrap_or(KeyCode::Char('s')),
            revert: parse_key(&kb.revert).unwrap_or(KeyCode::Esc),
            toggle_cpu: parse_key(&kb.toggle_cpu).unwrap_or(KeyCode::Char('c')),
            toggle_memory: parse_key(&kb.toggle_memory).unwrap_or(KeyCode::Char('m')),
            toggle_disk: parse_key(&kb.toggle_disk).unwrap_or(KeyCode::Char('d')),
            toggle_network: parse_key(&kb.toggle_network).unwrap_or(KeyCode::Char('n')),
            interval_up: parse_key(&kb.interval_up).unwrap_or(KeyCode::Char('+')),
            interval_down: parse_key(&kb.interval_down).unwrap_or(KeyCode::Char('-')),
            help: parse_key(&kb.help).unwrap_or(KeyCode::Char('?')),
        }
    }

    /// Returns (key_label, description) pairs for all configurable keybinds.
    pub fn help_entries(&self) -> Vec<(String, &'static str)> {
        let mut entries = vec![
            (key_label(self.quit), "Quit"),
            (key_label(self.save), "Save settings"),
            (key_label(self.revert), "Discard edits"),
            (key_label(self.toggle_cpu), "Show/hide CPU"),
            (key_label(self.toggle_memory), "Show/hide memory"),
            (key_label(self.toggle_disk), "Show/hide disk"),
            (key_label(self.toggle_network), "Show/hide network"),
            (key_label(self.interval_up), "Slower refresh"),
            (key_label(self.interval_down), "Faster refresh"),
            (key_label(self.help), "Toggle help"),
        ];
        entries.push(("1-4".to_string(), "CPU/mem/disk/net in title"));
        entries.push(("b".to_string(), "Both network speeds"));
        entries.push(("Ctrl+C".to_string(), "Quit (always)"));
        entries
    }
}

pub fn key_label(code: KeyCode) -> String {
    match code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Backspace => "Bksp".to_string(),
        KeyCode::Delete => "Del".to_string(),
        _ => "?".to_string(),
    }
}

/// State of the terminal tray: the last published snapshot, the text derived
/// from it, and a draft of the settings that only takes effect on save.
pub struct App {
    pub running: bool,
    pub settings: Settings,
    pub draft: Config,
    pub snapshot: Option<MetricsSnapshot>,
    pub tray_text: TrayText,
    pub updates: u64,
    pub input_mode: InputMode,
    pub theme: Theme,
    pub status_message: Option<(String, Instant)>,
    pub keybinds: ResolvedKeybinds,
    signal: IntervalSignal,
}

impl App {
    pub fn new(settings: Settings, signal: IntervalSignal) -> Self {
        let config = settings.current();
        App {
            running: true,
            tray_text: TrayText::placeholder(&config),
            theme: Theme::from_config(&config.colors.theme),
            keybinds: ResolvedKeybinds::from_config(&config.keybinds),
            draft: config,
            settings,
            snapshot: None,
            updates: 0,
            input_mode: InputMode::Normal,
            status_message: None,
            signal,
        }
    }

    pub fn update_metrics(&mut self, snapshot: MetricsSnapshot) {
        self.snapshot = Some(snapshot);
        self.updates += 1;
        self.retext();
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.draft != self.settings.current()
    }

    pub fn on_tick(&mut self) {
        if let Some((_, created)) = &self.status_message
            && created.elapsed().as_secs() >= STATUS_TTL_SECS
        {
            self.status_message = None;
        }
    }

    pub fn show_help(&self) -> bool {
        self.input_mode == InputMode::Help
    }

    pub fn help_entries(&self) -> Vec<(String, &'static str)> {
        self.keybinds.help_entries()
    }

    pub fn map_key(&self, key: KeyEvent) -> Action {
        // Ctrl+C always quits (hardwired safety)
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Action::Quit;
        }

        match self.input_mode {
            InputMode::Normal => self.map_key_normal(key),
            InputMode::Help => self.map_key_help(key),
        }
    }

    fn map_key_normal(&self, key: KeyEvent) -> Action {
        let code = key.code;
        let kb = &self.keybinds;

        // Title toggles are hardwired (not configurable)
        match code {
            KeyCode::Char('1') => return Action::ToggleInTitle(MetricKind::Cpu),
            KeyCode::Char('2') => return Action::ToggleInTitle(MetricKind::Memory),
            KeyCode::Char('3') => return Action::ToggleInTitle(MetricKind::Disk),
            KeyCode::Char('4') => return Action::ToggleInTitle(MetricKind::Network),
            KeyCode::Char('b') => return Action::ToggleBothSpeeds,
            _ => {}
        }

        if code == kb.quit {
            return Action::Quit;
        }
        if code == kb.save {
            return Action::Save;
        }
        if code == kb.revert {
            return Action::Revert;
        }
        if code == kb.toggle_cpu {
            return Action::ToggleMetric(MetricKind::Cpu);
        }
        if code == kb.toggle_memory {
            return Action::ToggleMetric(MetricKind::Memory);
        }
        if code == kb.toggle_disk {
            return Action::ToggleMetric(MetricKind::Disk);
        }
        if code == kb.toggle_network {
            return Action::ToggleMetric(MetricKind::Network);
        }
        // '=' shares the '+' key on most layouts
        if code == kb.interval_up
            || (kb.interval_up == KeyCode::Char('+') && code == KeyCode::Char('='))
        {
            return Action::IntervalUp;
        }
        if code == kb.interval_down {
            return Action::IntervalDown;
        }
        if code == kb.help {
            return Action::ToggleHelp;
        }

        Action::None
    }

    fn map_key_help(&self, key: KeyEvent) -> Action {
        let code = key.code;
        // In help mode, only the help key and Esc dismiss, everything else is ignored
        if code == self.keybinds.help || code == KeyCode::Esc {
            return Action::ToggleHelp;
        }
        Action::None
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::ToggleMetric(kind) => self.draft.metrics.toggle(kind),
            Action::ToggleInTitle(kind) => self.draft.title.toggle(kind),
            Action::ToggleBothSpeeds => {
                self.draft.title.show_both_network_speeds =
                    !self.draft.title.show_both_network_speeds;
            }
            Action::IntervalUp => {
                let secs = &mut self.draft.general.refresh_interval_secs;
                if *secs < MAX_PANEL_INTERVAL_SECS {
                    *secs += 1;
                }
            }
            Action::IntervalDown => {
                let secs = &mut self.draft.general.refresh_interval_secs;
                *secs = secs.saturating_sub(1).max(1);
            }
            Action::Save => self.save(),
            Action::Revert => {
                if self.has_unsaved_changes() {
                    self.draft = self.settings.current();
                    self.set_status("Changes discarded".to_string());
                }
            }
            Action::ToggleHelp => {
                self.input_mode = if self.input_mode == InputMode::Help {
                    InputMode::Normal
                } else {
                    InputMode::Help
                };
            }
            Action::None => {}
        }
    }

    fn save(&mut self) {
        self.settings.replace(self.draft.clone());
        self.draft = self.settings.current();

        let msg = match self.settings.save() {
            Ok(()) => "Settings saved".to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to persist settings");
                format!("Save failed: {err}")
            }
        };
        // The scheduler re-reads the interval and runs a fresh pass.
        self.signal.notify();
        self.retext();
        self.set_status(msg);
    }

    fn retext(&mut self) {
        let config = self.settings.current();
        self.tray_text = match &self.snapshot {
            Some(snapshot) => TrayText::compose(&config, snapshot),
            None => TrayText::placeholder(&config),
        };
    }

    fn set_status(&mut self, msg: String) {
        self.status_message = Some((msg, Instant::now()));
    }
}
