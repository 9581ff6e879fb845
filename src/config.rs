use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use crossterm::event::KeyCode;
use serde::{Deserialize, Serialize};

pub const MIN_REFRESH_INTERVAL_SECS: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub metrics: MetricsConfig,
    pub title: TitleConfig,
    pub colors: ColorsConfig,
    pub keybinds: KeybindsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_interval_secs: u32,
    pub cpu_sample_window_ms: u64,
    pub disk_mount_point: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_interval_secs: 2,
            cpu_sample_window_ms: 1000,
            disk_mount_point: "/".to_string(),
        }
    }
}

/// Which metrics are collected and shown in the menu and tooltip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub show_cpu: bool,
    pub show_memory: bool,
    pub show_disk: bool,
    pub show_network: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            show_cpu: true,
            show_memory: true,
            show_disk: true,
            show_network: true,
        }
    }
}

/// Which metrics are packed into the tray title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TitleConfig {
    pub show_cpu: bool,
    pub show_memory: bool,
    pub show_disk: bool,
    pub show_network: bool,
    pub show_both_network_speeds: bool,
}

impl Default for TitleConfig {
    fn default() -> Self {
        TitleConfig {
            show_cpu: true,
            show_memory: false,
            show_disk: false,
            show_network: false,
            show_both_network_speeds: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub theme: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        ColorsConfig {
            theme: "dark".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KeybindsConfig {
    pub quit: String,
    pub save: String,
    pub revert: String,
    pub toggle_cpu: String,
    pub toggle_memory: String,
    pub toggle_disk: String,
    pub toggle_network: String,
    pub interval_up: String,
    pub interval_down: String,
    pub help: String,
}

impl Default for KeybindsConfig {
    fn default() -> Self {
        KeybindsConfig {
            quit: "q".to_string(),
            save: "s".to_string(),
            revert: "Escape".to_string(),
            toggle_cpu: "c".to_string(),
            toggle_memory: "m".to_string(),
            toggle_disk: "d".to_string(),
            toggle_network: "n".to_string(),
            interval_up: "+".to_string(),
            interval_down: "-".to_string(),
            help: "?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Cpu,
    Memory,
    Network,
    Disk,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Network,
        MetricKind::Disk,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Network => "network",
            MetricKind::Disk => "disk",
        }
    }
}

/// The set of enabled metrics, read by the aggregator at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledMetrics {
    pub cpu: bool,
    pub memory: bool,
    pub disk: bool,
    pub network: bool,
}

impl EnabledMetrics {
    pub fn all() -> Self {
        Self::from(&MetricsConfig::default())
    }

    pub fn contains(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::Network => self.network,
            MetricKind::Disk => self.disk,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        MetricKind::ALL
            .into_iter()
            .filter(|k| self.contains(*k))
            .map(MetricKind::name)
            .collect()
    }
}

impl From<&MetricsConfig> for EnabledMetrics {
    fn from(m: &MetricsConfig) -> Self {
        EnabledMetrics {
            cpu: m.show_cpu,
            memory: m.show_memory,
            disk: m.show_disk,
            network: m.show_network,
        }
    }
}

impl MetricsConfig {
    pub fn toggle(&mut self, kind: MetricKind) {
        let flag = match kind {
            MetricKind::Cpu => &mut self.show_cpu,
            MetricKind::Memory => &mut self.show_memory,
            MetricKind::Network => &mut self.show_network,
            MetricKind::Disk => &mut self.show_disk,
        };
        *flag = !*flag;
    }
}

impl TitleConfig {
    pub fn toggle(&mut self, kind: MetricKind) {
        let flag = match kind {
            MetricKind::Cpu => &mut self.show_cpu,
            MetricKind::Memory => &mut self.show_memory,
            MetricKind::Network => &mut self.show_network,
            MetricKind::Disk => &mut self.show_disk,
        };
        *flag = !*flag;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    pub interval_secs: u32,
    pub enabled: EnabledMetrics,
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        interval_from_secs(self.interval_secs)
    }
}

/// Refresh period for a configured interval, never shorter than the minimum.
pub fn interval_from_secs(secs: u32) -> Duration {
    Duration::from_secs(u64::from(secs.max(MIN_REFRESH_INTERVAL_SECS)))
}

impl Config {
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            interval_secs: self.general.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS),
            enabled: EnabledMetrics::from(&self.metrics),
        }
    }

    /// Clamp values the settings UI is expected to keep in range.
    pub fn normalized(mut self) -> Self {
        if self.general.refresh_interval_secs < MIN_REFRESH_INTERVAL_SECS {
            tracing::warn!(
                configured = self.general.refresh_interval_secs,
                "refresh interval below minimum, clamping to {MIN_REFRESH_INTERVAL_SECS}s"
            );
            self.general.refresh_interval_secs = MIN_REFRESH_INTERVAL_SECS;
        }
        self
    }
}

/// Shared, thread-safe handle on the live settings.
#[derive(Debug, Clone)]
pub struct Settings {
    inner: Arc<RwLock<Config>>,
    path: Option<PathBuf>,
}

impl Settings {
    pub fn in_memory(config: Config) -> Self {
        Settings {
            inner: Arc::new(RwLock::new(config.normalized())),
            path: None,
        }
    }

    /// Load from `path`, or the default location. A missing file is created
    /// with the defaults.
    pub fn open(path: Option<PathBuf>) -> Self {
        let path = path.or_else(config_path);
        let config = match &path {
            Some(p) if p.exists() => load_config_from_path(p),
            Some(p) => {
                let config = Config::default();
                if let Err(err) = save_config_to_path(&config, p) {
                    tracing::warn!(path = %p.display(), error = %err, "could not write default settings");
                }
                config
            }
            None => Config::default(),
        };
        Settings {
            inner: Arc::new(RwLock::new(config.normalized())),
            path,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current(&self) -> Config {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh_config()
    }

    pub fn interval_secs(&self) -> u32 {
        self.refresh_config().interval_secs
    }

    pub fn replace(&self, config: Config) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config.normalized();
    }

    pub fn update<F: FnOnce(&mut Config)>(&self, edit: F) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        edit(&mut guard);
        let normalized = guard.clone().normalized();
        *guard = normalized;
    }

    /// Persist the current settings. In-memory settings have nowhere to go
    /// and succeed trivially.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => save_config_to_path(&self.current(), path),
            None => Ok(()),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("traymon").join("config.toml"))
}

pub fn load_config_from_path(path: &Path) -> Config {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not read settings, using defaults");
            return Config::default();
        }
    };
    let parsed = if is_json(path) {
        serde_json::from_str::<JsonSettings>(&contents)
            .map(Config::from)
            .map_err(|e| e.to_string())
    } else {
        toml::from_str(&contents).map_err(|e| e.to_string())
    };
    match parsed {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "malformed settings, using defaults");
            Config::default()
        }
    }
}

pub fn save_config_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("creating {}", parent.display()))?;
    }
    let contents = if is_json(path) {
        serde_json::to_string_pretty(&JsonSettings::from(config))?
    } else {
        toml::to_string_pretty(config)?
    };
    std::fs::write(path, contents).wrap_err_with(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "settings saved");
    Ok(())
}

/// The flat camelCase `config.json` layout of the earlier tray monitor.
/// Only these keys round-trip through a `.json` path; every other setting
/// keeps its default.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct JsonSettings {
    #[serde(rename = "showCPU")]
    show_cpu: bool,
    show_memory: bool,
    show_network: bool,
    show_disk: bool,
    #[serde(rename = "showCPUInTitle")]
    show_cpu_in_title: bool,
    show_memory_in_title: bool,
    show_network_in_title: bool,
    show_both_network_speeds: bool,
    show_disk_in_title: bool,
    refresh_interval: i64,
    /// Written for older readers, ignored on load.
    show_metrics: Vec<String>,
}

impl Default for JsonSettings {
    fn default() -> Self {
        JsonSettings::from(&Config::default())
    }
}

impl From<&Config> for JsonSettings {
    fn from(config: &Config) -> Self {
        let m = &config.metrics;
        let t = &config.title;
        JsonSettings {
            show_cpu: m.show_cpu,
            show_memory: m.show_memory,
            show_network: m.show_network,
            show_disk: m.show_disk,
            show_cpu_in_title: t.show_cpu,
            show_memory_in_title: t.show_memory,
            show_network_in_title: t.show_network,
            show_both_network_speeds: t.show_both_network_speeds,
            show_disk_in_title: t.show_disk,
            refresh_interval: i64::from(config.general.refresh_interval_secs),
            show_metrics: EnabledMetrics::from(m)
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl From<JsonSettings> for Config {
    fn from(json: JsonSettings) -> Self {
        let mut config = Config::default();
        // Negative intervals land on 0 and are clamped by normalisation.
        config.general.refresh_interval_secs =
            u32::try_from(json.refresh_interval.max(0)).unwrap_or(u32::MAX);
        config.metrics = MetricsConfig {
            show_cpu: json.show_cpu,
            show_memory: json.show_memory,
            show_disk: json.show_disk,
            show_network: json.show_network,
        };
        config.title = TitleConfig {
            show_cpu: json.show_cpu_in_title,
            show_memory: json.show_memory_in_title,
            show_disk: json.show_disk_in_title,
            show_network: json.show_network_in_title,
            show_both_network_speeds: json.show_both_network_speeds,
        };
        config
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

pub fn parse_key(s: &str) -> Option<KeyCode> {
    match s {
        "Enter" => Some(KeyCode::Enter),
        "Escape" | "Esc" => Some(KeyCode::Esc),
        "Tab" => Some(KeyCode::Tab),
        "Backspace" => Some(KeyCode::Backspace),
        "Delete" => Some(KeyCode::Delete),
        "Space" => Some(KeyCode::Char(' ')),
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(KeyCode::Char(c)),
                _ => None,
            }
        }
    }
}
