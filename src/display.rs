use std::sync::{Mutex, PoisonError};

use color_eyre::eyre::Result;
use tokio::sync::{mpsc, watch};

use crate::config::{Config, Settings};
use crate::event::Event;
use crate::format::{format_percent, format_speed};
use crate::system::snapshot::MetricsSnapshot;

pub const DEFAULT_TITLE: &str = "Sys Monitor";
pub const DEFAULT_TOOLTIP: &str = "System Monitor";
const PLACEHOLDER_TITLE: &str = "System Monitor";

/// Where the scheduler hands finished snapshots. Called at most once per
/// pass and never concurrently; implementations must return quickly.
pub trait DisplayBinding: Send + Sync {
    fn publish(&self, snapshot: MetricsSnapshot);
}

/// A concrete tray front-end.
pub trait TrayBackend {
    fn start(&mut self) -> Result<()>;
    fn update_metrics(&mut self, snapshot: &MetricsSnapshot);
    fn stop(&mut self) -> Result<()>;
}

/// Forwards snapshots to the UI event loop.
pub struct ChannelBinding {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelBinding {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

impl DisplayBinding for ChannelBinding {
    fn publish(&self, snapshot: MetricsSnapshot) {
        if self.tx.send(Event::Metrics(snapshot)).is_err() {
            tracing::debug!("display channel closed, dropping snapshot");
        }
    }
}

/// Updates a backend in place, for backends that are safe to touch from the
/// scheduler's context.
pub struct DirectBinding<T> {
    backend: Mutex<T>,
}

impl<T: TrayBackend> DirectBinding<T> {
    pub fn new(backend: T) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    pub fn with_backend<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut backend)
    }
}

impl<T: TrayBackend + Send> DisplayBinding for DirectBinding<T> {
    fn publish(&self, snapshot: MetricsSnapshot) {
        self.with_backend(|backend| backend.update_metrics(&snapshot));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub visible: bool,
}

/// Everything a tray shows: the icon title, its tooltip and the menu rows
/// (CPU, Memory, Network, Disk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayText {
    pub title: String,
    pub tooltip: String,
    pub items: Vec<MenuItem>,
}

impl TrayText {
    pub fn placeholder(config: &Config) -> Self {
        let m = &config.metrics;
        TrayText {
            title: PLACEHOLDER_TITLE.to_string(),
            tooltip: DEFAULT_TOOLTIP.to_string(),
            items: vec![
                item("CPU: Loading...".to_string(), m.show_cpu),
                item("Memory: Loading...".to_string(), m.show_memory),
                item("Network: Loading...".to_string(), m.show_network),
                item("Disk: Loading...".to_string(), m.show_disk),
            ],
        }
    }

    pub fn compose(config: &Config, snapshot: &MetricsSnapshot) -> Self {
        let m = &config.metrics;
        let t = &config.title;
        let net = &snapshot.network;
        let down = format_speed(net.download_kbps);
        let up = format_speed(net.upload_kbps);

        let mut title_parts = Vec::new();
        if t.show_cpu && m.show_cpu {
            title_parts.push(format!("C:{}", format_percent(snapshot.cpu_percent)));
        }
        if t.show_memory && m.show_memory {
            title_parts.push(format!("M:{}", format_percent(snapshot.memory_percent)));
        }
        if t.show_disk && m.show_disk {
            title_parts.push(format!("D:{}", format_percent(snapshot.disk_percent)));
        }
        if t.show_network && m.show_network {
            if t.show_both_network_speeds {
                title_parts.push(format!("N:\u{2193}{down} \u{2191}{up}"));
            } else {
                title_parts.push(format!("N:\u{2193}{down}"));
            }
        }

        let mut tooltip_parts = Vec::new();
        if m.show_cpu {
            tooltip_parts.push(format!("CPU: {}", format_percent(snapshot.cpu_percent)));
        }
        if m.show_memory {
            tooltip_parts.push(format!("MEM: {}", format_percent(snapshot.memory_percent)));
        }
        if m.show_disk {
            tooltip_parts.push(format!("DISK: {}", format_percent(snapshot.disk_percent)));
        }
        if m.show_network {
            tooltip_parts.push(format!("NET: \u{2193}{down} \u{2191}{up} KB/s"));
        }

        TrayText {
            title: join_or(title_parts, DEFAULT_TITLE),
            tooltip: join_or(tooltip_parts, DEFAULT_TOOLTIP),
            items: vec![
                item(
                    format!("CPU: {}", format_percent(snapshot.cpu_percent)),
                    m.show_cpu,
                ),
                item(
                    format!("Memory: {}", format_percent(snapshot.memory_percent)),
                    m.show_memory,
                ),
                item(
                    format!("Network: \u{2193}{down} KB/s \u{2191}{up} KB/s"),
                    m.show_network,
                ),
                item(
                    format!("Disk: {}", format_percent(snapshot.disk_percent)),
                    m.show_disk,
                ),
            ],
        }
    }

    pub fn visible_items(&self) -> impl Iterator<Item = &MenuItem> {
        self.items.iter().filter(|i| i.visible)
    }
}

fn item(label: String, visible: bool) -> MenuItem {
    MenuItem { label, visible }
}

fn join_or(parts: Vec<String>, fallback: &str) -> String {
    if parts.is_empty() {
        fallback.to_string()
    } else {
        parts.join(" | ")
    }
}

/// Headless tray: every update is a log line. The running update count is
/// published on a watch channel so callers can wait for N passes.
pub struct LogTray {
    settings: Settings,
    updates: u64,
    progress: watch::Sender<u64>,
}

impl LogTray {
    pub fn new(settings: Settings) -> (Self, watch::Receiver<u64>) {
        let (progress, rx) = watch::channel(0);
        let tray = LogTray {
            settings,
            updates: 0,
            progress,
        };
        (tray, rx)
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl TrayBackend for LogTray {
    fn start(&mut self) -> Result<()> {
        tracing::info!("headless tray started");
        Ok(())
    }

    fn update_metrics(&mut self, snapshot: &MetricsSnapshot) {
        let text = TrayText::compose(&self.settings.current(), snapshot);
        tracing::info!(title = %text.title, tooltip = %text.tooltip, "tray updated");
        self.updates += 1;
        self.progress.send_replace(self.updates);
    }

    fn stop(&mut self) -> Result<()> {
        tracing::info!(updates = self.updates, "headless tray stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::system::rate::NetworkRate;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            cpu_percent: 12.5,
            memory_percent: 40.0,
            disk_percent: 55.0,
            network: NetworkRate {
                download_kbps: 9.953125,
                upload_kbps: 2.0,
                total_download_kb: 10,
                total_upload_kb: 1,
            },
        }
    }

    #[test]
    fn default_title_shows_cpu_only() {
        let text = TrayText::compose(&Config::default(), &snapshot());
        assert_snapshot!(text.title, @"C:12.5%");
        assert_snapshot!(text.tooltip, @"CPU: 12.5% | MEM: 40.0% | DISK: 55.0% | NET: ↓10.0 ↑2.0 KB/s");
    }

    #[test]
    fn full_title_with_both_speeds() {
        let mut config = Config::default();
        config.title.show_memory = true;
        config.title.show_disk = true;
        config.title.show_network = true;
        config.title.show_both_network_speeds = true;
        let text = TrayText::compose(&config, &snapshot());
        assert_snapshot!(text.title, @"C:12.5% | M:40.0% | D:55.0% | N:↓10.0 ↑2.0");

        config.title.show_both_network_speeds = false;
        let text = TrayText::compose(&config, &snapshot());
        assert_snapshot!(text.title, @"C:12.5% | M:40.0% | D:55.0% | N:↓10.0");
    }

    #[test]
    fn hidden_metric_is_dropped_from_title_even_if_selected() {
        let mut config = Config::default();
        config.title.show_memory = true;
        config.metrics.show_memory = false;
        let text = TrayText::compose(&config, &snapshot());
        assert_eq!(text.title, "C:12.5%");
        assert!(!text.tooltip.contains("MEM"));
        assert!(!text.items[1].visible);
    }

    #[test]
    fn nothing_enabled_falls_back_to_defaults() {
        let mut config = Config::default();
        config.metrics.show_cpu = false;
        config.metrics.show_memory = false;
        config.metrics.show_disk = false;
        config.metrics.show_network = false;
        let text = TrayText::compose(&config, &snapshot());
        assert_eq!(text.title, DEFAULT_TITLE);
        assert_eq!(text.tooltip, DEFAULT_TOOLTIP);
        assert_eq!(text.visible_items().count(), 0);
    }

    #[test]
    fn menu_items_in_tray_order() {
        let text = TrayText::compose(&Config::default(), &snapshot());
        let labels: Vec<&str> = text.items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "CPU: 12.5%",
                "Memory: 40.0%",
                "Network: ↓10.0 KB/s ↑2.0 KB/s",
                "Disk: 55.0%",
            ]
        );
    }

    #[test]
    fn placeholder_reads_loading() {
        let text = TrayText::placeholder(&Config::default());
        assert_eq!(text.items[0].label, "CPU: Loading...");
        assert!(text.items.iter().all(|i| i.visible));
    }

    #[test]
    fn log_tray_counts_updates() {
        let (tray, rx) = LogTray::new(Settings::in_memory(Config::default()));
        let binding = DirectBinding::new(tray);
        binding.publish(snapshot());
        binding.publish(snapshot());
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(binding.with_backend(|t| t.updates()), 2);
    }

    #[test]
    fn channel_binding_forwards_and_tolerates_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let binding = ChannelBinding::new(tx);
        binding.publish(snapshot());
        match rx.try_recv() {
            Ok(Event::Metrics(s)) => assert_eq!(s, snapshot()),
            other => panic!("unexpected event: {other:?}"),
        }
        drop(rx);
        binding.publish(snapshot());
    }
}
