use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use color_eyre::eyre::{Result, eyre};
use sysinfo::{Disks, Networks, System};

use super::rate::CounterSample;
use crate::config::GeneralConfig;

/// The host metric collectors consumed by the aggregator. Each read may fail
/// on its own; callers substitute a neutral value.
pub trait MetricSource: Send + Sync {
    fn cpu_percent(&self) -> Result<f64>;
    fn memory_percent(&self) -> Result<f64>;
    fn disk_percent(&self) -> Result<f64>;
    fn network_counters(&self) -> Result<CounterSample>;
}

pub struct SysinfoSource {
    sys: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
    cpu_window: Duration,
    mount_point: PathBuf,
}

impl SysinfoSource {
    pub fn new(general: &GeneralConfig) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        SysinfoSource {
            sys: Mutex::new(sys),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            cpu_window: Duration::from_millis(general.cpu_sample_window_ms)
                .max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
            mount_point: PathBuf::from(&general.disk_mount_point),
        }
    }

    fn system(&self) -> MutexGuard<'_, System> {
        self.sys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricSource for SysinfoSource {
    fn cpu_percent(&self) -> Result<f64> {
        let mut sys = self.system();
        sys.refresh_cpu_usage();
        // Usage is a delta between two refreshes; the window is the dominant
        // latency of a pass.
        std::thread::sleep(self.cpu_window);
        sys.refresh_cpu_usage();
        if sys.cpus().is_empty() {
            return Err(eyre!("no CPU usage data available"));
        }
        Ok(f64::from(sys.global_cpu_usage()))
    }

    fn memory_percent(&self) -> Result<f64> {
        let mut sys = self.system();
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(eyre!("host reported zero total memory"));
        }
        Ok(sys.used_memory() as f64 / total as f64 * 100.0)
    }

    fn disk_percent(&self) -> Result<f64> {
        let mut disks = self.disks.lock().unwrap_or_else(PoisonError::into_inner);
        disks.refresh(true);
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == self.mount_point.as_path())
            .ok_or_else(|| eyre!("no disk mounted at {}", self.mount_point.display()))?;
        used_percent(disk.total_space(), disk.available_space())
            .ok_or_else(|| eyre!("disk at {} reports zero capacity", self.mount_point.display()))
    }

    fn network_counters(&self) -> Result<CounterSample> {
        let mut networks = self.networks.lock().unwrap_or_else(PoisonError::into_inner);
        networks.refresh(true);
        let mut rx = 0u64;
        let mut tx = 0u64;
        for (name, data) in networks.list() {
            if is_loopback(name) {
                continue;
            }
            rx = rx.saturating_add(data.total_received());
            tx = tx.saturating_add(data.total_transmitted());
        }
        Ok(CounterSample::new(rx, tx, Instant::now()))
    }
}

fn used_percent(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some(used as f64 / total as f64 * 100.0)
}

pub fn is_loopback(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.contains("loopback") {
        return true;
    }
    match lower.strip_prefix("lo") {
        Some(rest) => rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
