use super::rate::NetworkRate;

/// Result of one collection pass. Disabled or failed metrics read as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub network: NetworkRate,
}
