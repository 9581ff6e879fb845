use color_eyre::eyre::Result;

use super::rate::{NetworkRate, RateSampler};
use super::snapshot::MetricsSnapshot;
use super::source::MetricSource;
use crate::config::{MetricKind, RefreshConfig};

/// Runs every enabled collector once per pass. A failing collector reads as
/// zero for that pass; nothing here aborts a snapshot.
pub struct MetricsAggregator {
    source: Box<dyn MetricSource>,
    sampler: RateSampler,
}

impl MetricsAggregator {
    pub fn new(source: Box<dyn MetricSource>) -> Self {
        MetricsAggregator {
            source,
            sampler: RateSampler::new(),
        }
    }

    pub fn collect(&self, config: &RefreshConfig) -> MetricsSnapshot {
        let enabled = config.enabled;
        let _span =
            tracing::debug_span!("aggregator.collect", enabled = ?enabled.names()).entered();

        let cpu_percent = if enabled.contains(MetricKind::Cpu) {
            or_zero("cpu", self.source.cpu_percent())
        } else {
            0.0
        };
        let memory_percent = if enabled.contains(MetricKind::Memory) {
            or_zero("memory", self.source.memory_percent())
        } else {
            0.0
        };
        let disk_percent = if enabled.contains(MetricKind::Disk) {
            or_zero("disk", self.source.disk_percent())
        } else {
            0.0
        };

        // Sampled even when hidden so the rate baseline stays warm.
        let network = match self.source.network_counters() {
            Ok(sample) => {
                let priming = !self.sampler.has_prior();
                let rate = self.sampler.sample(sample);
                if priming {
                    tracing::debug!("network baseline primed, speeds start next pass");
                }
                rate
            }
            Err(err) => {
                tracing::warn!(metric = "network", error = %err, "collector failed");
                NetworkRate::default()
            }
        };

        MetricsSnapshot {
            cpu_percent,
            memory_percent,
            disk_percent,
            network,
        }
    }
}

fn or_zero(metric: &'static str, reading: Result<f64>) -> f64 {
    match reading {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(metric, error = %err, "collector failed");
            0.0
        }
    }
}
