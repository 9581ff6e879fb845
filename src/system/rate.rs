use std::sync::{Mutex, PoisonError};
use std::time::Instant;

const BYTES_PER_KB: f64 = 1024.0;

/// One read of the cumulative, non-loopback network byte counters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CounterSample {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub taken_at: Instant,
}

impl CounterSample {
    pub fn new(bytes_received: u64, bytes_sent: u64, taken_at: Instant) -> Self {
        Self {
            bytes_received,
            bytes_sent,
            taken_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NetworkRate {
    pub download_kbps: f64,
    pub upload_kbps: f64,
    pub total_download_kb: u64,
    pub total_upload_kb: u64,
}

impl NetworkRate {
    fn idle(sample: &CounterSample) -> Self {
        Self {
            download_kbps: 0.0,
            upload_kbps: 0.0,
            total_download_kb: sample.bytes_received / 1024,
            total_upload_kb: sample.bytes_sent / 1024,
        }
    }
}

#[derive(Debug, Default)]
struct SamplerState {
    prior: Option<CounterSample>,
    last_rate: Option<NetworkRate>,
}

/// Turns cumulative byte counters into KB/s throughput.
///
/// The sampler owns the previous sample. The first call only primes it and
/// reports zero speeds. A sample that is not strictly newer than the prior
/// one leaves the state untouched and returns the last computed rate. A
/// counter that went backwards reports zero for that direction.
#[derive(Debug, Default)]
pub struct RateSampler {
    state: Mutex<SamplerState>,
}

impl RateSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&self, current: CounterSample) -> NetworkRate {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(prior) = state.prior else {
            let rate = NetworkRate::idle(&current);
            state.prior = Some(current);
            state.last_rate = Some(rate);
            return rate;
        };

        let elapsed = match current.taken_at.checked_duration_since(prior.taken_at) {
            Some(d) if !d.is_zero() => d.as_secs_f64(),
            _ => {
                tracing::debug!("network sample not newer than prior, keeping last rate");
                return state.last_rate.unwrap_or_default();
            }
        };

        let download_kbps = per_second(
            "received",
            prior.bytes_received,
            current.bytes_received,
            elapsed,
        );
        let upload_kbps = per_second("sent", prior.bytes_sent, current.bytes_sent, elapsed);

        let rate = NetworkRate {
            download_kbps,
            upload_kbps,
            total_download_kb: current.bytes_received / 1024,
            total_upload_kb: current.bytes_sent / 1024,
        };
        state.prior = Some(current);
        state.last_rate = Some(rate);
        rate
    }

    pub fn has_prior(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .prior
            .is_some()
    }
}

fn per_second(direction: &str, prior: u64, current: u64, elapsed_secs: f64) -> f64 {
    match current.checked_sub(prior) {
        Some(delta) => delta as f64 / BYTES_PER_KB / elapsed_secs,
        None => {
            tracing::warn!(
                direction,
                prior,
                current,
                "network byte counter went backwards, reporting zero throughput"
            );
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn at(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn first_sample_reports_zero_speed_with_totals() {
        let sampler = RateSampler::new();
        let rate = sampler.sample(CounterSample::new(4096, 2048, Instant::now()));
        assert_eq!(rate.download_kbps, 0.0);
        assert_eq!(rate.upload_kbps, 0.0);
        assert_eq!(rate.total_download_kb, 4);
        assert_eq!(rate.total_upload_kb, 2);
        assert!(sampler.has_prior());
    }

    #[test]
    fn computes_kb_per_second_over_one_second() {
        let base = Instant::now();
        let sampler = RateSampler::new();
        sampler.sample(CounterSample::new(1000, 500, base));
        let rate = sampler.sample(CounterSample::new(11192, 1524, at(base, 1000)));
        assert!((rate.download_kbps - 9.953125).abs() < 1e-9);
        assert!((rate.upload_kbps - 1.0).abs() < 1e-9);
        assert_eq!(rate.total_download_kb, 10);
        assert_eq!(rate.total_upload_kb, 1);
    }

    #[test]
    fn irregular_interval_divides_by_actual_elapsed() {
        let base = Instant::now();
        let sampler = RateSampler::new();
        sampler.sample(CounterSample::new(0, 0, base));
        let rate = sampler.sample(CounterSample::new(10_240, 5_120, at(base, 2500)));
        assert!((rate.download_kbps - 4.0).abs() < 1e-9);
        assert!((rate.upload_kbps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn same_timestamp_returns_previous_rate() {
        let base = Instant::now();
        let sampler = RateSampler::new();
        sampler.sample(CounterSample::new(0, 0, base));
        let first = sampler.sample(CounterSample::new(2048, 1024, at(base, 1000)));
        let repeated = sampler.sample(CounterSample::new(999_999, 999_999, at(base, 1000)));
        assert_eq!(first, repeated);

        // Prior was not replaced by the rejected sample.
        let next = sampler.sample(CounterSample::new(4096, 2048, at(base, 2000)));
        assert!((next.download_kbps - 2.0).abs() < 1e-9);
        assert!((next.upload_kbps - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_timestamp_after_cold_start_keeps_totals() {
        let now = Instant::now();
        let sampler = RateSampler::new();
        let cold = sampler.sample(CounterSample::new(1 << 20, 2048, now));
        let rate = sampler.sample(CounterSample::new(5 << 20, 5 << 20, now));
        assert_eq!(rate, cold);
        assert_eq!(rate.download_kbps, 0.0);
        assert_eq!(rate.total_download_kb, 1024);
        assert_eq!(rate.total_upload_kb, 2);
    }

    #[test]
    fn reordered_sample_is_ignored() {
        let base = Instant::now();
        let sampler = RateSampler::new();
        sampler.sample(CounterSample::new(4096, 2048, at(base, 5000)));
        let rate = sampler.sample(CounterSample::new(1024, 1024, base));
        assert_eq!(rate.download_kbps, 0.0);
        assert_eq!(rate.upload_kbps, 0.0);
        assert_eq!(rate.total_download_kb, 4);
        assert_eq!(rate.total_upload_kb, 2);

        // The baseline is still the later sample.
        let next = sampler.sample(CounterSample::new(4096 + 1024, 2048, at(base, 6000)));
        assert!((next.download_kbps - 1.0).abs() < 1e-9);
    }

    #[test]
    fn counter_regression_clamps_only_that_direction() {
        let base = Instant::now();
        let sampler = RateSampler::new();
        sampler.sample(CounterSample::new(50_000, 1000, base));
        let rate = sampler.sample(CounterSample::new(100, 3048, at(base, 1000)));
        assert_eq!(rate.download_kbps, 0.0);
        assert!((rate.upload_kbps - 2.0).abs() < 1e-9);

        // The regressed reading becomes the new baseline.
        let after = sampler.sample(CounterSample::new(1124, 3048, at(base, 2000)));
        assert!((after.download_kbps - 1.0).abs() < 1e-9);
    }

    #[test]
    fn concurrent_callers_never_see_negative_rates() {
        let base = Instant::now();
        let sampler = Arc::new(RateSampler::new());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let sampler = Arc::clone(&sampler);
                std::thread::spawn(move || {
                    (0..250u64)
                        .map(|i| {
                            let step = i * 4 + t;
                            sampler.sample(CounterSample::new(
                                step * 1024,
                                step * 512,
                                at(base, step * 10),
                            ))
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for rate in handle.join().unwrap() {
                assert!(rate.download_kbps >= 0.0);
                assert!(rate.upload_kbps >= 0.0);
                assert!(rate.download_kbps.is_finite());
            }
        }
    }
}
