use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use tokio::time::{self, Instant};
use traymon::config::{Config, Settings};
use traymon::display::{DirectBinding, DisplayBinding, LogTray};
use traymon::scheduler::{RefreshScheduler, SchedulerState};
use traymon::system::aggregator::MetricsAggregator;
use traymon::system::rate::CounterSample;
use traymon::system::snapshot::MetricsSnapshot;
use traymon::system::source::MetricSource;

#[derive(Default)]
struct StaticSource {
    disk_fails: bool,
}

impl MetricSource for StaticSource {
    fn cpu_percent(&self) -> Result<f64> {
        Ok(12.5)
    }

    fn memory_percent(&self) -> Result<f64> {
        Ok(40.0)
    }

    fn disk_percent(&self) -> Result<f64> {
        if self.disk_fails {
            Err(eyre!("mount point not found"))
        } else {
            Ok(55.0)
        }
    }

    fn network_counters(&self) -> Result<CounterSample> {
        Ok(CounterSample::new(0, 0, std::time::Instant::now()))
    }
}

/// Announces entry into a pass, then takes a while to finish it.
struct SlowSource {
    entered: Mutex<std_mpsc::Sender<()>>,
    delay: Duration,
}

impl MetricSource for SlowSource {
    fn cpu_percent(&self) -> Result<f64> {
        let _ = self.entered.lock().unwrap().send(());
        std::thread::sleep(self.delay);
        Ok(1.0)
    }

    fn memory_percent(&self) -> Result<f64> {
        Ok(0.0)
    }

    fn disk_percent(&self) -> Result<f64> {
        Ok(0.0)
    }

    fn network_counters(&self) -> Result<CounterSample> {
        Ok(CounterSample::new(0, 0, std::time::Instant::now()))
    }
}

struct Recorder {
    started: Instant,
    published: Mutex<Vec<(Duration, MetricsSnapshot)>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Recorder {
            started: Instant::now(),
            published: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// Publish times rounded to whole seconds since the recorder was built.
    fn seconds(&self) -> Vec<u64> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| at.as_secs_f64().round() as u64)
            .collect()
    }
}

impl DisplayBinding for Recorder {
    fn publish(&self, snapshot: MetricsSnapshot) {
        self.published
            .lock()
            .unwrap()
            .push((self.started.elapsed(), snapshot));
    }
}

fn settings_with_interval(secs: u32) -> Settings {
    let mut config = Config::default();
    config.general.refresh_interval_secs = secs;
    Settings::in_memory(config)
}

fn scheduler(
    source: impl MetricSource + 'static,
    settings: &Settings,
    display: Arc<dyn DisplayBinding>,
) -> RefreshScheduler {
    let aggregator = Arc::new(MetricsAggregator::new(Box::new(source)));
    RefreshScheduler::new(aggregator, settings.clone(), display)
}

#[tokio::test(start_paused = true)]
async fn publishes_immediately_then_every_interval() {
    let settings = settings_with_interval(2);
    let recorder = Recorder::new();
    let mut scheduler = scheduler(StaticSource::default(), &settings, recorder.clone());

    scheduler.start(settings.interval_secs()).unwrap();
    time::sleep(Duration::from_millis(10_100)).await;
    scheduler.stop().await;

    assert_eq!(recorder.seconds(), vec![0, 2, 4, 6, 8, 10]);
}

#[tokio::test(start_paused = true)]
async fn interval_change_runs_a_pass_and_restarts_the_timer() {
    let settings = settings_with_interval(10);
    let recorder = Recorder::new();
    let mut scheduler = scheduler(StaticSource::default(), &settings, recorder.clone());
    let signal = scheduler.signal();

    scheduler.start(settings.interval_secs()).unwrap();
    time::sleep(Duration::from_secs(3)).await;
    settings.update(|c| c.general.refresh_interval_secs = 2);
    assert!(signal.notify());

    time::sleep(Duration::from_millis(7_500)).await;
    scheduler.stop().await;

    assert_eq!(recorder.seconds(), vec![0, 3, 5, 7, 9]);
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_coalesces_into_one_pass() {
    let settings = settings_with_interval(30);
    let recorder = Recorder::new();
    let mut scheduler = scheduler(StaticSource::default(), &settings, recorder.clone());
    let signal = scheduler.signal();

    scheduler.start(settings.interval_secs()).unwrap();
    time::sleep(Duration::from_secs(1)).await;
    signal.notify();
    signal.notify();
    signal.notify();
    time::sleep(Duration::from_secs(1)).await;
    scheduler.stop().await;

    assert_eq!(recorder.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failing_disk_publishes_zero_for_disk_only() {
    let settings = Settings::in_memory(Config::default());
    let recorder = Recorder::new();
    let mut scheduler = scheduler(
        StaticSource { disk_fails: true },
        &settings,
        recorder.clone(),
    );

    scheduler.start(settings.interval_secs()).unwrap();
    time::sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    let published = recorder.published.lock().unwrap();
    let (_, snapshot) = published[0];
    assert_eq!(snapshot.disk_percent, 0.0);
    assert_eq!(snapshot.cpu_percent, 12.5);
    assert_eq!(snapshot.memory_percent, 40.0);
}

#[tokio::test]
async fn stop_waits_for_in_flight_pass() {
    let (entered_tx, entered_rx) = std_mpsc::channel();
    let source = SlowSource {
        entered: Mutex::new(entered_tx),
        delay: Duration::from_millis(300),
    };
    let settings = settings_with_interval(60);
    let recorder = Recorder::new();
    let mut scheduler = scheduler(source, &settings, recorder.clone());

    scheduler.start(settings.interval_secs()).unwrap();
    while entered_rx.try_recv().is_err() {
        time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(recorder.count(), 0);

    scheduler.stop().await;
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(recorder.count(), 1);

    time::sleep(Duration::from_millis(400)).await;
    assert_eq!(recorder.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn headless_tray_reports_progress() {
    let settings = settings_with_interval(1);
    let (tray, mut progress) = LogTray::new(settings.clone());
    let binding = Arc::new(DirectBinding::new(tray));
    let mut scheduler = scheduler(StaticSource::default(), &settings, binding.clone());

    scheduler.start(settings.interval_secs()).unwrap();
    progress.wait_for(|n| *n >= 3).await.unwrap();
    scheduler.stop().await;

    assert_eq!(binding.with_backend(|t| t.updates()), 3);
}

#[tokio::test(start_paused = true)]
async fn headless_run_stops_after_requested_passes() {
    let settings = settings_with_interval(1);
    let (tray, mut progress) = LogTray::new(settings.clone());
    let binding = Arc::new(DirectBinding::new(tray));
    let mut scheduler = scheduler(StaticSource::default(), &settings, binding.clone());

    let until = async move {
        progress.wait_for(|n| *n >= 2).await?;
        Ok::<_, color_eyre::Report>(())
    };
    scheduler.run_until(settings.interval_secs(), until).await.unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    time::sleep(Duration::from_secs(3)).await;
    assert_eq!(binding.with_backend(|t| t.updates()), 2);
}
