use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, bail};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::Instrument;

use crate::config::{Settings, interval_from_secs};
use crate::display::DisplayBinding;
use crate::system::aggregator::MetricsAggregator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Single-slot "interval changed" notification. A notification sent while
/// one is still pending is dropped: the worker re-reads the settings anyway.
#[derive(Debug, Clone)]
pub struct IntervalSignal {
    tx: mpsc::Sender<()>,
}

impl IntervalSignal {
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Returns `false` when the notification was coalesced into a pending one
    /// or the scheduler is gone.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => {
                tracing::debug!("interval change signalled");
                true
            }
            Err(TrySendError::Full(())) => {
                tracing::debug!("interval change already pending");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

/// Drives collect-and-publish passes on one background task.
///
/// `start` runs a pass immediately and then every interval. An interval
/// change restarts the timer at the new cadence and runs a pass right away.
/// Passes never overlap. `stop` waits for an in-flight pass to publish, and
/// nothing is published after it returns.
pub struct RefreshScheduler {
    state: SchedulerState,
    aggregator: Arc<MetricsAggregator>,
    settings: Settings,
    display: Arc<dyn DisplayBinding>,
    signal: IntervalSignal,
    changes: Option<mpsc::Receiver<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn new(
        aggregator: Arc<MetricsAggregator>,
        settings: Settings,
        display: Arc<dyn DisplayBinding>,
    ) -> Self {
        let (signal, changes) = IntervalSignal::channel();
        RefreshScheduler {
            state: SchedulerState::Idle,
            aggregator,
            settings,
            display,
            signal,
            changes: Some(changes),
            shutdown: None,
            worker: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn signal(&self) -> IntervalSignal {
        self.signal.clone()
    }

    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, initial_interval_secs: u32) -> Result<()> {
        if self.state != SchedulerState::Idle {
            bail!("refresh scheduler cannot start while {:?}", self.state);
        }
        let Some(changes) = self.changes.take() else {
            bail!("refresh scheduler was already started once");
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = Worker {
            aggregator: Arc::clone(&self.aggregator),
            settings: self.settings.clone(),
            display: Arc::clone(&self.display),
        };
        let period = interval_from_secs(initial_interval_secs);
        self.worker = Some(tokio::spawn(worker.run(period, changes, shutdown_rx)));
        self.shutdown = Some(shutdown_tx);
        self.state = SchedulerState::Running;
        tracing::info!(
            interval_secs = period.as_secs(),
            "refresh scheduler started"
        );
        Ok(())
    }

    /// Runs until `until` resolves, then stops whether it succeeded or not.
    pub async fn run_until<F>(&mut self, initial_interval_secs: u32, until: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        self.start(initial_interval_secs)?;
        let outcome = until.await;
        self.stop().await;
        outcome
    }

    pub async fn stop(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        self.state = SchedulerState::Stopped;
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take()
            && let Err(err) = worker.await
        {
            tracing::error!(error = %err, "refresh worker ended abnormally");
        }
        tracing::info!("refresh scheduler stopped");
    }
}

struct Worker {
    aggregator: Arc<MetricsAggregator>,
    settings: Settings,
    display: Arc<dyn DisplayBinding>,
}

impl Worker {
    async fn run(
        self,
        period: Duration,
        mut changes: mpsc::Receiver<()>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        self.pass("startup").await;
        let mut ticker = new_ticker(period);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(()) = changes.recv() => {
                    let period = self.settings.refresh_config().interval();
                    ticker = new_ticker(period);
                    tracing::info!(interval_secs = period.as_secs(), "refresh interval updated");
                    self.pass("settings").await;
                }
                _ = ticker.tick() => self.pass("tick").await,
            }
        }
    }

    async fn pass(&self, trigger: &'static str) {
        let aggregator = Arc::clone(&self.aggregator);
        let config = self.settings.refresh_config();
        let collected = tokio::task::spawn_blocking(move || aggregator.collect(&config))
            .instrument(tracing::debug_span!("scheduler.pass", trigger))
            .await;
        match collected {
            Ok(snapshot) => {
                tracing::debug!(
                    trigger,
                    cpu = snapshot.cpu_percent,
                    memory = snapshot.memory_percent,
                    disk = snapshot.disk_percent,
                    down_kbps = snapshot.network.download_kbps,
                    up_kbps = snapshot.network.upload_kbps,
                    "publishing snapshot"
                );
                self.display.publish(snapshot);
            }
            Err(err) => tracing::error!(trigger, error = %err, "collection pass panicked"),
        }
    }
}

/// First tick lands one full period from now.
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
