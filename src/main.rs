use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use crossterm::event::KeyEventKind;
use tokio::sync::watch;

use traymon::app::App;
use traymon::config::Settings;
use traymon::display::{ChannelBinding, DirectBinding, LogTray, TrayBackend};
use traymon::event::{Event, EventHandler};
use traymon::logging::{self, LogOptions, LogTarget};
use traymon::scheduler::RefreshScheduler;
use traymon::system::aggregator::MetricsAggregator;
use traymon::system::source::SysinfoSource;
use traymon::ui::TerminalTray;

/// Housekeeping tick for status expiry; metrics are pushed by the scheduler.
const UI_TICK: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(
    name = "traymon",
    about = "Tray system monitor for CPU, memory, disk and network throughput"
)]
struct Cli {
    /// Path to config file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh interval in seconds, overriding the config for this run
    #[arg(long)]
    refresh_interval: Option<u32>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Run without the terminal panel; every update is logged.
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Headless only: exit after this many published updates.
    #[arg(long)]
    passes: Option<u64>,

    /// Log file path. Defaults to the cache dir in interactive mode.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(&log_options(&cli))?;

    let settings = Settings::open(cli.config.clone());
    if let Some(secs) = cli.refresh_interval {
        settings.update(|c| c.general.refresh_interval_secs = secs);
    }
    tracing::info!(
        path = ?settings.path(),
        interval_secs = settings.interval_secs(),
        "settings loaded"
    );

    let source = SysinfoSource::new(&settings.current().general);
    let aggregator = Arc::new(MetricsAggregator::new(Box::new(source)));

    if cli.headless {
        run_headless(aggregator, settings, cli.passes).await
    } else {
        run_interactive(aggregator, settings).await
    }
}

fn log_options(cli: &Cli) -> LogOptions {
    let target = match (&cli.log_file, cli.headless) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, true) => LogTarget::Stderr,
        (None, false) => match logging::default_log_path() {
            Some(path) => LogTarget::File(path),
            None => LogTarget::Stderr,
        },
    };
    LogOptions {
        debug: cli.debug,
        json: cli.log_json,
        target,
    }
}

async fn run_interactive(aggregator: Arc<MetricsAggregator>, settings: Settings) -> Result<()> {
    let mut events = EventHandler::new(UI_TICK);
    let binding = Arc::new(ChannelBinding::new(events.sender()));
    let mut scheduler = RefreshScheduler::new(aggregator, settings.clone(), binding);

    let mut tray = TerminalTray::new(App::new(settings.clone(), scheduler.signal()));
    tray.start()?;
    scheduler.start(settings.interval_secs())?;

    let result = event_loop(&mut tray, &mut events).await;

    scheduler.stop().await;
    tray.stop()?;
    result
}

async fn event_loop(tray: &mut TerminalTray, events: &mut EventHandler) -> Result<()> {
    while tray.app().running {
        let Some(event) = events.next().await else {
            return Err(eyre!("event stream closed"));
        };
        match event {
            Event::Key(key) => {
                if key.kind == KeyEventKind::Press {
                    let app = tray.app_mut();
                    let action = app.map_key(key);
                    app.dispatch(action);
                    tray.draw()?;
                }
            }
            Event::Metrics(snapshot) => tray.update_metrics(&snapshot),
            Event::Tick => {
                tray.app_mut().on_tick();
                tray.draw()?;
            }
            Event::Resize => tray.draw()?,
        }
    }
    Ok(())
}

async fn run_headless(
    aggregator: Arc<MetricsAggregator>,
    settings: Settings,
    passes: Option<u64>,
) -> Result<()> {
    let (mut tray, progress) = LogTray::new(settings.clone());
    tray.start()?;
    let binding = Arc::new(DirectBinding::new(tray));
    let mut scheduler = RefreshScheduler::new(aggregator, settings.clone(), binding.clone());

    let outcome = scheduler
        .run_until(settings.interval_secs(), wait_for_exit(progress, passes))
        .await;
    let stopped = binding.with_backend(|tray| tray.stop());
    outcome.and(stopped)
}

/// Resolves after `passes` tray updates, or on Ctrl+C when unbounded.
async fn wait_for_exit(mut progress: watch::Receiver<u64>, passes: Option<u64>) -> Result<()> {
    match passes {
        Some(target) => {
            tokio::select! {
                done = progress.wait_for(|n| *n >= target) => {
                    done.wrap_err("headless tray went away")?;
                    tracing::info!(passes = target, "requested passes completed");
                }
                signal = tokio::signal::ctrl_c() => signal.wrap_err("failed to listen for ctrl-c")?,
            }
        }
        None => tokio::signal::ctrl_c()
            .await
            .wrap_err("failed to listen for ctrl-c")?,
    }
    Ok(())
}
