//! portwatch - TCP port monitor
//!
//! Probes every configured target over IPv4 and/or IPv6, posts a Discord
//! alert when one goes down or comes back, and keeps an `mtr` trace of every
//! timeout.

mod clock;
mod config;
mod logging;
mod monitor;
mod notify;
mod probe;
mod supervisor;
mod trace;

use clock::Clock;
use config::{Settings, DEFAULT_CONFIG_PATH};
use logging::{LogSink, DEFAULT_LOG_PATH, MAX_LOG_SIZE};
use monitor::{MonitorContext, MonitorSettings};
use notify::{resolve_hostname, WebhookNotifier};
use probe::TcpProber;
use supervisor::Supervisor;
use trace::MtrTracer;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "portwatch", version, about = "TCP port monitor with Discord alerts")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_path =
        std::env::var("PORTWATCH_LOG_PATH").unwrap_or_else(|_| DEFAULT_LOG_PATH.to_string());
    let sink = match LogSink::open(&log_path, MAX_LOG_SIZE) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("cannot set up log file {}: {}", log_path, e);
            return ExitCode::FAILURE;
        }
    };

    // The zone is needed before logging starts so every line is stamped in it;
    // config errors are reported once the subscriber is up.
    let settings = Settings::load(&cli.config);
    let zone = settings
        .as_ref()
        .map(|s| s.timezone)
        .unwrap_or(clock::DEFAULT_TIMEZONE);
    let clock = Clock::new(zone);

    if let Err(e) = logging::init(sink, clock.clone()) {
        eprintln!("cannot initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("cannot load config {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(settings, clock).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    settings: Settings,
    clock: Clock,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!(
        "starting port monitor: targets={} delay={}s timeout={}s timezone={}",
        settings.targets.len(),
        settings.interval.as_secs(),
        settings.timeout.as_secs(),
        clock.zone()
    );

    let hostname = resolve_hostname(settings.hostname.as_deref());
    let notifier = WebhookNotifier::new(&settings.webhook, hostname)?;
    tracing::info!("Alerts will be reported as host {}", notifier.hostname());

    let trace_dir = settings.trace_dir.clone().unwrap_or_else(trace::default_trace_dir);
    tracing::info!("Saving mtr traces to {}", trace_dir.display());

    let context = Arc::new(MonitorContext {
        settings: MonitorSettings {
            interval: settings.interval,
            timeout: settings.timeout,
            trace_dir,
            clock,
        },
        prober: Arc::new(TcpProber),
        tracer: Arc::new(MtrTracer::default()),
        notifier: Arc::new(notifier),
    });

    let supervisor = Supervisor::start(settings.targets, context)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down {} monitors", supervisor.len());
    supervisor.shutdown().await;

    Ok(())
}
