mod collectors;
mod config;
mod format;
mod reporter;
mod snapshot;

use clap::Parser;
use collectors::collect_snapshot;
use collectors::network::sample_throughput;
use collectors::system::SysinfoProbe;
use config::{Config, ReportingConfig};
use format::format_bytes;
use reporter::Reporter;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostsnap")]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    /// Print one snapshot and exit.
    #[arg(long)]
    once: bool,
    #[arg(long, conflicts_with = "reporting_off")]
    reporting_on: bool,
    #[arg(long, conflicts_with = "reporting_on")]
    reporting_off: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "не удалось загрузить конфигурацию");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if cli.reporting_on {
        cfg.reporting.enabled = true;
    } else if cli.reporting_off {
        cfg.reporting.enabled = false;
    }
    if let Err(err) = cfg.validate() {
        error!(error = %err, "некорректная конфигурация");
        std::process::exit(1);
    }

    info!(
        interval = %humantime::format_duration(cfg.interval),
        reporting = cfg.reporting.enabled,
        "запуск hostsnap"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut probe = SysinfoProbe::new();
    let mut shutdown = shutdown_rx.clone();
    match collect_snapshot(&mut probe, cfg.interval, &mut shutdown).await {
        Ok(snapshot) => match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{text}"),
            Err(err) => error!(error = %err, "не удалось закодировать снимок в JSON"),
        },
        Err(err) => info!(error = %err, "снимок не собран"),
    }
    if cli.once {
        return;
    }

    let mut tasks: Vec<JoinHandle<()>> =
        vec![spawn_throughput_loop(probe, cfg.interval, shutdown)];
    if cfg.reporting.enabled {
        let reporter = Reporter::new(cfg.reporting.timeout);
        tasks.push(spawn_snapshot_reports(
            reporter.clone(),
            cfg.reporting.clone(),
            cfg.interval,
            shutdown_rx.clone(),
        ));
        tasks.push(spawn_heartbeats(
            reporter,
            cfg.reporting.clone(),
            shutdown_rx.clone(),
        ));
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "не удалось дождаться Ctrl+C");
    }
    info!("получен Ctrl+C, выполняется остановка");

    let _ = shutdown_tx.send(true);

    for task in tasks {
        let _ = task.await;
    }
}

fn spawn_throughput_loop(
    mut probe: SysinfoProbe,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(sample) = sample_throughput(&mut probe, interval, &mut shutdown).await {
            println!(
                "Upload: {}, Download: {}",
                format_bytes(sample.rate.upload_bytes_per_sec as u64),
                format_bytes(sample.rate.download_bytes_per_sec as u64)
            );
        }
        info!("цикл замера остановлен");
    })
}

fn spawn_snapshot_reports(
    reporter: Reporter,
    cfg: ReportingConfig,
    sample_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut probe = SysinfoProbe::new();
        let mut ticker = tokio::time::interval(cfg.report_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let collected =
                        collect_snapshot(&mut probe, sample_interval, &mut shutdown).await;
                    let Ok(snapshot) = collected else {
                        break;
                    };
                    let _ = reporter.report(&snapshot, &cfg.report_url).await;
                }
            }
        }
        info!("отправка снимков остановлена");
    })
}

fn spawn_heartbeats(
    reporter: Reporter,
    cfg: ReportingConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let _ = reporter.heartbeat(&cfg.heartbeat_url).await;
                }
            }
        }
        info!("отправка heartbeat остановлена");
    })
}

/// Logs go to stderr; stdout carries only the snapshot JSON and throughput lines.
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
