// solarman2mqtt - Collect PV data from the Solarman API and publish it to MQTT.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser};
use env_logger::{Builder, Env};

use solarman2mqtt::api;
use solarman2mqtt::config::Config;
use solarman2mqtt::daemon::{self, Daemon};
use solarman2mqtt::daylight::SunCalc;
use solarman2mqtt::publish::MqttSink;

/// Collect data from the Solarman API and publish it to MQTT.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Run as a service
    #[arg(short, long, conflicts_with = "single")]
    daemon: bool,

    /// Single run and exit
    #[arg(short, long)]
    single: bool,

    /// Run interval in seconds (default: poll_interval_secs from the config, else 300)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Config file (default: ./config.toml, then /etc/solarman2mqtt/config.toml)
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if !cli.daemon && !cli.single {
        Cli::command().write_help(&mut std::io::stderr())?;
        return Ok(());
    }

    // --- Configuration Loading ---
    let config_path = match cli.file {
        Some(path) => path,
        None => Config::locate()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    log::info!("--- Startup Configuration ---");
    log::info!("Using configuration from: {}", config_path.display());
    log::info!("API host: {}", config.account.url);
    log::info!("Topic prefix: {}", config.mqtt.topic);

    // --- Client Initialization ---
    let http = api::http_client()?;
    let sink = MqttSink::connect(&config.mqtt);

    if cli.single {
        let outcome = daemon::single_run(&config, http, sink)
            .await
            .context("single run failed")?;
        log::info!("single run finished: {outcome:?}");
        return Ok(());
    }

    let interval = cli.interval.map(Duration::from_secs);
    if let Some(interval) = interval {
        log::info!("Run interval: {}s", interval.as_secs());
    }
    let daemon = Daemon::new(config_path, interval, http, sink, SunCalc);
    let Err(e) = daemon.run().await;
    Err(e).context("daemon stopped")
}
