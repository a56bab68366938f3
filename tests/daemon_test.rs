// Daemon ticks: config reload, daylight gating and session reuse; single runs.

mod common;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tempfile::NamedTempFile;
use wiremock::MockServer;

use solarman2mqtt::Error;
use solarman2mqtt::config::Config;
use solarman2mqtt::daemon::{Daemon, single_run};
use solarman2mqtt::daylight::SunTimes;
use solarman2mqtt::pipeline::CycleOutcome;

use common::{
    ALL, RecordingSink, Toggles, config_toml, inverter_body, logger_body, mount_device,
    mount_station, mount_token, station_body,
};

/// Sunrise at 04:00 UTC and sunset at 18:30 UTC on every date.
struct FixedSun;

impl SunTimes for FixedSun {
    fn sunrise(&self, date: NaiveDate, _: f64, _: f64) -> Option<DateTime<Utc>> {
        Some(date.and_hms_opt(4, 0, 0)?.and_utc())
    }

    fn sunset(&self, date: NaiveDate, _: f64, _: f64) -> Option<DateTime<Utc>> {
        Some(date.and_hms_opt(18, 30, 0)?.and_utc())
    }
}

const BERLIN: &str = "latitude = 52.5\nlongitude = 13.4\npoll_interval_secs = 60";

fn at(time: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(time).unwrap()
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn daemon(path: PathBuf, interval: Option<Duration>) -> Daemon<RecordingSink, FixedSun> {
    Daemon::new(
        path,
        interval,
        reqwest::Client::new(),
        RecordingSink::default(),
        FixedSun,
    )
}

#[tokio::test]
async fn closed_gate_skips_the_cycle() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    mount_station(&server, station_body(), 0).await;

    let file = write_config(&config_toml(&server.uri(), &ALL, BERLIN));
    let mut daemon = daemon(file.path().to_path_buf(), None);

    let (interval, outcome) = daemon.tick_at(&at("2024-06-21T23:00:00+02:00")).await.unwrap();

    assert_eq!(interval, Duration::from_secs(60));
    assert_eq!(outcome, None);
    assert!(daemon.sink().messages().is_empty());
}

#[tokio::test]
async fn open_gate_runs_the_cycle_and_keeps_the_session() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_station(&server, station_body(), 2).await;
    mount_device(&server, "INV0001", inverter_body(1), 2).await;
    mount_device(&server, "LOG0001", logger_body(1), 2).await;

    let file = write_config(&config_toml(&server.uri(), &ALL, BERLIN));
    let mut daemon = daemon(file.path().to_path_buf(), None);

    let (_, first) = daemon.tick_at(&at("2024-06-21T12:00:00+02:00")).await.unwrap();
    let (_, second) = daemon.tick_at(&at("2024-06-21T12:05:00+02:00")).await.unwrap();

    assert_eq!(first, Some(CycleOutcome::Online { published: 11 }));
    assert_eq!(second, first);
    assert!(daemon.session().has_credential());
    assert_eq!(daemon.sink().messages().len(), 22);
}

#[tokio::test]
async fn no_location_always_polls() {
    let server = MockServer::start().await;
    let toggles = Toggles {
        station: false,
        inverter: false,
        logger: false,
    };
    let file = write_config(&config_toml(&server.uri(), &toggles, ""));
    let mut daemon = daemon(file.path().to_path_buf(), Some(Duration::from_secs(15)));

    let (interval, outcome) = daemon.tick_at(&at("2024-06-21T03:00:00+02:00")).await.unwrap();

    assert_eq!(interval, Duration::from_secs(15));
    assert_eq!(outcome, Some(CycleOutcome::NothingToFetch));
}

#[tokio::test]
async fn config_is_reloaded_every_tick() {
    let server = MockServer::start().await;
    let file = write_config(&config_toml(&server.uri(), &ALL, BERLIN));
    let mut daemon = daemon(file.path().to_path_buf(), None);

    let night = at("2024-06-21T23:00:00+02:00");
    let (interval, _) = daemon.tick_at(&night).await.unwrap();
    assert_eq!(interval, Duration::from_secs(60));

    let updated = BERLIN.replace("poll_interval_secs = 60", "poll_interval_secs = 120");
    std::fs::write(file.path(), config_toml(&server.uri(), &ALL, &updated)).unwrap();

    let (interval, _) = daemon.tick_at(&night).await.unwrap();
    assert_eq!(interval, Duration::from_secs(120));
}

#[tokio::test]
async fn broken_config_ends_the_tick_with_an_error() {
    let file = write_config("this is = not [valid toml");
    let mut daemon = daemon(file.path().to_path_buf(), None);

    let result = daemon.tick_at(&at("2024-06-21T12:00:00+02:00")).await;
    assert!(matches!(result, Err(Error::Config(_))), "got: {result:?}");

    let mut daemon = self::daemon(PathBuf::from("/nonexistent/config.toml"), None);
    let result = daemon.tick_at(&at("2024-06-21T12:00:00+02:00")).await;
    assert!(matches!(result, Err(Error::Config(_))), "got: {result:?}");
}

#[tokio::test]
async fn fetch_error_ends_the_tick_with_an_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    let file = write_config(&config_toml(&server.uri(), &ALL, BERLIN));
    let mut daemon = daemon(file.path().to_path_buf(), None);

    let result = daemon.tick_at(&at("2024-06-21T12:00:00+02:00")).await;
    assert!(matches!(result, Err(Error::Fetch(_))), "got: {result:?}");
}

#[tokio::test]
async fn single_run_publishes_and_closes_the_sink() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_station(&server, station_body(), 1).await;
    mount_device(&server, "INV0001", inverter_body(1), 1).await;
    mount_device(&server, "LOG0001", logger_body(1), 1).await;

    // the location is set, but a single run never consults the daylight gate
    let config: Config = config_toml(&server.uri(), &ALL, BERLIN).parse().unwrap();
    let sink = RecordingSink::default();

    let outcome = single_run(&config, reqwest::Client::new(), sink.clone())
        .await
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Online { published: 11 });
    assert_eq!(sink.messages().len(), 11);
    assert!(sink.is_closed());
}

#[tokio::test]
async fn failed_single_run_still_closes_the_sink() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    let config: Config = config_toml(&server.uri(), &ALL, "").parse().unwrap();
    let sink = RecordingSink::default();

    let result = single_run(&config, reqwest::Client::new(), sink.clone()).await;

    assert!(matches!(result, Err(Error::Fetch(_))), "got: {result:?}");
    assert!(sink.messages().is_empty());
    assert!(sink.is_closed());
}
