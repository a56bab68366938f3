use std::convert::Infallible;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::time::sleep;

use crate::api::ApiClient;
use crate::auth::Session;
use crate::config::Config;
use crate::daylight::{self, SunTimes};
use crate::error::Result;
use crate::pipeline::{self, CycleOutcome};
use crate::publish::Publish;

/// Runs exactly one cycle, without asking the daylight gate, then closes the
/// sink so queued messages are flushed. The sink is closed on errors too.
pub async fn single_run<P: Publish>(
    config: &Config,
    http: reqwest::Client,
    sink: P,
) -> Result<CycleOutcome> {
    let api = ApiClient::new(http, &config.account.url);
    let mut session = Session::new();
    let outcome = pipeline::run_cycle(config, &api, &mut session, &sink).await;
    sink.close().await;
    outcome
}

/// Long running poll loop.
///
/// Every tick reloads the configuration, asks the daylight gate and runs a
/// cycle when it is open. The session and the message sink live across
/// ticks; any error ends the loop.
pub struct Daemon<P, S> {
    config_path: PathBuf,
    interval: Option<Duration>,
    http: reqwest::Client,
    session: Session,
    sink: P,
    sun: S,
}

impl<P: Publish, S: SunTimes> Daemon<P, S> {
    /// `interval` overrides the configured poll interval when given.
    pub fn new(
        config_path: PathBuf,
        interval: Option<Duration>,
        http: reqwest::Client,
        sink: P,
        sun: S,
    ) -> Self {
        Self {
            config_path,
            interval,
            http,
            session: Session::new(),
            sink,
            sun,
        }
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Loops until a tick fails and returns that error.
    pub async fn run(mut self) -> Result<Infallible> {
        log::info!(
            "Starting daemonized with config {}",
            self.config_path.display()
        );
        loop {
            let interval = self.tick().await?;
            log::debug!("sleeping {}s", interval.as_secs());
            sleep(interval).await;
        }
    }

    pub async fn tick(&mut self) -> Result<Duration> {
        self.tick_at(&Local::now()).await.map(|(interval, _)| interval)
    }

    /// One tick evaluated at `now`. Returns the time to sleep before the next
    /// tick and the cycle outcome, `None` when the gate was closed.
    pub async fn tick_at<Tz>(
        &mut self,
        now: &DateTime<Tz>,
    ) -> Result<(Duration, Option<CycleOutcome>)>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let config = Config::load(&self.config_path)?;
        let interval = self.interval.unwrap_or_else(|| config.poll_interval());

        if !daylight::is_active(&config, now, &self.sun) {
            return Ok((interval, None));
        }

        let api = ApiClient::new(self.http.clone(), &config.account.url);
        let outcome = pipeline::run_cycle(&config, &api, &mut self.session, &self.sink).await?;
        log::debug!("cycle finished: {outcome:?}");
        Ok((interval, Some(outcome)))
    }
}
