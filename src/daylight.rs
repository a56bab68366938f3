//! Daylight gate: only poll between sunrise and sunset, widened by a margin.

use std::fmt::Display;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use sun::SunPhase;

use crate::config::Config;

/// Source of sunrise and sunset instants for a calendar date and location.
pub trait SunTimes {
    fn sunrise(&self, date: NaiveDate, latitude: f64, longitude: f64) -> Option<DateTime<Utc>>;
    fn sunset(&self, date: NaiveDate, latitude: f64, longitude: f64) -> Option<DateTime<Utc>>;
}

/// [`SunTimes`] computed with the `sun` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SunCalc;

impl SunTimes for SunCalc {
    fn sunrise(&self, date: NaiveDate, latitude: f64, longitude: f64) -> Option<DateTime<Utc>> {
        phase_time(date, SunPhase::Sunrise, latitude, longitude)
    }

    fn sunset(&self, date: NaiveDate, latitude: f64, longitude: f64) -> Option<DateTime<Utc>> {
        phase_time(date, SunPhase::Sunset, latitude, longitude)
    }
}

fn phase_time(
    date: NaiveDate,
    phase: SunPhase,
    latitude: f64,
    longitude: f64,
) -> Option<DateTime<Utc>> {
    // Anchor on the approximate solar noon of `date` so the calculation picks
    // that day's solar transit.
    let noon_offset = TimeDelta::seconds((longitude * 240.0).round() as i64);
    let noon = date.and_hms_opt(12, 0, 0)?.and_utc() - noon_offset;

    let ms = sun::time_at_phase(noon.timestamp_millis(), phase, latitude, longitude, 0.0);
    let time = DateTime::from_timestamp_millis(ms)?;

    // no sunrise or sunset at all (polar day or night) yields garbage
    ((time - noon).abs() < TimeDelta::hours(12)).then_some(time)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationalWindow<Tz: TimeZone> {
    pub sunrise: DateTime<Tz>,
    pub sunset: DateTime<Tz>,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> OperationalWindow<Tz> {
    /// Both ends are inclusive.
    pub fn contains(&self, now: &DateTime<Tz>) -> bool {
        self.start <= *now && *now <= self.end
    }
}

/// Window for the calendar day of `now` in its own timezone, or `None` when
/// the sun does not rise or set there that day.
pub fn operational_window<Tz: TimeZone>(
    config: &Config,
    now: &DateTime<Tz>,
    sun: &impl SunTimes,
) -> Option<OperationalWindow<Tz>> {
    let date = now.date_naive();
    let tz = now.timezone();
    let sunrise = sun
        .sunrise(date, config.latitude, config.longitude)?
        .with_timezone(&tz);
    let sunset = sun
        .sunset(date, config.latitude, config.longitude)?
        .with_timezone(&tz);

    let margin = TimeDelta::minutes(i64::from(config.sun_margin_minutes));
    Some(OperationalWindow {
        start: sunrise.clone() - margin,
        end: sunset.clone() + margin,
        sunrise,
        sunset,
    })
}

/// Decides whether a polling cycle should run at `now`.
///
/// Without a configured location (latitude and longitude both 0.0) the gate
/// is always open.
pub fn is_active<Tz>(config: &Config, now: &DateTime<Tz>, sun: &impl SunTimes) -> bool
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if !config.has_location() {
        return true;
    }

    let Some(window) = operational_window(config, now, sun) else {
        log::warn!(
            "no sunrise/sunset at {}, {} on {}, polling anyway",
            config.latitude,
            config.longitude,
            now.date_naive()
        );
        return true;
    };

    let active = window.contains(now);
    let margin = config.sun_margin_minutes;
    log::info!("Current system time:      {}", now.format("%Y-%m-%d %H:%M:%S %Z"));
    log::info!(
        "Sunrise-Sunset:           {} - {}",
        window.sunrise.format("%H:%M:%S"),
        window.sunset.format("%H:%M:%S")
    );
    log::info!(
        "Operational window start: {} (margin: -{margin}m)",
        window.start.format("%H:%M:%S")
    );
    log::info!(
        "Operational window end:   {} (margin: +{margin}m)",
        window.end.format("%H:%M:%S")
    );
    log::info!(
        "Status:                   {}",
        if active {
            "WITHIN_OPERATIONAL_WINDOW"
        } else {
            "OUTSIDE_OPERATIONAL_WINDOW"
        }
    );
    active
}
