//! One poll cycle: fetch, flatten, publish.

use serde_json::Value;

use crate::api::ApiClient;
use crate::auth::Session;
use crate::config::{Config, Devices};
use crate::error::Result;
use crate::publish::{Publish, encode_payload};
use crate::transform::{AttributeMap, RawResponse, restructure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Station,
    Inverter,
    Logger,
}

impl Module {
    pub fn as_str(self) -> &'static str {
        match self {
            Module::Station => "station",
            Module::Inverter => "inverter",
            Module::Logger => "logger",
        }
    }

    fn enabled(self, devices: &Devices) -> bool {
        match self {
            Module::Station => devices.fetch_station,
            Module::Inverter => devices.fetch_inverter,
            Module::Logger => devices.fetch_logger,
        }
    }
}

/// What a cycle ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Every module is disabled; no call was made.
    NothingToFetch,
    Online { published: usize },
    Offline { device_state: Value, published: usize },
}

struct Emitter<'a, P> {
    sink: &'a P,
    prefix: &'a str,
    published: usize,
}

impl<P: Publish> Emitter<'_, P> {
    async fn emit(&mut self, module: Module, field: &str, payload: String) {
        let topic = format!("{}/{}/{field}", self.prefix, module.as_str());
        match self.sink.publish(&topic, payload).await {
            Ok(()) => {
                log::debug!("published {topic}");
                self.published += 1;
            }
            Err(e) => log::warn!("MQTT publish to {topic} failed: {e:?}"),
        }
    }
}

/// Runs one fetch/transform/publish cycle.
///
/// Fetch and authentication errors abort the cycle and are returned; failed
/// publishes are logged and skipped.
pub async fn run_cycle<P: Publish>(
    config: &Config,
    api: &ApiClient,
    session: &mut Session,
    sink: &P,
) -> Result<CycleOutcome> {
    let devices = &config.devices;
    if !(devices.fetch_station || devices.fetch_inverter || devices.fetch_logger) {
        log::info!("Nothing to fetch (all modules disabled)");
        return Ok(CycleOutcome::NothingToFetch);
    }

    let token = session.token(api, &config.account).await?;

    let station = match devices.station_id {
        Some(id) if devices.fetch_station => api.station_realtime(id, token).await?,
        _ => RawResponse::default(),
    };
    let inverter = match &devices.inverter_sn {
        Some(sn) if devices.fetch_inverter => api.device_current_data(sn, token).await?,
        _ => RawResponse::default(),
    };
    let logger = match &devices.logger_sn {
        Some(sn) if devices.fetch_logger => api.device_current_data(sn, token).await?,
        _ => RawResponse::default(),
    };

    let inverter_attributes = restructure(&inverter);
    let logger_attributes = restructure(&logger);

    let mut emitter = Emitter {
        sink,
        prefix: &config.mqtt.topic,
        published: 0,
    };

    if inverter.is_online() {
        log::info!("Inverter online, publishing data");
        let modules: [(Module, &RawResponse, Option<&AttributeMap>); 3] = [
            (Module::Station, &station, None),
            (Module::Inverter, &inverter, Some(&inverter_attributes)),
            (Module::Logger, &logger, Some(&logger_attributes)),
        ];
        for (module, raw, attributes) in modules {
            if !module.enabled(devices) {
                continue;
            }
            for (field, value) in raw.publishable() {
                emitter.emit(module, field, encode_payload(value)).await;
            }
            if let Some(attributes) = attributes.filter(|a| !a.is_empty()) {
                let payload = Value::Object(attributes.clone()).to_string();
                emitter.emit(module, "attributes", payload).await;
            }
        }
        return Ok(CycleOutcome::Online {
            published: emitter.published,
        });
    }

    let device_state = inverter.device_state();
    if devices.fetch_inverter {
        emitter
            .emit(Module::Inverter, "deviceState", encode_payload(&device_state))
            .await;
    }
    if devices.fetch_logger {
        emitter
            .emit(
                Module::Logger,
                "deviceState",
                encode_payload(&logger.device_state()),
            )
            .await;
    }
    log::info!("Inverter offline/night (state: {device_state})");

    Ok(CycleOutcome::Offline {
        device_state,
        published: emitter.published,
    })
}
