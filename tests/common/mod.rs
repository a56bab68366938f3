#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rumqttc::ClientError;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use solarman2mqtt::publish::Publish;

/// Keeps every published message in memory. Clones share the recording.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<(String, String)>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.messages().into_iter().map(|(t, _)| t).collect();
        topics.sort();
        topics
    }

    pub fn payload(&self, topic: &str) -> Option<String> {
        self.messages()
            .into_iter()
            .find(|(t, _)| t == topic)
            .map(|(_, p)| p)
    }
}

impl Publish for RecordingSink {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), ClientError> {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct Toggles {
    pub station: bool,
    pub inverter: bool,
    pub logger: bool,
}

pub const ALL: Toggles = Toggles {
    station: true,
    inverter: true,
    logger: true,
};

pub fn config_toml(api_url: &str, toggles: &Toggles, extra_top_level: &str) -> String {
    format!(
        r#"
{extra_top_level}

[account]
url = "{api_url}"
app_id = "2021"
app_secret = "s3cret"
username = "pv@example.org"
passhash = "5e884898"

[devices]
station_id = 123456
inverter_sn = "INV0001"
logger_sn = "LOG0001"
fetch_station = {}
fetch_inverter = {}
fetch_logger = {}

[mqtt]
broker = "localhost"
topic = "solarmanpv"
"#,
        toggles.station, toggles.inverter, toggles.logger
    )
}

pub async fn mount_token(server: &MockServer, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/account/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": null,
            "msg": null,
            "success": true,
            "requestId": "1b2c3d",
            "access_token": "tok-1",
            "token_type": "bearer",
            "refresh_token": "refresh",
            "expires_in": "5183999",
            "scope": null,
            "uid": 42
        })))
        .expect(calls)
        .mount(server)
        .await;
}

pub async fn mount_station(server: &MockServer, body: Value, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/station/v1.0/realTime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(calls)
        .mount(server)
        .await;
}

pub async fn mount_device(server: &MockServer, device_sn: &str, body: Value, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/device/v1.0/currentData"))
        .and(body_json(json!({ "deviceSn": device_sn })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(calls)
        .mount(server)
        .await;
}

pub fn station_body() -> Value {
    json!({
        "code": "0",
        "msg": "success",
        "success": true,
        "requestId": "a1",
        "generationPower": 1520.0,
        "usePower": null,
        "batterySoc": null,
        "lastUpdateTime": 1_718_964_000
    })
}

pub fn inverter_body(device_state: i64) -> Value {
    json!({
        "code": "0",
        "msg": "success",
        "success": true,
        "requestId": "a2",
        "deviceSn": "INV0001",
        "deviceId": 1001,
        "deviceType": "INVERTER",
        "deviceState": device_state,
        "collectionTime": null,
        "dataList": [
            { "key": "DV1", "name": "DC Voltage PV1", "value": "312.5", "unit": "V" },
            { "key": "APo_t1", "name": "Total AC Output Power (Active)", "value": "1520", "unit": "W" }
        ]
    })
}

pub fn logger_body(device_state: i64) -> Value {
    json!({
        "code": "0",
        "msg": "success",
        "success": true,
        "requestId": "a3",
        "deviceSn": "LOG0001",
        "deviceType": "COLLECTOR",
        "deviceState": device_state,
        "dataList": [
            { "key": 1, "name": "Today Energy", "value": 12.3 }
        ]
    })
}
