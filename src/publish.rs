//! Message bus side: the `Publish` seam and its MQTT implementation.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, QoS};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::config::MqttConfig;

const KEEP_ALIVE_SECS: u64 = 30;
const REQUEST_CAPACITY: usize = 100;
const FLUSH_TIMEOUT_SECS: u64 = 10;

/// Something that accepts `topic = payload` messages.
pub trait Publish {
    fn publish(
        &self,
        topic: &str,
        payload: String,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Flushes pending messages and releases the connection.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized,
    {
        async {}
    }
}

/// Encodes a response value as message payload: strings go out raw,
/// everything else in its JSON text form.
pub fn encode_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct MqttSink {
    client: AsyncClient,
    qos: QoS,
    retain: bool,
    event_loop: JoinHandle<()>,
}

impl MqttSink {
    /// Creates the client and drives its event loop on a background task.
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(KEEP_ALIVE_SECS));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let event_loop = tokio::spawn(drive(event_loop));
        log::info!("MQTT broker: {}:{}", config.broker, config.port);

        Self {
            client,
            qos: qos(config.qos),
            retain: config.retain,
            event_loop,
        }
    }
}

impl Publish for MqttSink {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), ClientError> {
        self.client
            .publish(topic, self.qos, self.retain, payload)
            .await
    }

    /// Disconnects once queued messages went out, waiting a bounded time.
    async fn close(self) {
        if let Err(e) = self.client.disconnect().await {
            log::warn!("MQTT disconnect failed: {e:?}");
            return;
        }
        match timeout(Duration::from_secs(FLUSH_TIMEOUT_SECS), self.event_loop).await {
            Ok(Ok(())) => log::debug!("MQTT event loop finished"),
            Ok(Err(e)) => log::warn!("MQTT event loop task failed: {e}"),
            Err(_) => log::warn!("MQTT flush timed out, some messages may be lost"),
        }
    }
}

fn qos(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

async fn drive(mut event_loop: EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(event) => log::trace!("MQTT event: {event:?}"),
            Err(e) => {
                log::warn!("MQTT event loop error: {e:?}");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
