// Thin forwarder to a foreign MQTT broker. Owns one persistent connection
// and nothing else: no session table, no routing table, no retained
// store. Grounded in the original's `ExternalMQTTClient`, with
// reconnection handled by `rumqttc` instead of a hand-rolled retry loop.

use rumqttc::{AsyncClient, MqttOptions, QoS as RumqttQoS};
use tokio::sync::mpsc::Receiver;
use tokio::time::Duration;

use crate::commands::SchedulerToBrokerCmd;
use crate::config::Config;

pub struct ExternalPublisher {
    client: AsyncClient,
    topic: String,
    qos: RumqttQoS,
}

impl ExternalPublisher {
    #[must_use]
    pub fn connect(config: &Config) -> (Self, rumqttc::EventLoop) {
        let client_id = config.mqtt.client_id.clone().unwrap_or_else(|| "nas-paneld".to_string());
        let mut options = MqttOptions::new(client_id, config.mqtt.host.clone(), config.mqtt.port as u16);
        options.set_keep_alive(Duration::from_secs(u64::from(config.mqtt.keep_alive.unwrap_or(60))));
        if let Some(username) = &config.mqtt.username {
            options.set_credentials(username.clone(), config.mqtt.password.clone().unwrap_or_default());
        }

        let (client, event_loop) = AsyncClient::new(options, 16);
        let publisher = Self {
            client,
            topic: config.mqtt.topic.clone(),
            // QoS 2 is never negotiated on the wire in this implementation (see
            // the broker core's fan-out rule); downgrade here for consistency.
            qos: downgrade_qos(config.mqtt.qos),
        };
        (publisher, event_loop)
    }

    /// Drain the event loop so `rumqttc` can drive reconnects and keep-alives.
    /// Must run concurrently with `run`.
    pub async fn drive(mut event_loop: rumqttc::EventLoop) {
        loop {
            match event_loop.poll().await {
                Ok(event) => log::trace!("external broker event: {event:?}"),
                Err(err) => {
                    log::warn!("external broker connection error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Forward each scheduler tick to the configured topic. A publish
    /// failure (e.g. disconnected) is logged and the tick is skipped;
    /// it is never treated as fatal.
    pub async fn run(&self, mut scheduler_rx: Receiver<SchedulerToBrokerCmd>) {
        while let Some(cmd) = scheduler_rx.recv().await {
            let payload = match serde_json::to_vec(&cmd.document) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::error!("failed to serialize metric document: {err}");
                    continue;
                }
            };
            if let Err(err) = self.client.publish(&self.topic, self.qos, true, payload).await {
                log::warn!("external publish failed: {err}");
            }
        }
    }
}

fn downgrade_qos(qos: u8) -> RumqttQoS {
    match qos {
        0 => RumqttQoS::AtMostOnce,
        _ => RumqttQoS::AtLeastOnce,
    }
}
