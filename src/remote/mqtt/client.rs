//! MQTT client wrapper for the room service connection.

use crate::config::MqttConfig;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// MQTT connection: a publishing handle plus the event loop that drives it.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    subscriptions: Vec<String>,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            subscriptions: Vec::new(),
        }
    }

    /// Topic filter to (re)subscribe on every ConnAck.
    ///
    /// The broker forgets subscriptions of a clean session when the connection
    /// drops, so they are sent again after each reconnect.
    pub fn with_subscription(mut self, filter: impl Into<String>) -> Self {
        self.subscriptions.push(filter.into());
        self
    }

    /// Queue a SUBSCRIBE for every registered filter. Returns how many were queued.
    fn resubscribe(&self) -> usize {
        let mut queued = 0;
        for filter in &self.subscriptions {
            // The event loop is the caller, so waiting on a full request queue would stall it.
            match self.client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                Ok(()) => {
                    info!("[MQTT] Subscribed to {}", filter);
                    queued += 1;
                }
                Err(e) => error!("[MQTT] Failed to subscribe to {}: {}", filter, e),
            }
        }
        queued
    }

    /// Restore subscriptions, then report the first connection to `connected`.
    fn on_connack(&self, connected: &mut Option<oneshot::Sender<()>>) -> usize {
        let queued = self.resubscribe();
        if let Some(signal) = connected.take() {
            let _ = signal.send(());
        }
        queued
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Run the MQTT event loop and forward publishes to the provided channel.
    ///
    /// Every ConnAck restores the registered subscriptions; `connected` fires
    /// on the first one. Connection errors are retried
    /// every five seconds; the loop ends once the receiving side is dropped.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<MqttMessage>,
        mut connected: Option<oneshot::Sender<()>>,
    ) {
        info!("[MQTT] Starting event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[MQTT] Connected");
                    self.on_connack(&mut connected);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.clone();
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 in payload on {}: {}", topic, e);
                            continue;
                        }
                    };

                    debug!("[MQTT] Received on {}: {}", topic, payload);

                    if tx.send(MqttMessage { topic, payload }).await.is_err() {
                        debug!("[MQTT] Message channel closed, stopping event loop");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MqttConfig {
        crate::config::Config::default().mqtt
    }

    #[tokio::test]
    async fn test_every_connack_restores_subscriptions() {
        let mqtt = MqttClient::new(&config())
            .with_subscription("flair/+")
            .with_subscription("flair/status");
        let (tx, mut rx) = oneshot::channel();
        let mut connected = Some(tx);

        assert_eq!(mqtt.on_connack(&mut connected), 2);
        assert!(connected.is_none());
        assert!(rx.try_recv().is_ok());

        // A reconnect subscribes again even though nobody waits on it anymore.
        assert_eq!(mqtt.on_connack(&mut connected), 2);
    }

    #[tokio::test]
    async fn test_connack_without_subscriptions_still_signals() {
        let mqtt = MqttClient::new(&config());
        let (tx, mut rx) = oneshot::channel();
        let mut connected = Some(tx);

        assert_eq!(mqtt.on_connack(&mut connected), 0);
        assert!(rx.try_recv().is_ok());
    }
}
