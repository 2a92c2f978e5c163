//! Room service client speaking request/response over MQTT.
//!
//! Topics, for prefix `flair` and room `r1`:
//! - `flair/r1/get`: `{"request-id": "..."}` asks for the current state
//! - `flair/r1/set`: `{"request-id": "...", "set-point-c": 21.5}` requests a setpoint
//! - `flair/r1`: the service answers with the full room state, echoing
//!   `request-id`, or with `{"request-id": "...", "error": "..."}`
//!
//! Replies without a known `request-id` (unsolicited updates, answers to
//! requests that already timed out) are ignored.

use super::client::{MqttClient, MqttMessage};
use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};
use crate::remote::RemoteDeviceClient;
use crate::room::{RoomId, RoomState};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, QoS};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

const REQUEST_ID: &str = "request-id";

/// Outcome of one request as decoded from the service's reply.
#[derive(Debug, Clone, PartialEq)]
enum Reply {
    State(RoomState),
    Rejected(String),
    Malformed(String),
}

impl Reply {
    fn into_result(self, room: &RoomId) -> Result<RoomState> {
        match self {
            Reply::State(state) if &state.id == room => Ok(state),
            Reply::State(state) => Err(BridgeError::RemoteUnavailable(format!(
                "reply for room {} while waiting on room {}",
                state.id, room
            ))),
            Reply::Rejected(reason) => Err(BridgeError::RemoteRejected(reason)),
            Reply::Malformed(reason) => Err(BridgeError::RemoteUnavailable(format!(
                "malformed reply for room {}: {}",
                room, reason
            ))),
        }
    }
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Reply>>>>;

/// Remote room client backed by an MQTT broker.
pub struct MqttRoomClient {
    client: AsyncClient,
    topic_prefix: String,
    timeout: Duration,
    pending: Pending,
    tasks: Vec<JoinHandle<()>>,
}

impl MqttRoomClient {
    /// Connect to the broker and subscribe to room replies.
    pub async fn connect(config: &MqttConfig) -> Result<Self> {
        info!(
            "[MQTT] Connecting to {}:{}",
            config.broker_host, config.broker_port
        );

        let reply_filter = format!("{}/+", config.topic_prefix);
        let mqtt_client = MqttClient::new(config).with_subscription(reply_filter);
        let client = mqtt_client.client();

        let (msg_tx, mut msg_rx) = mpsc::channel::<MqttMessage>(64);
        let (connected_tx, connected_rx) = oneshot::channel();

        // Start MQTT event loop FIRST (so it can establish connection)
        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(msg_tx, Some(connected_tx)).await;
        });

        let timeout = Duration::from_secs(config.request_timeout_secs);
        match tokio::time::timeout(timeout, connected_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                mqtt_loop.abort();
                return Err(BridgeError::RemoteUnavailable(
                    "MQTT event loop stopped before connecting".to_string(),
                ));
            }
            Err(_) => {
                mqtt_loop.abort();
                return Err(BridgeError::RemoteUnavailable(format!(
                    "MQTT connection timeout after {}s",
                    timeout.as_secs()
                )));
            }
        }

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let router_pending = pending.clone();
        let prefix = config.topic_prefix.clone();
        let router = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                dispatch(&router_pending, &prefix, &msg);
            }
        });

        Ok(Self {
            client,
            topic_prefix: config.topic_prefix.clone(),
            timeout,
            pending,
            tasks: vec![mqtt_loop, router],
        })
    }

    fn command_topic(&self, room: &RoomId, command: &str) -> String {
        format!("{}/{}/{}", self.topic_prefix, room, command)
    }

    async fn request(&self, room: &RoomId, command: &str, mut payload: Value) -> Result<RoomState> {
        let request_id = Uuid::new_v4().to_string();
        payload[REQUEST_ID] = Value::String(request_id.clone());

        let (tx, rx) = oneshot::channel();
        let _waiting = PendingRequest::register(&self.pending, request_id, tx);

        let topic = self.command_topic(room, command);
        debug!("[MQTT] Publishing to {}: {}", topic, payload);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_string())
            .await
            .map_err(|e| BridgeError::RemoteUnavailable(format!("publish failed: {}", e)))?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply.into_result(room),
            Ok(Err(_)) => Err(BridgeError::RemoteUnavailable(
                "MQTT connection closed while waiting for reply".to_string(),
            )),
            Err(_) => Err(BridgeError::RemoteUnavailable(format!(
                "no reply from room {} within {}s",
                room,
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Entry in the pending map for one outstanding request.
///
/// Removed on drop, whether the request was answered, timed out, failed to
/// publish, or its caller gave up on it.
struct PendingRequest<'a> {
    pending: &'a Pending,
    request_id: String,
}

impl<'a> PendingRequest<'a> {
    fn register(pending: &'a Pending, request_id: String, tx: oneshot::Sender<Reply>) -> Self {
        pending.lock().insert(request_id.clone(), tx);
        Self {
            pending,
            request_id,
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.request_id);
    }
}

impl Drop for MqttRoomClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl RemoteDeviceClient for MqttRoomClient {
    async fn fetch(&self, room: &RoomId) -> Result<RoomState> {
        self.request(room, "get", json!({})).await
    }

    async fn mutate(&self, room: &RoomId, target_temperature: f64) -> Result<RoomState> {
        self.request(room, "set", json!({ "set-point-c": target_temperature }))
            .await
    }
}

/// Room id addressed by a reply topic, if the topic is `<prefix>/<room>`.
fn reply_room<'a>(prefix: &str, topic: &'a str) -> Option<&'a str> {
    let room = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    (!room.is_empty() && !room.contains('/')).then_some(room)
}

fn decode_reply(payload: &Value) -> Reply {
    if let Some(reason) = payload.get("error") {
        let reason = reason
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| reason.to_string());
        return Reply::Rejected(reason);
    }

    match serde_json::from_value::<RoomState>(payload.clone()) {
        Ok(state) => Reply::State(state),
        Err(e) => Reply::Malformed(e.to_string()),
    }
}

/// Route one incoming message to the request waiting for it.
fn dispatch(pending: &Pending, prefix: &str, msg: &MqttMessage) {
    let Some(room) = reply_room(prefix, &msg.topic) else {
        return;
    };

    let payload: Value = match serde_json::from_str(&msg.payload) {
        Ok(v) => v,
        Err(e) => {
            warn!("[MQTT] Failed to parse reply for room {}: {}", room, e);
            return;
        }
    };

    let Some(request_id) = payload.get(REQUEST_ID).and_then(Value::as_str) else {
        debug!("[MQTT] Ignoring unsolicited update for room {}", room);
        return;
    };

    let Some(waiter) = pending.lock().remove(request_id) else {
        debug!("[MQTT] No pending request {} for room {}", request_id, room);
        return;
    };

    let _ = waiter.send(decode_reply(&payload));
}
