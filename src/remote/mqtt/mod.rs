//! MQTT transport for the remote room service.
//!
//! This module provides the broker connection wrapper and a
//! [`RemoteDeviceClient`](crate::remote::RemoteDeviceClient) that correlates
//! requests and replies over it.

mod client;
mod room_client;

pub use client::{MqttClient, MqttMessage};
pub use room_client::MqttRoomClient;
