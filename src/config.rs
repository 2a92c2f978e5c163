use crate::error::{BridgeError, Result};
use crate::room::RoomId;
use crate::sync::{Jitter, JitteredScheduler};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(&key).is_err() {
            // SAFETY: called from main before the tokio runtime spawns any threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key.to_string(), value.to_string()));
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub poll: PollConfig,
    pub mqtt: MqttConfig,
    pub rooms: Vec<RoomConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub jitter_min_secs: u64,
    pub jitter_max_secs: u64,
}

impl PollConfig {
    pub fn jitter(&self) -> Result<Jitter> {
        Jitter::new(self.jitter_min_secs, self.jitter_max_secs)
    }

    pub fn scheduler(&self) -> Result<JitteredScheduler> {
        JitteredScheduler::new(self.interval_secs, self.jitter()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic prefix the room service publishes under, e.g. `flair/<room>`
    pub topic_prefix: String,
    pub request_timeout_secs: u64,
}

/// A room to register at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: RoomId,
    pub name: String,
}

impl RoomConfig {
    /// Parse a `ROOMS` list: `id:Name,id:Name`. A missing name falls back to the id.
    pub fn parse_list(value: &str) -> Vec<RoomConfig> {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((id, name)) => RoomConfig {
                    id: RoomId::from(id.trim()),
                    name: name.trim().to_string(),
                },
                None => RoomConfig {
                    id: RoomId::from(entry),
                    name: entry.to_string(),
                },
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll: PollConfig {
                interval_secs: 60,
                jitter_min_secs: Jitter::DEFAULT.min_secs(),
                jitter_max_secs: Jitter::DEFAULT.max_secs(),
            },
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "room-sync-bridge".to_string(),
                username: None,
                password: None,
                topic_prefix: "flair".to_string(),
                request_timeout_secs: 10,
            },
            rooms: vec![],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Polling
        if let Ok(interval) = std::env::var("POLL_INTERVAL")
            && let Ok(i) = interval.parse()
        {
            config.poll.interval_secs = i;
        }
        if let Ok(min) = std::env::var("POLL_JITTER_MIN")
            && let Ok(m) = min.parse()
        {
            config.poll.jitter_min_secs = m;
        }
        if let Ok(max) = std::env::var("POLL_JITTER_MAX")
            && let Ok(m) = max.parse()
        {
            config.poll.jitter_max_secs = m;
        }

        if let Ok(rooms) = std::env::var("ROOMS") {
            config.rooms = RoomConfig::parse_list(&rooms);
        }

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Ok(prefix) = std::env::var("MQTT_TOPIC_PREFIX") {
            config.mqtt.topic_prefix = prefix;
        }
        if let Ok(timeout) = std::env::var("MQTT_REQUEST_TIMEOUT")
            && let Ok(t) = timeout.parse()
        {
            config.mqtt.request_timeout_secs = t;
        }

        config
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        let jitter = self.poll.jitter()?;
        if self.poll.interval_secs.saturating_add(jitter.min_secs()) == 0 {
            return Err(BridgeError::InvalidConfig(
                "poll interval and jitter minimum are both zero".to_string(),
            ));
        }
        if self.mqtt.request_timeout_secs == 0 {
            return Err(BridgeError::InvalidConfig(
                "MQTT request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
