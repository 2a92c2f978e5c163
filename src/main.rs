use clap::Parser;
use log::{error, info};
use room_sync_bridge::accessory::StateNotifier;
use room_sync_bridge::config::{self, Config, RoomConfig};
use room_sync_bridge::remote::{MqttRoomClient, RemoteDeviceClient, SimulatedRoomClient};
use room_sync_bridge::{RoomPlatform, RoomState};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;

#[derive(Parser)]
#[command(name = "room-sync-bridge")]
#[command(about = "Keeps remote thermostat rooms in sync with a local control surface")]
struct Cli {
    /// Serve simulated rooms instead of connecting to the MQTT broker
    #[arg(long, env = "ROOM_BRIDGE_SIMULATE")]
    simulate: bool,

    /// Override the base poll interval in seconds
    #[arg(long)]
    poll_interval: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn simulated_client(rooms: &[RoomConfig]) -> SimulatedRoomClient {
    rooms
        .iter()
        .enumerate()
        .fold(
            SimulatedRoomClient::new().with_drift(0.1),
            |client, (i, room)| {
                client.with_room(RoomState::new(
                    room.id.clone(),
                    room.name.clone(),
                    19.0 + i as f64,
                    21.0,
                    45.0,
                ))
            },
        )
}

fn main() {
    // Before the runtime starts: no other threads read the environment yet.
    config::load_dotenv();
    run();
}

#[tokio::main]
async fn run() {
    init_logger();
    info!("Starting Room Sync Bridge");

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(interval) = cli.poll_interval {
        config.poll.interval_secs = interval;
    }
    if cli.simulate && config.rooms.is_empty() {
        config.rooms = RoomConfig::parse_list("sim-1:Living Room,sim-2:Bedroom");
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Configuration loaded:");
    info!(
        "  Poll interval: {}s + {}..={}s jitter",
        config.poll.interval_secs, config.poll.jitter_min_secs, config.poll.jitter_max_secs
    );
    info!("  Rooms: {}", config.rooms.len());

    let client: Arc<dyn RemoteDeviceClient> = if cli.simulate {
        info!("  Remote: simulated");
        Arc::new(simulated_client(&config.rooms))
    } else {
        info!(
            "  Remote: MQTT {}:{} ({})",
            config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.topic_prefix
        );
        match MqttRoomClient::connect(&config.mqtt).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                error!("Failed to connect to room service: {}", e);
                std::process::exit(1);
            }
        }
    };

    let scheduler = match config.poll.scheduler() {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let platform = RoomPlatform::new(client, scheduler);

    let mut watchers = Vec::new();
    for room in &config.rooms {
        match platform.register_thermostat(room.id.clone(), None).await {
            Ok((_, accessory)) => {
                let signal = Arc::new(Notify::new());
                accessory.set_notifier(StateNotifier::new(signal.clone(), room.id.clone()));

                watchers.push(tokio::spawn(async move {
                    loop {
                        signal.notified().await;
                        if let Some(state) = accessory.snapshot() {
                            info!(
                                "{}: {:.1}°C (target {:.1}°C), {:.0}% humidity, mode {}/{}",
                                state.display_name,
                                state.current_temperature,
                                state.target_temperature,
                                state.current_humidity,
                                accessory.target_heating_cooling_state(),
                                accessory.current_heating_cooling_state()
                            );
                        }
                    }
                }));
            }
            Err(e) => error!("Failed to register room {} ({}): {}", room.name, room.id, e),
        }
    }

    info!("Room Sync Bridge is running");
    info!("  - {} room(s) synchronized", platform.rooms().len());
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    platform.shutdown().await;
    for watcher in watchers {
        watcher.abort();
    }

    info!("Room Sync Bridge stopped");
}
