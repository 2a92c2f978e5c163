//! Room registration and teardown.
//!
//! The platform owns the remote client shared by every room and the poll
//! settings. Each registered room gets its own cache, engine and schedule;
//! rooms never share state with each other.

use crate::accessory::ThermostatAccessory;
use crate::error::{BridgeError, Result};
use crate::remote::RemoteDeviceClient;
use crate::room::{RoomId, RoomState};
use crate::sync::{ConsumerBinding, JitteredScheduler, ScheduleHandle, StateCache, SyncEngine};
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered room: its sync engine plus the schedule that polls it.
pub struct RoomEntity {
    engine: Arc<SyncEngine>,
    schedule: Mutex<Option<ScheduleHandle>>,
}

impl RoomEntity {
    /// Build the room's cache, make sure it holds a snapshot, then start polling.
    ///
    /// `initial` is the snapshot the room was discovered with. Without one, a
    /// fetch is made first and its failure aborts registration.
    pub async fn start(
        client: Arc<dyn RemoteDeviceClient>,
        scheduler: &JitteredScheduler,
        room: RoomId,
        initial: Option<RoomState>,
        binding: Arc<dyn ConsumerBinding>,
    ) -> Result<Self> {
        let cache = StateCache::new(room.clone());
        let seeded = initial.is_some();
        if let Some(state) = initial {
            if state.id != room {
                return Err(BridgeError::InvalidConfig(format!(
                    "initial state for room {} registered as {}",
                    state.id, room
                )));
            }
            cache.replace(state)?;
        }

        let engine = Arc::new(SyncEngine::new(client, cache, binding));
        if !seeded {
            engine.poll().await?;
        }

        let poller = engine.clone();
        let schedule = scheduler.start(room.to_string(), move || {
            let poller = poller.clone();
            async move { poller.poll().await }
        });

        Ok(Self {
            engine,
            schedule: Mutex::new(Some(schedule)),
        })
    }

    pub fn room(&self) -> &RoomId {
        self.engine.room()
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Last applied snapshot.
    pub fn current(&self) -> Result<RoomState> {
        self.engine.current()
    }

    pub async fn get_target(&self) -> Result<f64> {
        self.engine.get_target().await
    }

    pub async fn set_target(&self, requested: f64) -> Result<f64> {
        self.engine.set_target(requested).await
    }

    /// Effective poll period, while the room is running.
    pub fn poll_period(&self) -> Option<std::time::Duration> {
        self.schedule.lock().as_ref().map(ScheduleHandle::period)
    }

    pub fn is_running(&self) -> bool {
        self.schedule.lock().is_some()
    }

    /// Stop polling and detach the cache.
    ///
    /// A poll or write still in flight is allowed to finish, but whatever it
    /// returns is dropped. Calling this twice is harmless.
    pub async fn teardown(&self) {
        let schedule = self.schedule.lock().take();
        let Some(schedule) = schedule else {
            return;
        };

        schedule.cancel();
        self.engine.close();
        schedule.shutdown().await;
        info!("[Platform] Room {} torn down", self.room());
    }
}

/// Registry of all rooms served by this process.
pub struct RoomPlatform {
    client: Arc<dyn RemoteDeviceClient>,
    scheduler: JitteredScheduler,
    rooms: RwLock<HashMap<RoomId, Arc<RoomEntity>>>,
}

impl RoomPlatform {
    pub fn new(client: Arc<dyn RemoteDeviceClient>, scheduler: JitteredScheduler) -> Self {
        Self {
            client,
            scheduler,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Register a room with a caller-provided binding.
    pub async fn register(
        &self,
        room: RoomId,
        initial: Option<RoomState>,
        binding: Arc<dyn ConsumerBinding>,
    ) -> Result<Arc<RoomEntity>> {
        if self.rooms.read().contains_key(&room) {
            return Err(BridgeError::InvalidConfig(format!(
                "room {} is already registered",
                room
            )));
        }

        let entity = Arc::new(
            RoomEntity::start(
                self.client.clone(),
                &self.scheduler,
                room.clone(),
                initial,
                binding,
            )
            .await?,
        );

        let raced = {
            let mut rooms = self.rooms.write();
            if rooms.contains_key(&room) {
                true
            } else {
                rooms.insert(room.clone(), entity.clone());
                false
            }
        };
        if raced {
            entity.teardown().await;
            return Err(BridgeError::InvalidConfig(format!(
                "room {} is already registered",
                room
            )));
        }

        info!("[Platform] Registered room {}", room);
        Ok(entity)
    }

    /// Register a room exposed through a [`ThermostatAccessory`].
    pub async fn register_thermostat(
        &self,
        room: RoomId,
        initial: Option<RoomState>,
    ) -> Result<(Arc<RoomEntity>, Arc<ThermostatAccessory>)> {
        let accessory = Arc::new(ThermostatAccessory::new(&room));
        let entity = self.register(room, initial, accessory.clone()).await?;
        Ok((entity, accessory))
    }

    pub fn get(&self, room: &RoomId) -> Result<Arc<RoomEntity>> {
        self.rooms
            .read()
            .get(room)
            .cloned()
            .ok_or_else(|| BridgeError::RoomNotFound(room.clone()))
    }

    /// Ids of all registered rooms, sorted.
    pub fn rooms(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Tear down and forget one room.
    pub async fn remove(&self, room: &RoomId) -> Result<()> {
        let entity = self
            .rooms
            .write()
            .remove(room)
            .ok_or_else(|| BridgeError::RoomNotFound(room.clone()))?;
        entity.teardown().await;
        Ok(())
    }

    /// Tear down every room.
    pub async fn shutdown(&self) {
        let entities: Vec<Arc<RoomEntity>> = self.rooms.write().drain().map(|(_, e)| e).collect();
        if entities.is_empty() {
            return;
        }

        info!("[Platform] Shutting down {} room(s)", entities.len());
        for entity in entities {
            entity.teardown().await;
        }
        if !self.rooms.read().is_empty() {
            warn!("[Platform] Rooms registered during shutdown are still running");
        }
    }
}
