//! Test doubles shared by the sync and platform tests.

use super::ConsumerBinding;
use crate::error::{BridgeError, Result};
use crate::remote::RemoteDeviceClient;
use crate::room::{RoomId, RoomState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Binding that keeps every pushed snapshot.
#[derive(Default)]
pub struct RecordingBinding {
    seen: Mutex<Vec<RoomState>>,
}

impl RecordingBinding {
    pub fn seen(&self) -> Vec<RoomState> {
        self.seen.lock().clone()
    }

    pub fn last(&self) -> Option<RoomState> {
        self.seen.lock().last().cloned()
    }
}

impl ConsumerBinding for RecordingBinding {
    fn on_state_changed(&self, state: &RoomState) {
        self.seen.lock().push(state.clone());
    }
}

/// Client whose responses are released by the test, one call at a time.
///
/// Each `fetch`/`mutate` takes the next queued receiver and waits for the test
/// to send the response, which lets tests decide the order responses arrive in.
#[derive(Default)]
pub struct ScriptedClient {
    fetches: Mutex<VecDeque<oneshot::Receiver<Result<RoomState>>>>,
    mutations: Mutex<VecDeque<oneshot::Receiver<Result<RoomState>>>>,
    requested: Mutex<Vec<f64>>,
}

impl ScriptedClient {
    pub fn expect_fetch(&self) -> oneshot::Sender<Result<RoomState>> {
        let (tx, rx) = oneshot::channel();
        self.fetches.lock().push_back(rx);
        tx
    }

    pub fn expect_mutate(&self) -> oneshot::Sender<Result<RoomState>> {
        let (tx, rx) = oneshot::channel();
        self.mutations.lock().push_back(rx);
        tx
    }

    pub fn requested(&self) -> Vec<f64> {
        self.requested.lock().clone()
    }

    async fn answer(rx: Option<oneshot::Receiver<Result<RoomState>>>) -> Result<RoomState> {
        let rx = rx.ok_or_else(|| BridgeError::RemoteUnavailable("unexpected call".into()))?;
        rx.await
            .map_err(|_| BridgeError::RemoteUnavailable("response dropped".into()))?
    }
}

#[async_trait]
impl RemoteDeviceClient for ScriptedClient {
    async fn fetch(&self, _room: &RoomId) -> Result<RoomState> {
        let rx = self.fetches.lock().pop_front();
        Self::answer(rx).await
    }

    async fn mutate(&self, _room: &RoomId, target_temperature: f64) -> Result<RoomState> {
        self.requested.lock().push(target_temperature);
        let rx = self.mutations.lock().pop_front();
        Self::answer(rx).await
    }
}
