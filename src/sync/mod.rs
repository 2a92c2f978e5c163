//! State synchronization between the remote room service and the local cache.
//!
//! - `cache`: single-slot snapshot store per room
//! - `scheduler`: jittered periodic polling with cooperative cancellation
//! - `engine`: poll / get / set reconciliation
//! - `binding`: push notifications toward the control surface

pub mod binding;
pub mod cache;
pub mod engine;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use binding::{ConsumerBinding, NoopBinding};
pub use cache::StateCache;
pub use engine::SyncEngine;
pub use scheduler::{Jitter, JitteredScheduler, ScheduleHandle, ScheduleStats};
