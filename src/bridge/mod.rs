//! Synchronization core.
//!
//! The [`LoopController`] drives [`SyncCycle`]s on a fixed interval. Each
//! cycle turns the fetched vehicles into Home Assistant entities through the
//! [`transform`] pipeline and the [`EntityCache`]. Button presses go through
//! the [`CommandDispatcher`] and may wake the controller early via
//! [`ForceRefresh`].

pub mod buttons;
pub mod controller;
pub mod cycle;
pub mod dispatcher;
pub mod entity_cache;
pub mod refresh;
pub mod transform;

use std::time::Duration;

pub use controller::{LoopController, LoopState};
pub use cycle::{CycleOptions, SyncCycle};
pub use dispatcher::CommandDispatcher;
pub use entity_cache::EntityCache;
pub use refresh::ForceRefresh;

/// Fixed pauses that let the vehicle backend and Home Assistant catch up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// After a successful remote command.
    pub command_settle: Duration,
    /// After auto-refresh commands, before reading vehicle data.
    pub vehicle_refresh_settle: Duration,
    /// Between announcing sensors and publishing their states.
    pub discovery_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            command_settle: Duration::from_secs(5),
            vehicle_refresh_settle: Duration::from_secs(10),
            discovery_settle: Duration::from_secs(5),
        }
    }
}

impl Timings {
    /// No pauses at all, for tests.
    pub fn immediate() -> Self {
        Self {
            command_settle: Duration::ZERO,
            vehicle_refresh_settle: Duration::ZERO,
            discovery_settle: Duration::ZERO,
        }
    }
}
