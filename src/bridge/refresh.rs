//! Force-refresh signal between button actions and the loop controller.

use tokio::sync::Notify;

/// Single-slot wake-up for the inter-cycle wait.
///
/// Triggers coalesce into one pending wake. A trigger raised while no wait
/// is in progress (e.g. during a cycle) is kept and ends the next wait
/// immediately; waking consumes it.
#[derive(Debug, Default)]
pub struct ForceRefresh {
    notify: Notify,
}

impl ForceRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    /// Resolve once a trigger is pending, clearing it.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}
