//! Scheduler running synchronization cycles until cancelled.

use super::{ForceRefresh, SyncCycle};
use crate::error::BridgeError;
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Where the controller is in its lifecycle.
///
/// Cycle numbers start at 1 and identify the cycle being run or waited after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    RunningCycle(u64),
    Waiting(u64),
    Terminated,
}

pub struct LoopController {
    cycle: SyncCycle,
    refresh: Arc<ForceRefresh>,
    interval: Duration,
    state: watch::Sender<LoopState>,
}

impl LoopController {
    pub fn new(cycle: SyncCycle, refresh: Arc<ForceRefresh>, interval: Duration) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            cycle,
            refresh,
            interval,
            state,
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Run cycles until `cancel` fires.
    ///
    /// Every cycle is followed by a wait of the configured interval that ends
    /// early on cancellation or on a pending force-refresh. Cycle failures
    /// are logged and never end the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut number = 0u64;

        while !cancel.is_cancelled() {
            number += 1;
            self.set_state(LoopState::RunningCycle(number));
            info!("[Sync] Now fetching new data...");
            self.run_cycle(&cancel).await;

            if cancel.is_cancelled() {
                break;
            }

            info!(
                "[Sync] Fetching COMPLETED. Next update in {} minutes.",
                self.interval.as_secs() / 60
            );
            self.set_state(LoopState::Waiting(number));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.refresh.wait() => info!("[Sync] Force refresh requested"),
                _ = tokio::time::sleep(self.interval) => {}
            }

            self.set_state(LoopState::Idle);
        }

        self.set_state(LoopState::Terminated);
        info!("[Sync] Loop stopped");
    }

    async fn run_cycle(&self, cancel: &CancellationToken) {
        match AssertUnwindSafe(self.cycle.run(cancel)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_transient() => {
                warn!(
                    "[Sync] Error connecting to the FCA API. This can happen from time to time. Retrying in {} minutes.",
                    self.interval.as_secs() / 60
                );
                log_api_error(&e);
            }
            Ok(Err(e)) => error!("[Sync] Cycle failed: {}", e),
            Err(panic) => error!("[Sync] Cycle panicked: {}", panic_message(&panic)),
        }
    }

    fn set_state(&self, state: LoopState) {
        debug!("[Sync] State -> {:?}", state);
        self.state.send_replace(state);
    }
}

fn log_api_error(e: &BridgeError) {
    debug!("[Sync] ERROR: {}", e);
    if let BridgeError::Api { status, body } = e {
        debug!("[Sync] STATUS: {:?}", status);
        if let Some(body) = body {
            debug!("[Sync] RESPONSE: {}", body);
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
