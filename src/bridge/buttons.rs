//! Per-vehicle interactive entities (Home Assistant buttons).

use super::{CommandDispatcher, ForceRefresh};
use crate::mqtt::{Button, ButtonAction, HaDevice};
use crate::telematics::Command;
use futures_util::FutureExt;
use log::{info, warn};
use std::sync::Arc;

/// Buttons in announce order. `None` is the fetch-now button, which only
/// wakes the loop.
///
/// The flag marks commands that open up or start the vehicle; those are left
/// out unless dangerous commands are enabled.
const BUTTONS: &[(&str, Option<Command>, bool)] = &[
    ("UpdateLocation", Some(Command::Locate), false),
    ("DeepRefresh", Some(Command::DeepRefresh), false),
    ("VehicleAlarm", Some(Command::HornLights), false),
    ("HVAC", Some(Command::Precondition), false),
    ("StartEngine", Some(Command::EngineOn), true),
    ("StopEngine", Some(Command::EngineOff), false),
    ("DoorLock", Some(Command::DoorLock), false),
    ("DoorUnlock", Some(Command::DoorUnlock), true),
    (FETCH_NOW, None, false),
    ("SuppressAlarm", Some(Command::SuppressAlarm), false),
    ("LockTrunk", Some(Command::TrunkLock), false),
    ("UnlockTrunk", Some(Command::TrunkUnlock), true),
    ("ChargeNow", Some(Command::ChargeNow), false),
];

pub const FETCH_NOW: &str = "FetchNow";

/// Build the full button set for one vehicle.
pub fn create_interactive_entities(
    device: Arc<HaDevice>,
    vin: &str,
    dispatcher: Arc<CommandDispatcher>,
    refresh: Arc<ForceRefresh>,
    enable_dangerous_commands: bool,
) -> Vec<Button> {
    BUTTONS
        .iter()
        .filter(|(_, _, dangerous)| enable_dangerous_commands || !dangerous)
        .map(|(name, command, _)| {
            let action = match command {
                Some(command) => {
                    command_action(*command, vin, dispatcher.clone(), refresh.clone())
                }
                None => fetch_now_action(refresh.clone()),
            };
            Button::new(device.clone(), *name, action)
        })
        .collect()
}

fn fetch_now_action(refresh: Arc<ForceRefresh>) -> ButtonAction {
    Arc::new(move || {
        let refresh = refresh.clone();
        async move {
            info!("[Command] Force fetch now");
            refresh.trigger();
        }
        .boxed()
    })
}

/// Dispatch `command` and wake the loop when the vehicle accepted it.
fn command_action(
    command: Command,
    vin: &str,
    dispatcher: Arc<CommandDispatcher>,
    refresh: Arc<ForceRefresh>,
) -> ButtonAction {
    let vin: Arc<str> = Arc::from(vin);
    Arc::new(move || {
        let dispatcher = dispatcher.clone();
        let refresh = refresh.clone();
        let vin = vin.clone();
        async move {
            match dispatcher.try_send_command(command, &vin).await {
                Ok(true) => refresh.trigger(),
                Ok(false) => {}
                Err(e) => warn!("[Command] {} for {} not sent: {}", command, vin, e),
            }
        }
        .boxed()
    })
}
