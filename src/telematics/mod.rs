//! Telematics service boundary.
//!
//! The bridge only talks to the vehicle cloud through [`TelematicsClient`].
//! Session handling, request signing and HTTP transport belong to the
//! implementation behind the trait.

pub mod fake;

use crate::error::Result;
use crate::vehicle::Vehicle;
use async_trait::async_trait;
use strum::{Display, EnumIter};

pub use fake::FakeTelematicsClient;

/// Remote operations understood by the vehicle cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Command {
    /// Locate vehicle (request a fresh GPS fix)
    #[strum(serialize = "VF")]
    Locate,
    /// Wake the EV module and refresh battery readings
    #[strum(serialize = "DEEPREFRESH")]
    DeepRefresh,
    /// Remote preconditioning (HVAC)
    #[strum(serialize = "ROPRECOND")]
    Precondition,
    /// Horn and lights
    #[strum(serialize = "HBLF")]
    HornLights,
    #[strum(serialize = "REON")]
    EngineOn,
    #[strum(serialize = "REOFF")]
    EngineOff,
    #[strum(serialize = "RDL")]
    DoorLock,
    #[strum(serialize = "RDU")]
    DoorUnlock,
    /// Suppress a theft alarm
    #[strum(serialize = "TA")]
    SuppressAlarm,
    #[strum(serialize = "ROTRUNKLOCK")]
    TrunkLock,
    #[strum(serialize = "ROTRUNKUNLOCK")]
    TrunkUnlock,
    #[strum(serialize = "CNOW")]
    ChargeNow,
}

impl Command {
    /// Command code sent in the request body.
    pub fn code(&self) -> String {
        self.to_string()
    }

    /// REST path segment the command is posted to.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Locate => "location",
            Command::DeepRefresh => "ev",
            Command::ChargeNow => "ev/chargenow",
            _ => "remote",
        }
    }
}

/// Capability consumed by the synchronization cycle and the command dispatcher.
#[async_trait]
pub trait TelematicsClient: Send + Sync {
    /// Log in, or refresh the existing session if it is about to expire.
    ///
    /// Fails with [`BridgeError::Auth`](crate::error::BridgeError::Auth) on bad
    /// credentials or transport failure.
    async fn login_and_keep_alive(&self) -> Result<()>;

    /// Current snapshot of every vehicle on the account.
    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>>;

    /// Submit a remote command authorised by the account PIN.
    async fn send_command(&self, vin: &str, command: Command, pin: &str) -> Result<()>;
}
