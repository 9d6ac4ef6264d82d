//! Single choke point for remote vehicle commands.

use crate::error::{BridgeError, Result};
use crate::telematics::{Command, TelematicsClient};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;

pub struct CommandDispatcher {
    telematics: Arc<dyn TelematicsClient>,
    pin: Option<String>,
    settle: Duration,
}

impl CommandDispatcher {
    pub fn new(
        telematics: Arc<dyn TelematicsClient>,
        pin: Option<String>,
        settle: Duration,
    ) -> Self {
        let pin = pin.filter(|p| !p.trim().is_empty());
        Self {
            telematics,
            pin,
            settle,
        }
    }

    /// Send `command` to `vin` with the configured PIN.
    ///
    /// Returns `Ok(true)` once the command was accepted and the settle delay
    /// has passed, `Ok(false)` when the remote side rejected it. A missing PIN
    /// is a configuration problem and comes back as [`BridgeError::PinNotSet`]
    /// without touching the network.
    ///
    /// Never raises the force-refresh signal; that is the caller's decision.
    pub async fn try_send_command(&self, command: Command, vin: &str) -> Result<bool> {
        info!("[Command] Sending {} to {}", command, vin);

        let Some(pin) = self.pin.as_deref() else {
            return Err(BridgeError::PinNotSet);
        };

        match self.telematics.send_command(vin, command, pin).await {
            Ok(()) => {
                tokio::time::sleep(self.settle).await;
                info!("[Command] {} SUCCESSFUL", command);
                Ok(true)
            }
            Err(e) => {
                error!("[Command] {} ERROR. Maybe wrong pin?", command);
                debug!("[Command] {:?}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTelematics;

    #[tokio::test]
    async fn test_missing_pin_fails_without_network_call() {
        let telematics = Arc::new(ScriptedTelematics::new(vec![]));
        let dispatcher = CommandDispatcher::new(telematics.clone(), None, Duration::ZERO);

        let result = dispatcher.try_send_command(Command::DoorLock, "VIN1").await;
        assert!(matches!(result, Err(BridgeError::PinNotSet)));
        assert!(telematics.sent_commands().is_empty());
    }

    #[tokio::test]
    async fn test_blank_pin_treated_as_missing() {
        let telematics = Arc::new(ScriptedTelematics::new(vec![]));
        let dispatcher =
            CommandDispatcher::new(telematics.clone(), Some("  ".into()), Duration::ZERO);

        let result = dispatcher.try_send_command(Command::DoorLock, "VIN1").await;
        assert!(matches!(result, Err(BridgeError::PinNotSet)));
    }

    #[tokio::test]
    async fn test_success_passes_pin() {
        let telematics = Arc::new(ScriptedTelematics::new(vec![]));
        let dispatcher =
            CommandDispatcher::new(telematics.clone(), Some("1234".into()), Duration::ZERO);

        let sent =
            tokio_test::assert_ok!(dispatcher.try_send_command(Command::Locate, "VIN1").await);
        assert!(sent);
        assert_eq!(
            telematics.sent_commands(),
            vec![("VIN1".to_string(), Command::Locate, "1234".to_string())]
        );
    }

    #[tokio::test]
    async fn test_remote_rejection_is_false_not_error() {
        let telematics = Arc::new(ScriptedTelematics::new(vec![]).rejecting_commands());
        let dispatcher =
            CommandDispatcher::new(telematics.clone(), Some("1234".into()), Duration::ZERO);

        let sent =
            tokio_test::assert_ok!(dispatcher.try_send_command(Command::DoorLock, "VIN1").await);
        assert!(!sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_waits_settle_delay() {
        let telematics = Arc::new(ScriptedTelematics::new(vec![]));
        let dispatcher =
            CommandDispatcher::new(telematics, Some("1234".into()), Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        assert!(dispatcher.try_send_command(Command::Locate, "VIN1").await.unwrap());
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
