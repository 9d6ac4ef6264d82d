use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("PIN not set, remote commands are unavailable")]
    PinNotSet,

    #[error("Telematics authentication failed: {0}")]
    Auth(String),

    #[error("Telematics API error (status: {status:?})")]
    Api {
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("MQTT error: {0}")]
    Mqtt(String),

    #[error("Home Assistant API error: {0}")]
    HomeAssistant(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    #[error(transparent)]
    HttpError(#[from] reqwest::Error),
}

impl BridgeError {
    /// Transport and API level failures from the remote services.
    ///
    /// These are expected from time to time and get a softer log treatment
    /// than unexpected errors.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Auth(_)
                | BridgeError::Api { .. }
                | BridgeError::HomeAssistant(_)
                | BridgeError::HttpError(_)
        )
    }
}

impl From<rumqttc::ClientError> for BridgeError {
    fn from(e: rumqttc::ClientError) -> Self {
        BridgeError::Mqtt(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
