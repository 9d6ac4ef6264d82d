use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Prefix for every environment variable the bridge reads.
pub const ENV_PREFIX: &str = "FCAUCONNECT_";

/// Load environment variables from a .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
///
/// Must be called before any other thread exists (in particular before the
/// tokio runtime is built).
pub fn load_dotenv(env_path: &Path) {
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: the caller guarantees the process is still single-threaded
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum Brand {
    Fiat,
    Jeep,
    Ram,
    Dodge,
    AlfaRomeo,
}

impl Brand {
    /// Brands whose cloud API is known to differ from the Fiat one in places.
    pub fn is_experimental(&self) -> bool {
        matches!(self, Brand::Ram | Brand::Dodge | Brand::AlfaRomeo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum Region {
    Europe,
    US,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub fca: FcaConfig,
    pub mqtt: MqttConfig,
    pub home_assistant: HomeAssistantConfig,
    pub sync: SyncConfig,
    pub dev_mode: bool,
    pub use_fake_api: bool,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcaConfig {
    pub user: String,
    pub password: String,
    pub pin: Option<String>,
    pub brand: Brand,
    pub region: Region,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeAssistantConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Minutes between two synchronization cycles (1..=1440).
    pub refresh_interval: u32,
    pub start_delay_seconds: u64,
    pub auto_refresh_location: bool,
    pub auto_refresh_battery: bool,
    pub enable_dangerous_commands: bool,
    pub convert_km_to_miles: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fca: FcaConfig {
                user: String::new(),
                password: String::new(),
                pin: None,
                brand: Brand::Fiat,
                region: Region::Europe,
            },
            mqtt: MqttConfig {
                broker_host: String::new(),
                broker_port: 1883,
                client_id: "FCAUconnect".to_string(),
                username: None,
                password: None,
            },
            home_assistant: HomeAssistantConfig {
                url: "http://supervisor/core".to_string(),
                token: String::new(),
            },
            sync: SyncConfig {
                refresh_interval: 15,
                start_delay_seconds: 1,
                auto_refresh_location: false,
                auto_refresh_battery: false,
                enable_dangerous_commands: true,
                convert_km_to_miles: false,
            },
            dev_mode: false,
            use_fake_api: false,
            debug: false,
        }
    }
}

impl Config {
    /// Build the configuration from `FCAUCONNECT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Build the configuration from an arbitrary key lookup (keys without prefix).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(user) = lookup("FCAUSER") {
            config.fca.user = user;
        }
        if let Some(pw) = lookup("FCAPW") {
            config.fca.password = pw;
        }
        if let Some(pin) = lookup("FCAPIN")
            && !pin.trim().is_empty()
        {
            config.fca.pin = Some(pin);
        }
        if let Some(brand) = lookup("BRAND") {
            config.fca.brand = parse_value("BRAND", &brand)?;
        }
        if let Some(region) = lookup("REGION") {
            config.fca.region = parse_value("REGION", &region)?;
        }

        // MQTT configuration
        if let Some(host) = lookup("MQTTSERVER") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = lookup("MQTTPORT") {
            config.mqtt.broker_port = parse_value("MQTTPORT", &port)?;
        }
        if let Some(user) = lookup("MQTTUSER")
            && !user.is_empty()
        {
            config.mqtt.username = Some(user);
        }
        if let Some(pw) = lookup("MQTTPW")
            && !pw.is_empty()
        {
            config.mqtt.password = Some(pw);
        }

        // Home Assistant configuration
        if let Some(url) = lookup("HOMEASSISTANTURL") {
            config.home_assistant.url = url;
        }
        if let Some(token) = lookup("SUPERVISORTOKEN") {
            config.home_assistant.token = token;
        }

        // Synchronization behaviour
        if let Some(interval) = lookup("REFRESHINTERVAL") {
            config.sync.refresh_interval = parse_value("REFRESHINTERVAL", &interval)?;
        }
        if let Some(delay) = lookup("STARTDELAYSECONDS") {
            config.sync.start_delay_seconds = parse_value("STARTDELAYSECONDS", &delay)?;
        }
        if let Some(v) = lookup("AUTOREFRESHLOCATION") {
            config.sync.auto_refresh_location = parse_bool("AUTOREFRESHLOCATION", &v)?;
        }
        if let Some(v) = lookup("AUTOREFRESHBATTERY") {
            config.sync.auto_refresh_battery = parse_bool("AUTOREFRESHBATTERY", &v)?;
        }
        if let Some(v) = lookup("ENABLEDANGEROUSCOMMANDS") {
            config.sync.enable_dangerous_commands = parse_bool("ENABLEDANGEROUSCOMMANDS", &v)?;
        }
        if let Some(v) = lookup("CONVERTKMTOMILES") {
            config.sync.convert_km_to_miles = parse_bool("CONVERTKMTOMILES", &v)?;
        }

        if let Some(v) = lookup("DEVMODE") {
            config.dev_mode = parse_bool("DEVMODE", &v)?;
        }
        if let Some(v) = lookup("USEFAKEAPI") {
            config.use_fake_api = parse_bool("USEFAKEAPI", &v)?;
        }
        if let Some(v) = lookup("DEBUG") {
            config.debug = parse_bool("DEBUG", &v)?;
        }

        if config.dev_mode {
            config.mqtt.client_id = "FCAUconnectDEV".to_string();
        }

        Ok(config)
    }

    /// Check required values and ranges. Called once at startup.
    pub fn validate(&self) -> Result<()> {
        if self.fca.user.trim().is_empty() {
            return Err(BridgeError::Config("FCAUser is required".into()));
        }
        if self.fca.password.is_empty() {
            return Err(BridgeError::Config("FCAPw is required".into()));
        }
        if self.mqtt.broker_host.trim().is_empty() {
            return Err(BridgeError::Config("MqttServer is required".into()));
        }
        if self.mqtt.broker_port == 0 {
            return Err(BridgeError::Config("MqttPort must be at least 1".into()));
        }
        if !(1..=1440).contains(&self.sync.refresh_interval) {
            return Err(BridgeError::Config(format!(
                "RefreshInterval must be between 1 and 1440 minutes, got {}",
                self.sync.refresh_interval
            )));
        }
        Ok(())
    }

    pub fn is_pin_set(&self) -> bool {
        self.fca
            .pin
            .as_deref()
            .is_some_and(|pin| !pin.trim().is_empty())
    }

    /// Pretty JSON dump with credentials masked, safe for logging.
    pub fn to_string_without_secrets(&self) -> String {
        let mut masked = self.clone();

        let visible: String = self.fca.user.chars().take(2).collect();
        let hidden = self.fca.user.chars().count().saturating_sub(2);
        masked.fca.user = format!("{visible}{}", "*".repeat(hidden));
        masked.fca.password = mask(&self.fca.password);
        masked.fca.pin = self.fca.pin.as_deref().map(mask);
        masked.mqtt.password = self.mqtt.password.as_deref().map(mask);
        masked.home_assistant.token = mask(&self.home_assistant.token);

        serde_json::to_string_pretty(&masked).unwrap_or_else(|e| format!("<unprintable: {e}>"))
    }
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| BridgeError::Config(format!("{ENV_PREFIX}{key}: invalid value '{raw}'")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(BridgeError::Config(format!(
            "{ENV_PREFIX}{key}: expected a boolean, got '{raw}'"
        ))),
    }
}
