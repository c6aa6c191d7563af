use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub carriers: CarriersConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            instance_id: default_instance_id(),
        }
    }
}

/// Provider API keys; a missing key leaves that carrier in synthetic mode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarriersConfig {
    #[serde(default)]
    pub dhl_api_key: Option<String>,
    #[serde(default)]
    pub ups_api_key: Option<String>,
    #[serde(default)]
    pub fedex_api_key: Option<String>,
    #[serde(default)]
    pub usps_api_key: Option<String>,
}

impl CarriersConfig {
    pub fn api_key(&self, carrier_code: &str) -> Option<&str> {
        match carrier_code {
            "DHL" => self.dhl_api_key.as_deref(),
            "UPS" => self.ups_api_key.as_deref(),
            "FEDEX" => self.fedex_api_key.as_deref(),
            "USPS" => self.usps_api_key.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Maximum age of a cached result served without an upstream call
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    /// Hard deadline on one carrier call
    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
            adapter_timeout_secs: default_adapter_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Per-subscriber outbound buffer; overflow disconnects the subscriber
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    #[serde(default = "default_cleanup_secs")]
    pub cleanup_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            subscriber_buffer: default_subscriber_buffer(),
            cleanup_secs: default_cleanup_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_expiry_sweep_secs")]
    pub expiry_sweep_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            expiry_sweep_secs: default_expiry_sweep_secs(),
        }
    }
}

/// Static bearer token -> user id map for the WebSocket surface
///
/// Empty means every connection is anonymous; deployments wanting JWT
/// plug a verifier in at the state layer instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

fn default_port() -> u16 {
    8080
}

fn default_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_staleness_secs() -> u64 {
    60
}

fn default_adapter_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_secs() -> u64 {
    15
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_cleanup_secs() -> u64 {
    30
}

fn default_expiry_sweep_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            carriers: CarriersConfig::default(),
            tracking: TrackingConfig::default(),
            realtime: RealtimeConfig::default(),
            notifications: NotificationsConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config: Self = if Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // environment overrides the file
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(key) = std::env::var("DHL_API_KEY") {
            config.carriers.dhl_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("UPS_API_KEY") {
            config.carriers.ups_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("FEDEX_API_KEY") {
            config.carriers.fedex_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("USPS_API_KEY") {
            config.carriers.usps_api_key = Some(key);
        }
        if let Ok(secs) = std::env::var("CACHE_STALENESS_SECS") {
            if let Ok(s) = secs.parse() {
                config.tracking.staleness_secs = s;
            }
        }

        Ok(config)
    }

    pub fn test_config() -> Self {
        Self {
            server: ServerConfig {
                port: std::env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
                instance_id: format!("test-{}", &default_instance_id()[..8]),
            },
            ..Self::default()
        }
    }
}
