use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_CLASSIFIER_URL: &str = "http://localhost:5000";
pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 30;
/// Billing rate in monetary units per hour.
pub const DEFAULT_RATE_PER_HOUR: f64 = 2000.0;
/// Every completed session is billed at least this many hours.
pub const DEFAULT_MINIMUM_HOURS: f64 = 1.0;
/// Per-subscriber outbound queue depth before frames are dropped.
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 256;
/// Capacity of the classifier result channel feeding the reconciler.
pub const DEFAULT_DETECTION_BUFFER: usize = 64;
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const MAX_INBOUND_BYTES: usize = 16 * 1024;
/// Largest accepted capture upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_CAMERA_ID: &str = "cam1";

/// Top-level config (parkwatch.toml + PARKWATCH_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParkwatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub slots: SlotsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where captured frames are sent for slot classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL; the client posts to `{endpoint}/analyze`.
    #[serde(default = "default_classifier_url")]
    pub endpoint: String,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
    /// When false captures are stored and broadcast but never classified.
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_url(),
            timeout_secs: default_classifier_timeout(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_rate_per_hour")]
    pub rate_per_hour: f64,
    #[serde(default = "default_minimum_hours")]
    pub minimum_hours: f64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            rate_per_hour: DEFAULT_RATE_PER_HOUR,
            minimum_hours: DEFAULT_MINIMUM_HOURS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
    #[serde(default = "default_detection_buffer")]
    pub detection_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_queue: DEFAULT_SUBSCRIBER_QUEUE,
            detection_buffer: DEFAULT_DETECTION_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory that receives uploaded frames.
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    /// URL prefix under which stored frames are served.
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            public_prefix: default_public_prefix(),
        }
    }
}

/// Slots to provision at startup. Existing codes are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotsConfig {
    #[serde(default)]
    pub seed: Vec<SlotSeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSeed {
    pub code: String,
    #[serde(default = "default_zone")]
    pub zone: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

fn bool_true() -> bool {
    true
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_classifier_url() -> String {
    DEFAULT_CLASSIFIER_URL.to_string()
}
fn default_classifier_timeout() -> u64 {
    DEFAULT_CLASSIFIER_TIMEOUT_SECS
}
fn default_rate_per_hour() -> f64 {
    DEFAULT_RATE_PER_HOUR
}
fn default_minimum_hours() -> f64 {
    DEFAULT_MINIMUM_HOURS
}
fn default_subscriber_queue() -> usize {
    DEFAULT_SUBSCRIBER_QUEUE
}
fn default_detection_buffer() -> usize {
    DEFAULT_DETECTION_BUFFER
}
fn default_zone() -> String {
    "A".to_string()
}
fn default_public_prefix() -> String {
    "/media".to_string()
}
fn default_db_path() -> String {
    format!("{}/parkwatch.db", home_dir())
}
fn default_storage_dir() -> String {
    format!("{}/captures", home_dir())
}

fn home_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.parkwatch", home)
}

impl ParkwatchConfig {
    /// Load config from defaults, then a TOML file, then env overrides.
    ///
    /// Nested env keys use a double underscore:
    /// `PARKWATCH_BILLING__RATE_PER_HOUR=3000`. The legacy `AI_SERVICE_URL`
    /// variable is still honoured for the classifier endpoint.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::ParkError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(ParkwatchConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PARKWATCH_").split("__"))
            .merge(
                Env::raw()
                    .only(&["AI_SERVICE_URL"])
                    .map(|_| "classifier.endpoint".into()),
            )
    }
}

fn default_config_path() -> String {
    format!("{}/parkwatch.toml", home_dir())
}
