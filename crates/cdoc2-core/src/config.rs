use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::duration::parse_duration;
use crate::error::{Cdoc2Error, Cdoc2Result};

/// Top-level capsule server configuration (loaded from cdoc2.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Cdoc2Config {
    pub server: ServerConfig,
    pub key_capsule: KeyCapsuleConfig,
    pub storage: StorageConfig,
}

impl Cdoc2Config {
    pub fn from_toml_str(s: &str) -> Cdoc2Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| Cdoc2Error::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every duration string parses and the expiry bounds are sane.
    pub fn validate(&self) -> Cdoc2Result<()> {
        let default = self.key_capsule.default_expiration()?;
        let max = self.key_capsule.max_expiration()?;
        if default > max {
            return Err(Cdoc2Error::Config(format!(
                "default_expiration_duration ({}) exceeds max_expiration_duration ({})",
                self.key_capsule.default_expiration_duration,
                self.key_capsule.max_expiration_duration
            )));
        }
        let interval = self.key_capsule.cleanup.interval()?;
        if interval <= chrono::Duration::zero() {
            return Err(Cdoc2Error::Config(format!(
                "cleanup schedule must be positive, got {}",
                self.key_capsule.cleanup.schedule
            )));
        }
        Ok(())
    }
}

/// Which half of the key capsule API this instance serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// Accepts `POST /key-capsules`
    #[default]
    Put,
    /// Serves `GET /key-capsules/{id}` to mTLS-authenticated recipients
    Get,
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMode::Put => write!(f, "put"),
            ServerMode::Get => write!(f, "get"),
        }
    }
}

impl FromStr for ServerMode {
    type Err = Cdoc2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "put" => Ok(ServerMode::Put),
            "get" => Ok(ServerMode::Get),
            other => Err(Cdoc2Error::Config(format!(
                "unknown server mode '{other}' (expected put or get)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address (default: 0.0.0.0:8443)
    pub listen: String,
    pub mode: ServerMode,
    /// Prometheus metrics endpoint (default: 127.0.0.1:9100)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
    /// Accept the client identity from a header set by the TLS-terminating proxy
    pub trust_forwarded_identity: bool,
    /// Header carrying the base64 SPKI DER of the verified client certificate key
    pub forwarded_identity_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8443".into(),
            mode: ServerMode::Put,
            metrics_addr: Some("127.0.0.1:9100".into()),
            log_level: "info".into(),
            log_format: "json".into(),
            trust_forwarded_identity: false,
            forwarded_identity_header: "x-client-public-key".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyCapsuleConfig {
    /// Expiry assigned when the client does not request one (ISO-8601 duration)
    pub default_expiration_duration: String,
    /// Upper bound for a requested expiry; longer requests are clamped
    pub max_expiration_duration: String,
    pub cleanup: CleanupConfig,
}

impl KeyCapsuleConfig {
    pub fn default_expiration(&self) -> Cdoc2Result<chrono::Duration> {
        parse_duration(&self.default_expiration_duration)
    }

    pub fn max_expiration(&self) -> Cdoc2Result<chrono::Duration> {
        parse_duration(&self.max_expiration_duration)
    }
}

impl Default for KeyCapsuleConfig {
    fn default() -> Self {
        Self {
            default_expiration_duration: "P1095D".into(),
            max_expiration_duration: "P1825D".into(),
            cleanup: CleanupConfig::default(),
        }
    }
}

/// Expired capsule sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,
    /// Sweep interval as an ISO-8601 duration (default: PT24H)
    pub schedule: String,
}

impl CleanupConfig {
    pub fn interval(&self) -> Cdoc2Result<chrono::Duration> {
        parse_duration(&self.schedule)
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: "PT24H".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// RocksDB directory (used only by the rocksdb backend)
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("/var/lib/cdoc2/capsules"),
        }
    }
}
