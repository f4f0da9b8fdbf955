//! Bridge configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use livecast_ipc::{CapabilityMode, ConflictPolicy, StreamQuality};
use livecast_transport::{HandshakeTimeouts, DEFAULT_HANDSHAKE_TIMEOUT_MS};

/// Errors while loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings of a [`LivecastBridge`](crate::LivecastBridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// License key the platform video SDK is initialised with.
    pub sdk_key: String,

    /// Capture and publish preset.
    pub quality: StreamQuality,

    /// What a start does while a session is active.
    pub conflict_policy: ConflictPolicy,

    /// Bound on each handshake step.
    pub handshake_timeout_ms: u64,

    /// Force the broadcast capability answer.
    pub broadcast_capability: CapabilityMode,

    /// Debug-level logging when `RUST_LOG` is unset.
    pub verbose_log: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sdk_key: String::new(),
            quality: StreamQuality::default(),
            conflict_policy: ConflictPolicy::default(),
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            broadcast_capability: CapabilityMode::default(),
            verbose_log: false,
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Apply command-line and environment overrides.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(sdk_key) = &overrides.sdk_key {
            self.sdk_key.clone_from(sdk_key);
        }
        if let Some(quality) = overrides.quality {
            self.quality = quality;
        }
        if let Some(policy) = overrides.conflict_policy {
            self.conflict_policy = policy;
        }
        if let Some(timeout) = overrides.handshake_timeout_ms {
            self.handshake_timeout_ms = timeout;
        }
        if let Some(mode) = overrides.broadcast_capability {
            self.broadcast_capability = mode;
        }
        if overrides.verbose {
            self.verbose_log = true;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "handshake_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn handshake_timeouts(&self) -> HandshakeTimeouts {
        HandshakeTimeouts::uniform(Duration::from_millis(self.handshake_timeout_ms))
    }
}

/// Flags and environment variables that override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Platform video SDK license key
    #[arg(long, env = "LIVECAST_SDK_KEY", hide_env_values = true)]
    pub sdk_key: Option<String>,

    /// Stream quality: low360p, medium720p or high1080p
    #[arg(long, env = "LIVECAST_QUALITY", value_parser = parse_setting::<StreamQuality>)]
    pub quality: Option<StreamQuality>,

    /// Start while live: reject or restart
    #[arg(long, env = "LIVECAST_CONFLICT_POLICY", value_parser = parse_setting::<ConflictPolicy>)]
    pub conflict_policy: Option<ConflictPolicy>,

    /// Bound on each handshake step, in milliseconds
    #[arg(long, env = "LIVECAST_HANDSHAKE_TIMEOUT_MS")]
    pub handshake_timeout_ms: Option<u64>,

    /// Broadcast capability: auto, enabled or disabled
    #[arg(long, env = "LIVECAST_BROADCAST", value_parser = parse_setting::<CapabilityMode>)]
    pub broadcast_capability: Option<CapabilityMode>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse a flag with the same spelling the config file uses.
fn parse_setting<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|e| e.to_string())
}
