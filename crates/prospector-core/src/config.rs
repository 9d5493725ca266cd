//! Prospector configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ProspectorError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProspectorConfig {
    /// Path to the sqlite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Maximum outreach attempts per UTC calendar day.
    #[serde(default = "default_daily_limit")]
    pub daily_connection_limit: u32,
    /// Fixed delay between consecutive channel actions, in seconds.
    /// This delay is the rate-limiting mechanism.
    #[serde(default = "default_action_delay")]
    pub action_delay_secs: u64,
    /// Days to wait before sending a follow-up.
    #[serde(default = "default_followup_days")]
    pub followup_days: i64,
    /// How often the due-follow-up dispatch job runs, in seconds.
    #[serde(default = "default_dispatch_interval")]
    pub followup_dispatch_interval_secs: u64,
    /// How often new follow-ups are scheduled for fresh connections.
    #[serde(default = "default_schedule_interval")]
    pub followup_schedule_interval_secs: u64,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
}

fn default_database_path() -> String {
    ProspectorConfig::home_dir()
        .join("prospector.db")
        .display()
        .to_string()
}
fn default_daily_limit() -> u32 { 20 }
fn default_action_delay() -> u64 { 30 }
fn default_followup_days() -> i64 { 7 }
fn default_dispatch_interval() -> u64 { 3600 }
fn default_schedule_interval() -> u64 { 21600 }

impl Default for ProspectorConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            daily_connection_limit: default_daily_limit(),
            action_delay_secs: default_action_delay(),
            followup_days: default_followup_days(),
            followup_dispatch_interval_secs: default_dispatch_interval(),
            followup_schedule_interval_secs: default_schedule_interval(),
            gateway: GatewayConfig::default(),
            channel: ChannelConfig::default(),
            composer: ComposerConfig::default(),
        }
    }
}

impl ProspectorConfig {
    /// Load config from the default path (~/.prospector/config.toml),
    /// falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default().with_env_overrides())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProspectorError::Config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ProspectorError::Config(format!("failed to parse config: {e}")))?;
        Ok(config.with_env_overrides())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProspectorError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Prospector home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".prospector")
    }

    /// Secrets are never required in the file; env vars win when set.
    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("PROSPECTOR_CHANNEL_EMAIL") {
            self.channel.email = v;
        }
        if let Ok(v) = std::env::var("PROSPECTOR_CHANNEL_PASSWORD") {
            self.channel.password = v;
        }
        if let Ok(v) = std::env::var("PROSPECTOR_COMPOSER_API_KEY") {
            self.composer.api_key = v;
        }
        self
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8900 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

/// Outreach channel configuration. The bridge URL points at the browser
/// automation sidecar that performs the real network actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Per-call timeout for bridge requests, in seconds.
    #[serde(default = "default_channel_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bridge_url() -> String { "http://127.0.0.1:8811".into() }
fn default_channel_timeout() -> u64 { 120 }

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            email: String::new(),
            password: String::new(),
            request_timeout_secs: default_channel_timeout(),
        }
    }
}

/// Message composer configuration (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    #[serde(default = "default_composer_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_composer_model")]
    pub model: String,
    #[serde(default = "default_composer_temperature")]
    pub temperature: f32,
}

fn default_composer_endpoint() -> String { "https://api.mistral.ai/v1".into() }
fn default_composer_model() -> String { "mistral-medium-latest".into() }
fn default_composer_temperature() -> f32 { 0.7 }

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_composer_endpoint(),
            api_key: String::new(),
            model: default_composer_model(),
            temperature: default_composer_temperature(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ProspectorConfig::default();
        assert_eq!(cfg.daily_connection_limit, 20);
        assert_eq!(cfg.action_delay_secs, 30);
        assert_eq!(cfg.followup_days, 7);
        assert!(cfg.followup_dispatch_interval_secs < cfg.followup_schedule_interval_secs);
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: ProspectorConfig = toml::from_str(
            r#"
            daily_connection_limit = 5
            [gateway]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.daily_connection_limit, 5);
        assert_eq!(cfg.gateway.port, 9000);
        // untouched sections keep their defaults
        assert_eq!(cfg.action_delay_secs, 30);
        assert_eq!(cfg.composer.model, "mistral-medium-latest");
    }
}
