//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components, loadable from a
//! TOML file with environment variable overrides.

use crate::heygen::{ApiConfig, Quality};
use crate::relay::AggregatorConfig;
use crate::session::{AvatarConfig, MediaConfig};
use crate::widget::WidgetConfig;
use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variables read by [`BridgeConfig::apply_env`]
pub mod env {
    pub const API_KEY: &str = "HEYGEN_API_KEY";
    pub const API_URL: &str = "HEYGEN_API_URL";
    pub const AVATAR_ID: &str = "HEYGEN_AVATAR_ID";
    pub const VOICE_ID: &str = "HEYGEN_VOICE_ID";
    pub const SESSION_ID: &str = "HEYGEN_SESSION_ID";
    pub const WIDGET_PROCESS_ID: &str = "LOYJOY_PROCESS_ID";
}

/// Configuration for the complete bridge
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Vendor API access
    pub api: ApiConfig,

    /// Avatar and voice selection
    pub avatar: AvatarConfig,

    /// Chat widget
    pub widget: WidgetConfig,

    /// Text aggregation
    pub relay: AggregatorConfig,

    /// Media settings
    pub media: MediaConfig,
}

impl BridgeConfig {
    /// Create a configuration with an API key and avatar
    pub fn new(
        api_key: impl Into<String>,
        avatar_id: impl Into<String>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            api: ApiConfig::new(api_key),
            avatar: AvatarConfig::new(avatar_id, voice_id),
            ..Default::default()
        }
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            BridgeError::ConfigError(msg) => {
                BridgeError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BridgeError::ConfigError(e.to_string()))
    }

    /// Override fields from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override fields from `lookup`; empty values are ignored
    pub fn apply_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::API_KEY) {
            self.api.api_key = v;
        }
        if let Some(v) = get(env::API_URL) {
            self.api.base_url = v;
        }
        if let Some(v) = get(env::AVATAR_ID) {
            self.avatar.avatar_id = v;
        }
        if let Some(v) = get(env::VOICE_ID) {
            self.avatar.voice_id = v;
        }
        if let Some(v) = get(env::SESSION_ID) {
            self.media.attach_session_id = Some(v);
        }
        if let Some(v) = get(env::WIDGET_PROCESS_ID) {
            self.widget.process_id = v;
        }
        self
    }

    /// Set the quiet period of the text aggregator
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.relay = self.relay.with_quiet_period(quiet_period);
        self
    }

    /// Set the stream quality
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.avatar.quality = quality;
        self
    }

    /// Set the widget process
    pub fn with_widget_process(mut self, process_id: impl Into<String>) -> Self {
        self.widget.process_id = process_id.into();
        self
    }

    /// Speak into an existing session instead of opening one
    pub fn with_attach_session(mut self, session_id: impl Into<String>) -> Self {
        self.media.attach_session_id = Some(session_id.into());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.trim().is_empty() {
            return Err(BridgeError::ConfigError(
                "Please provide your HeyGen API key".to_string(),
            ));
        }

        let base_url = self.api.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(BridgeError::ConfigError(format!(
                "API base URL must be http(s): {}",
                base_url
            )));
        }

        if self.relay.quiet_period_ms == 0 {
            return Err(BridgeError::ConfigError(
                "Quiet period must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
