//! Configuration types for Hartrace

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::har::Creator;
use crate::url::has_scheme;
use crate::{HartraceError, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local port the recording proxy listens on
    pub listen_port: u16,
    /// Base URL for requests that arrive without an absolute target
    #[serde(default)]
    pub upstream: Option<String>,
    /// Directory the final archive is written to on shutdown
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    /// Recorder settings
    #[serde(default)]
    pub recorder: RecorderConfig,
    /// Which traffic is left out of the archive
    #[serde(default)]
    pub filter: FilterConfig,
    /// Canned local responses
    #[serde(default)]
    pub responders: Vec<ResponderConfig>,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Recorder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Origin relative URLs are resolved against
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Identifier of the single tracked page
    #[serde(default = "default_page_id")]
    pub page_id: String,
    /// Creator written into every archive
    #[serde(default = "default_creator")]
    pub creator: Creator,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            page_id: default_page_id(),
            creator: default_creator(),
        }
    }
}

fn default_origin() -> String {
    "http://localhost".to_string()
}

fn default_page_id() -> String {
    "page_1".to_string()
}

fn default_creator() -> Creator {
    Creator {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Traffic filtering applied by the interception layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// URLs or paths that are forwarded but never recorded
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    /// Error statuses that are not recorded
    #[serde(default = "default_ignore_error_statuses")]
    pub ignore_error_statuses: Vec<u16>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
            ignore_error_statuses: default_ignore_error_statuses(),
        }
    }
}

fn default_exclude() -> Vec<String> {
    vec!["/api/auth".to_string()]
}

fn default_ignore_error_statuses() -> Vec<u16> {
    vec![401]
}

/// Canned response served locally instead of forwarding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// URL the responder answers, as issued by the client
    pub url: String,
    /// Response status
    #[serde(default = "default_status")]
    pub status: u16,
    /// Response status text
    #[serde(default)]
    pub status_text: String,
    /// JSON body
    #[serde(default)]
    pub body: serde_json::Value,
}

fn default_status() -> u16 {
    200
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Maximum request or response body size in bytes
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: 4096,
            max_body_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HartraceError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| HartraceError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.listen_port == 0 {
            return Err(HartraceError::ConfigError(
                "listen_port cannot be 0".to_string(),
            ));
        }

        if !has_scheme(&self.recorder.origin) {
            return Err(HartraceError::ConfigError(format!(
                "recorder.origin must be an absolute http(s) URL: {}",
                self.recorder.origin
            )));
        }

        if self.recorder.page_id.is_empty() {
            return Err(HartraceError::ConfigError(
                "recorder.page_id cannot be empty".to_string(),
            ));
        }

        if let Some(upstream) = &self.upstream {
            if !has_scheme(upstream) {
                return Err(HartraceError::ConfigError(format!(
                    "upstream must be an absolute http(s) URL: {upstream}"
                )));
            }
        }

        if let Some(dir) = &self.export_dir {
            if !dir.is_dir() {
                return Err(HartraceError::ConfigError(format!(
                    "Export directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        for (i, responder) in self.responders.iter().enumerate() {
            if responder.url.is_empty() {
                return Err(HartraceError::ConfigError(format!(
                    "Responder {i}: url cannot be empty"
                )));
            }

            if !(100..600).contains(&responder.status) {
                return Err(HartraceError::ConfigError(format!(
                    "Responder {i}: invalid status {}",
                    responder.status
                )));
            }
        }

        if self.limits.max_connections == 0 {
            return Err(HartraceError::ConfigError(
                "limits.max_connections must be > 0".to_string(),
            ));
        }

        if self.limits.max_body_size == 0 {
            return Err(HartraceError::ConfigError(
                "limits.max_body_size must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
