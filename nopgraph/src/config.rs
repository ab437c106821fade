// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum ConfigError {
    LoadError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::LoadError(msg) => write!(f, "Configuration load error: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    4
}

impl ServerConfig {
    pub fn address_tuple(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    #[serde(default)]
    pub hsts_enabled: bool,
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age: u64,
}

fn default_hsts_max_age() -> u64 {
    31536000
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hsts_enabled: false,
            hsts_max_age: default_hsts_max_age(),
        }
    }
}

/// Controls how page trees are turned into response bodies.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RenderingConfig {
    /// When false every page is rendered into memory before it is sent.
    #[serde(default = "default_async_enabled")]
    pub async_enabled: bool,
    /// Upper bound on concurrently running render tasks.
    #[serde(default = "default_render_workers")]
    pub render_workers: usize,
}

fn default_async_enabled() -> bool {
    true
}

fn default_render_workers() -> usize {
    8
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            async_enabled: default_async_enabled(),
            render_workers: default_render_workers(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConfirmationConfig {
    #[serde(default = "default_registration_path")]
    pub registration_path: String,
    #[serde(default = "default_reset_path")]
    pub reset_path: String,
    #[serde(default = "default_key_param")]
    pub key_param: String,
    #[serde(default = "default_target")]
    pub default_target: String,
    #[serde(default = "default_target")]
    pub default_error_target: String,
}

fn default_registration_path() -> String {
    "/confirm_registration".to_string()
}

fn default_reset_path() -> String {
    "/reset-password".to_string()
}

fn default_key_param() -> String {
    "key".to_string()
}

fn default_target() -> String {
    "/".to_string()
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            registration_path: default_registration_path(),
            reset_path: default_reset_path(),
            key_param: default_key_param(),
            default_target: default_target(),
            default_error_target: default_target(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_cookie_name() -> String {
    "nopgraph_session".to_string()
}

fn default_session_ttl_seconds() -> u64 {
    86400
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_seconds: default_session_ttl_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub rendering: RenderingConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub rendering: RenderingConfig,
    pub confirmation: ConfirmationConfig,
    pub session: SessionConfig,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const MAX_RENDER_WORKERS: usize = 1024;

impl Config {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config_path = root.join("config.yaml");
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::parse(&config_content).map_err(|e| match e {
            ConfigError::LoadError(msg) => ConfigError::LoadError(format!(
                "Failed to parse config file '{}': {}",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    /// Loads and validates configuration at startup. If validation fails, the application should not start.
    pub fn load_and_validate(root: &Path) -> Result<ValidatedConfig, ConfigError> {
        Self::load(root)?.validate()
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        Self::validate_logging(&self.logging)?;
        Self::validate_rendering(&self.rendering)?;
        Self::validate_confirmation(&self.confirmation)?;
        Self::validate_session(&self.session)?;

        if self.server.workers == 0 {
            return Err(ConfigError::ValidationError(
                "server.workers must be at least 1".to_string(),
            ));
        }

        Ok(ValidatedConfig {
            app: self.app,
            server: self.server,
            logging: self.logging,
            security: self.security,
            rendering: self.rendering,
            confirmation: self.confirmation,
            session: self.session,
        })
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let level = logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got: {}",
                LOG_LEVELS.join(", "),
                logging.level
            )));
        }
        Ok(())
    }

    fn validate_rendering(rendering: &RenderingConfig) -> Result<(), ConfigError> {
        if !(1..=MAX_RENDER_WORKERS).contains(&rendering.render_workers) {
            return Err(ConfigError::ValidationError(format!(
                "rendering.render_workers must be between 1 and {}, got: {}",
                MAX_RENDER_WORKERS, rendering.render_workers
            )));
        }
        Ok(())
    }

    fn validate_confirmation(confirmation: &ConfirmationConfig) -> Result<(), ConfigError> {
        for (label, value) in [
            ("registration_path", &confirmation.registration_path),
            ("reset_path", &confirmation.reset_path),
            ("default_target", &confirmation.default_target),
            ("default_error_target", &confirmation.default_error_target),
        ] {
            if !value.starts_with('/') || value.starts_with("//") {
                return Err(ConfigError::ValidationError(format!(
                    "confirmation.{} must be a site-relative path, got: {}",
                    label, value
                )));
            }
        }
        if confirmation.key_param.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "confirmation.key_param must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
        if session.ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "session.ttl_seconds must be at least 1".to_string(),
            ));
        }
        let valid_cookie_name = !session.cookie_name.is_empty()
            && session
                .cookie_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid_cookie_name {
            return Err(ConfigError::ValidationError(format!(
                "session.cookie_name contains invalid characters: {}",
                session.cookie_name
            )));
        }
        Ok(())
    }
}

impl ValidatedConfig {
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        }
    }
}
