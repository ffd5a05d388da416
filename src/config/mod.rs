//! Configuration management
//!
//! This module handles loading and parsing configuration for the deskpair server.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. The token
//! signing secret has no default and must be provided.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token signing configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// External identity provider
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Expired session cleanup
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Desktop pairing handoff
    #[serde(default)]
    pub pairing: PairingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/deskpair.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Token signing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for desktop tokens. Required.
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

/// Identity provider configuration
///
/// Points at the hosted auth service that resolves web session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the hosted platform (the `/auth/v1/user` path is appended)
    #[serde(default = "default_identity_url")]
    pub url: String,
    /// Public API key sent as the `apikey` header
    #[serde(default)]
    pub api_key: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: default_identity_url(),
            api_key: String::new(),
        }
    }
}

fn default_identity_url() -> String {
    "http://localhost:54321".to_string()
}

/// Expired session cleanup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between cleanup runs; 0 disables the background job
    #[serde(default = "default_cleanup_interval")]
    pub interval_seconds: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_cleanup_interval(),
        }
    }
}

fn default_cleanup_interval() -> u64 {
    3600
}

/// Desktop pairing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Custom URI scheme registered by the desktop client
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
        }
    }
}

fn default_scheme() -> String {
    "app".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Token signing secret is not configured (set auth.jwt_secret or DESKPAIR_AUTH_JWT_SECRET)")]
    MissingSigningSecret,
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - DESKPAIR_SERVER_HOST
    /// - DESKPAIR_SERVER_PORT
    /// - DESKPAIR_DATABASE_DRIVER
    /// - DESKPAIR_DATABASE_URL
    /// - DESKPAIR_AUTH_JWT_SECRET (or JWT_SECRET)
    /// - DESKPAIR_IDENTITY_URL
    /// - DESKPAIR_IDENTITY_API_KEY
    /// - DESKPAIR_CLEANUP_INTERVAL_SECONDS
    /// - DESKPAIR_PAIRING_SCHEME
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("DESKPAIR_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("DESKPAIR_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("DESKPAIR_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("DESKPAIR_DATABASE_URL") {
            self.database.url = url;
        }

        // The prefixed name wins over the bare one
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Ok(secret) = std::env::var("DESKPAIR_AUTH_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }

        if let Ok(url) = std::env::var("DESKPAIR_IDENTITY_URL") {
            self.identity.url = url;
        }
        if let Ok(key) = std::env::var("DESKPAIR_IDENTITY_API_KEY") {
            self.identity.api_key = key;
        }

        if let Ok(interval) = std::env::var("DESKPAIR_CLEANUP_INTERVAL_SECONDS") {
            if let Ok(interval) = interval.parse::<u64>() {
                self.cleanup.interval_seconds = interval;
            }
        }

        if let Ok(scheme) = std::env::var("DESKPAIR_PAIRING_SCHEME") {
            self.pairing.scheme = scheme;
        }
    }

    /// The token signing secret, or an error if it is unset or blank.
    pub fn signing_secret(&self) -> Result<&str, ConfigError> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => Ok(secret),
            _ => Err(ConfigError::MissingSigningSecret),
        }
    }

    /// Validate settings that have no usable default
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signing_secret()?;

        let scheme = self.pairing.scheme.as_str();
        let valid_scheme = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(ConfigError::ValidationError(format!(
                "pairing.scheme '{}' is not a valid URI scheme",
                scheme
            )));
        }

        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
