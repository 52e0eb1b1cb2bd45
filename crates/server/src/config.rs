//! Configuration for the lanshare server.
//!
//! Configuration comes from CLI flags, optionally merged from a TOML file.
//! The struct is read-only once the server starts; nothing here is mutated
//! at request time.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("webroot does not exist or is not a directory: {0}")]
    InvalidWebroot(String),

    #[error("upload directory does not exist or is not a directory: {0}")]
    InvalidUploadDir(String),

    #[error("port must be non-zero")]
    InvalidPort,

    #[error("read_only and upload_only are mutually exclusive")]
    ConflictingModes,

    #[error("credential must be 'user:password' or 'user:bcrypt-hash', got '{0}'")]
    InvalidCredential(String),

    #[error("tls requires both cert and key paths")]
    IncompleteTls,
}

/// Main configuration for the lanshare server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_ip: String,

    /// Port to listen on.
    pub port: u16,

    /// Directory served to clients.
    pub webroot: PathBuf,

    /// Directory uploads land in. Defaults to the webroot.
    pub upload_dir: Option<PathBuf>,

    /// Serve files but refuse uploads and deletes.
    pub read_only: bool,

    /// Accept uploads but refuse listings, downloads and deletes.
    pub upload_only: bool,

    /// Refuse deletes while allowing everything else.
    pub no_delete: bool,

    /// Disable the shared clipboard.
    pub no_clipboard: bool,

    /// Allow viewers to run shell commands on the host.
    pub enable_command: bool,

    /// Server-wide basic-auth credential as `user:password` or
    /// `user:bcrypt-hash`.
    pub credential: Option<String>,

    /// Comma-separated CIDR allow-list. Empty disables filtering.
    pub whitelist: String,

    /// Comma-separated CIDRs of proxies whose forwarded headers are trusted.
    pub trusted_proxies: String,

    /// PEM certificate path when serving TLS.
    pub tls_cert: Option<PathBuf>,

    /// PEM key path when serving TLS.
    pub tls_key: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: "0.0.0.0".to_string(),
            port: 8000,
            webroot: PathBuf::from("."),
            upload_dir: None,
            read_only: false,
            upload_only: false,
            no_delete: false,
            no_clipboard: false,
            enable_command: false,
            credential: None,
            whitelist: String::new(),
            trusted_proxies: String::new(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Validate all configuration values.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.webroot.is_dir() {
            return Err(ConfigError::InvalidWebroot(
                self.webroot.display().to_string(),
            ));
        }
        if let Some(upload_dir) = &self.upload_dir {
            if !upload_dir.is_dir() {
                return Err(ConfigError::InvalidUploadDir(
                    upload_dir.display().to_string(),
                ));
            }
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.read_only && self.upload_only {
            return Err(ConfigError::ConflictingModes);
        }
        if let Some(credential) = &self.credential {
            if !credential.contains(':') || credential.starts_with(':') {
                return Err(ConfigError::InvalidCredential(credential.clone()));
            }
        }
        if self.tls_cert.is_some() != self.tls_key.is_some() {
            return Err(ConfigError::IncompleteTls);
        }
        Ok(())
    }

    /// Whether a server-wide credential gate is configured.
    pub fn auth_enabled(&self) -> bool {
        self.credential.is_some()
    }

    /// The directory uploads are written to.
    pub fn upload_root(&self) -> &Path {
        self.upload_dir.as_deref().unwrap_or(&self.webroot)
    }

    /// Whether TLS serving is configured.
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert.is_some() && self.tls_key.is_some()
    }
}
