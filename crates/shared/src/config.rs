use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{
    optional_trimmed_env, parse_socket_addr_env, parse_u64_env, path_env_or, string_env_or,
};

pub const DEFAULT_HTTPS_BIND_ADDR: &str = "0.0.0.0:443";
pub const DEFAULT_HTTP_BIND_ADDR: &str = "0.0.0.0:80";
pub const DEFAULT_TLS_CERT_PATH: &str = "/etc/letsencrypt/live/conspirewithkoala.com/fullchain.pem";
pub const DEFAULT_TLS_KEY_PATH: &str = "/etc/letsencrypt/live/conspirewithkoala.com/privkey.pem";
pub const DEFAULT_STATIC_DIR: &str = "dist";
pub const DEFAULT_INDEX_FILE: &str = "index.html";
pub const DEFAULT_PUBLIC_HOST: &str = "conspirewithkoala.com";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 30_000;
const PREFERENCES_DIR_NAME: &str = "conspire-with-koala";
const PREFERENCES_FILE_NAME: &str = "preferences.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

/// Loads a `.env` file from the working directory or its parents, if one exists.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::Dotenv(err.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub https_bind_addr: SocketAddr,
    pub http_bind_addr: SocketAddr,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub static_dir: PathBuf,
    pub index_file: PathBuf,
    pub public_host: String,
}

impl HostConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let static_dir = path_env_or("HOST_STATIC_DIR", DEFAULT_STATIC_DIR);
        let index_file = static_dir.join(string_env_or("HOST_INDEX_FILE", DEFAULT_INDEX_FILE));
        let public_host = string_env_or("HOST_PUBLIC_HOST", DEFAULT_PUBLIC_HOST);
        if public_host.contains('/') {
            return Err(ConfigError::InvalidConfiguration(
                "HOST_PUBLIC_HOST must be a bare host name".to_string(),
            ));
        }

        Ok(Self {
            https_bind_addr: parse_socket_addr_env(
                "HOST_HTTPS_BIND_ADDR",
                DEFAULT_HTTPS_BIND_ADDR,
            )?,
            http_bind_addr: parse_socket_addr_env("HOST_HTTP_BIND_ADDR", DEFAULT_HTTP_BIND_ADDR)?,
            tls_cert_path: path_env_or("HOST_TLS_CERT_PATH", DEFAULT_TLS_CERT_PATH),
            tls_key_path: path_env_or("HOST_TLS_KEY_PATH", DEFAULT_TLS_KEY_PATH),
            static_dir,
            index_file,
            public_host,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: String,
    pub stream_idle_timeout_ms: u64,
    pub preferences_path: PathBuf,
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let stream_idle_timeout_ms =
            parse_u64_env("KOALA_STREAM_IDLE_TIMEOUT_MS", DEFAULT_STREAM_IDLE_TIMEOUT_MS)?;
        if stream_idle_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "KOALA_STREAM_IDLE_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            model: string_env_or("KOALA_MODEL", DEFAULT_MODEL),
            stream_idle_timeout_ms,
            preferences_path: optional_trimmed_env("KOALA_PREFERENCES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_preferences_path),
        })
    }
}

fn default_preferences_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(PREFERENCES_DIR_NAME).join(PREFERENCES_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{PREFERENCES_DIR_NAME}-{PREFERENCES_FILE_NAME}")))
}
