use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Placeholder session secret shipped for local development only.
pub const DEV_SESSION_SECRET: &str = "dev-secret-change-me";

/// Server settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_secret: String,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = var("PINBOARD_PORT", "3000");
        let config = Self {
            host: var("PINBOARD_HOST", "0.0.0.0"),
            port: port
                .parse()
                .with_context(|| format!("PINBOARD_PORT is not a port number: {}", port))?,
            db_path: var("PINBOARD_DB_PATH", "pinboard.db").into(),
            session_secret: var("PINBOARD_SESSION_SECRET", DEV_SESSION_SECRET),
            upload_dir: var("PINBOARD_UPLOAD_DIR", "./uploads").into(),
            static_dir: var("PINBOARD_STATIC_DIR", "./static").into(),
        };

        if config.session_secret == DEV_SESSION_SECRET {
            warn!("PINBOARD_SESSION_SECRET is unset; using the development placeholder");
        }

        Ok(config)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
