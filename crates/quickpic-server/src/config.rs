use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Duration;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown backend '{}' (expected sqlite or memory)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub backend: Backend,
    pub db_path: PathBuf,
    /// `None` keeps undelivered messages until acknowledged.
    pub message_retention: Option<Duration>,
    pub cleanup_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("QUICKPIC_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("QUICKPIC_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let host = get("QUICKPIC_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("QUICKPIC_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("QUICKPIC_PORT")?;
        let backend: Backend = get("QUICKPIC_BACKEND")
            .unwrap_or_else(|| "sqlite".into())
            .parse()?;
        let db_path: PathBuf = get("QUICKPIC_DB_PATH")
            .unwrap_or_else(|| "quickpic.db".into())
            .into();
        let retention_hours: i64 = get("QUICKPIC_MESSAGE_RETENTION_HOURS")
            .unwrap_or_else(|| "0".into())
            .parse()
            .context("QUICKPIC_MESSAGE_RETENTION_HOURS")?;
        let cleanup_interval_secs: u64 = get("QUICKPIC_CLEANUP_INTERVAL_SECS")
            .unwrap_or_else(|| "3600".into())
            .parse()
            .context("QUICKPIC_CLEANUP_INTERVAL_SECS")?;
        if cleanup_interval_secs == 0 {
            bail!("QUICKPIC_CLEANUP_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            host,
            port,
            jwt_secret,
            backend,
            db_path,
            message_retention: (retention_hours > 0).then(|| Duration::hours(retention_hours)),
            cleanup_interval_secs,
        })
    }
}
