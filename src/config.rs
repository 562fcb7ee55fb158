use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use sqlx::postgres::PgConnectOptions;

/// Shortest secret accepted for signing session and flash cookies.
pub const MIN_SESSION_SECRET_LEN: usize = 64;

#[derive(Debug, Clone)]
pub enum DatabaseConfig {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
    },
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        match self {
            DatabaseConfig::Url(url) => {
                PgConnectOptions::from_str(url).context("parse DATABASE_URL")
            }
            DatabaseConfig::Parts {
                host,
                port,
                user,
                password,
                name,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(name)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub credentials: Option<(String, String)>,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub idle_minutes: i64,
    pub secure_cookies: bool,
    /// How often expired session records are purged from the store.
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub max_connections: u32,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub upload_limit_bytes: usize,
    pub cleanup_interval: Duration,
    pub pending_grace: Duration,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| var(name).with_context(|| format!("{name} must be set"));

        let database = match var("DATABASE_URL") {
            Some(url) => DatabaseConfig::Url(url),
            None => DatabaseConfig::Parts {
                host: var("DB_HOST").unwrap_or_else(|| "localhost".into()),
                port: parse_or(&var, "DB_PORT", 5432)?,
                user: required("DB_USER")?,
                password: var("DB_PASSWORD").unwrap_or_default(),
                name: required("DB_NAME")?,
            },
        };

        let credentials = match (var("S3_ACCESS_KEY"), var("S3_SECRET_KEY")) {
            (Some(access), Some(secret)) => Some((access, secret)),
            (None, None) => None,
            _ => bail!("S3_ACCESS_KEY and S3_SECRET_KEY must be set together"),
        };
        let storage = StorageConfig {
            bucket: required("S3_BUCKET")?,
            endpoint: var("S3_ENDPOINT"),
            credentials,
            region: var("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
        };

        let secret = required("SESSION_SECRET")?;
        if secret.len() < MIN_SESSION_SECRET_LEN {
            bail!("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes");
        }
        let session = SessionConfig {
            secret,
            idle_minutes: parse_or(&var, "SESSION_IDLE_MINUTES", 12 * 60)?,
            secure_cookies: parse_or(&var, "COOKIE_SECURE", false)?,
            sweep_interval: Duration::from_secs(parse_or(&var, "SESSION_SWEEP_SECS", 600)?),
        };

        let upload_limit_mb: usize = parse_or(&var, "UPLOAD_LIMIT_MB", 20)?;

        Ok(Self {
            database,
            max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
            storage,
            session,
            upload_limit_bytes: upload_limit_mb * 1024 * 1024,
            cleanup_interval: Duration::from_secs(parse_or(&var, "CLEANUP_INTERVAL_SECS", 300)?),
            pending_grace: Duration::from_secs(parse_or(&var, "PENDING_GRACE_SECS", 900)?),
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "APP_PORT", 8080)?,
        })
    }
}

fn parse_or<F, T>(var: &F, name: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {name}={raw:?}: {e}")),
    }
}
