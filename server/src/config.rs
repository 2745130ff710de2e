use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub frontend_url: Url,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub expose_error_details: bool,
    pub auth_rate_per_minute: u32,
    /// Lower-cased addresses that register as admins.
    pub admin_emails: Vec<String>,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_ok() {
            info!("Loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if var("MONGODB_URI").is_some() {
            warn!("MONGODB_URI is set but the document store is no longer used; ignoring it");
        }

        let database_url = database_url(&var)?;
        if database_url.is_none() {
            warn!("No database URL configured, using the in-memory store");
        }

        let frontend_url = var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".into());
        let frontend_url = Url::parse(&frontend_url).map_err(|e| ConfigError::Invalid {
            key: "FRONTEND_URL",
            message: e.to_string(),
        })?;

        let admin_emails = var("ADMIN_EMAILS")
            .map(|list| {
                list.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port: parse(&var, "PORT", 5000)?,
            database_url,
            database_max_connections: parse(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            jwt_ttl_hours: parse(&var, "JWT_TTL_HOURS", 168)?,
            frontend_url,
            upload_dir: var("UPLOAD_DIR").unwrap_or_else(|| "uploads".into()).into(),
            max_upload_bytes: parse(&var, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            expose_error_details: parse(&var, "EXPOSE_ERROR_DETAILS", false)?,
            auth_rate_per_minute: parse(&var, "AUTH_RATE_PER_MINUTE", 10)?,
            admin_emails,
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn database_url<F>(var: &F) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = var("POSTGRES_URI").or_else(|| var("DATABASE_URL")) {
        return Ok(Some(url));
    }
    match var("MARIADB_URI") {
        Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
            Ok(Some(url))
        }
        Some(_) => Err(ConfigError::Invalid {
            key: "MARIADB_URI",
            message: "only postgres:// URLs are supported".into(),
        }),
        None => Ok(None),
    }
}

fn parse<F, T>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
