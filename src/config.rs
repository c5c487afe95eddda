use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://practice_records.db?mode=rwc";
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] =
    ["http://localhost:3000", "https://practice-record.vercel.app"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub allowed_origins: Vec<String>,
    pub otlp_endpoint: Option<String>,
    pub otlp_headers: Option<String>,
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
            otlp_endpoint: None,
            otlp_headers: None,
            environment: "development".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads configuration from the process environment, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database = DatabaseConfig {
            url: database_url(),
            max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.database.max_connections)?,
            acquire_timeout: Duration::from_secs(parse_var(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.database.acquire_timeout.as_secs(),
            )?),
        };

        let allowed_origins = match non_empty_var("CORS_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.allowed_origins,
        };

        Ok(Self {
            database,
            allowed_origins,
            otlp_endpoint: non_empty_var("OTEL_EXPORTER_OTLP_ENDPOINT"),
            otlp_headers: non_empty_var("OTEL_EXPORTER_OTLP_HEADERS"),
            environment: non_empty_var("DEPLOYMENT_ENVIRONMENT").unwrap_or(defaults.environment),
        })
    }

    /// Connection parameters meant for a database server. SQLite ignores them,
    /// but they are reported so a misconfigured deployment is visible in the logs.
    pub fn ignored_server_parameters() -> Vec<&'static str> {
        ["DB_HOST", "DB_PORT", "DB_USER_NAME", "DB_USER_PASS"]
            .into_iter()
            .filter(|key| non_empty_var(key).is_some())
            .collect()
    }
}

fn database_url() -> String {
    if let Some(url) = non_empty_var("DATABASE_URL") {
        return url;
    }

    match non_empty_var("DB_NAME") {
        Some(name) => format!("sqlite://{}.db?mode=rwc", name),
        None => DEFAULT_DATABASE_URL.to_string(),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", key, raw)),
        None => Ok(default),
    }
}
