use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Deployment name, e.g. "Local" or "Production". Only used for logging.
    pub env_name: String,

    /// SQLite connection string, e.g. "sqlite:./shortener.db"
    pub database_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when building `url` and `admin_url`, e.g. "https://go.example.com"
    /// Must NOT have a trailing slash.
    pub base_url: String,

    pub keys: KeyConfig,
}

/// Lengths and retry ceilings used when minting public and secret keys.
#[derive(Debug, Clone, Copy)]
pub struct KeyConfig {
    pub key_length: usize,
    pub secret_key_length: usize,
    /// Candidates tried by the uniqueness resolver before giving up.
    pub max_key_attempts: usize,
    /// Full create attempts after the UNIQUE constraint rejects an insert.
    pub max_create_attempts: usize,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_length: 5,
            secret_key_length: 8,
            max_key_attempts: 64,
            max_create_attempts: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let defaults = KeyConfig::default();
        let keys = KeyConfig {
            key_length: positive_from_env("KEY_LENGTH", defaults.key_length)?,
            secret_key_length: positive_from_env("SECRET_KEY_LENGTH", defaults.secret_key_length)?,
            max_key_attempts: positive_from_env("MAX_KEY_ATTEMPTS", defaults.max_key_attempts)?,
            max_create_attempts: positive_from_env(
                "MAX_CREATE_ATTEMPTS",
                defaults.max_create_attempts,
            )?,
        };

        Ok(Self {
            env_name: std::env::var("ENV_NAME").unwrap_or_else(|_| "Local".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./shortener.db".into()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            base_url,
            keys,
        })
    }
}

fn positive_from_env(name: &str, default: usize) -> Result<usize> {
    let value = match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("{name} must be a positive integer"))?,
        Err(_) => default,
    };

    if value == 0 {
        anyhow::bail!("{name} must be greater than zero");
    }

    Ok(value)
}
