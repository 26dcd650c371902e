use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;

use crate::error::{Result, WalletError};
use crate::types::DEFAULT_STARTING_BALANCE;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_url() -> String {
    "memory://".to_string()
}

const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_MAX_RETRIES: usize = 16;

/// Process-wide settings, read once at start-up and handed to the services
#[derive(Clone)]
pub struct WalletConfig {
    /// HMAC secret used to sign bearer tokens
    pub jwt_secret: String,
    /// `memory://` or `sled://<path>`
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub token_ttl: Duration,
    pub starting_balance: Decimal,
    /// Attempts at a balance write before giving up on contention
    pub max_retries: usize,
}

impl WalletConfig {
    /// Defaults for everything except the signing secret
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            database_url: default_database_url(),
            host: default_host(),
            port: default_port(),
            token_ttl: DEFAULT_TOKEN_TTL,
            starting_balance: DEFAULT_STARTING_BALANCE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| WalletError::Config("Missing required environment variable: JWT_SECRET".to_string()))?;

        let mut config = Self::new(jwt_secret);

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(host) = lookup("API_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            config.port = parse_var("API_PORT", &port)?;
        }
        if let Some(ttl) = lookup("TOKEN_TTL_SECS") {
            config.token_ttl = Duration::from_secs(parse_var("TOKEN_TTL_SECS", &ttl)?);
        }
        if let Some(balance) = lookup("STARTING_BALANCE") {
            let balance: Decimal = parse_var("STARTING_BALANCE", &balance)?;
            if balance < Decimal::ZERO {
                return Err(WalletError::Config("STARTING_BALANCE must not be negative".to_string()));
            }
            config.starting_balance = balance;
        }
        if let Some(retries) = lookup("BALANCE_WRITE_RETRIES") {
            config.max_retries = parse_var("BALANCE_WRITE_RETRIES", &retries)?;
        }

        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| WalletError::Config(format!("Invalid value for {key}: '{value}'")))
}

// Keeps the signing secret out of logs
impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("jwt_secret", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token_ttl", &self.token_ttl)
            .field("starting_balance", &self.starting_balance)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
