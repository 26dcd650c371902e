use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("This email is already used: {0}")]
    DuplicateUser(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid amount {0}: must be above 0 and at most 1000000000000, with up to 2 decimal places")]
    InvalidAmount(Decimal),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Authentication failed: {0}")]
    AuthToken(String),

    #[error("Account {0} was modified concurrently")]
    VersionConflict(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalletError {
    /// Stable machine-readable code returned to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::DuplicateUser(_) => "duplicate_user",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountNotFound(_) => "account_not_found",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::AuthToken(_) => "auth_token_error",
            Self::VersionConflict(_) | Self::Store(_) | Self::Config(_) => "internal_error",
        }
    }

    /// Errors that indicate a server-side fault rather than a bad request
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::VersionConflict(_) | Self::Store(_) | Self::Config(_)
        )
    }
}

impl From<sled::Error> for WalletError {
    fn from(e: sled::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(format!("serialization: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
