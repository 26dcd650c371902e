//! Signup, login and bearer tokens.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::error::{Result, WalletError};
use crate::store::AccountStore;
use crate::types::{Account, User, UserId, normalize_username};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=30;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_NAME_LEN: usize = 50;

/// Bearer token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    pub fn user_id(&self) -> UserId {
        UserId(self.sub.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WalletError::Store(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored PHC hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

/// Hash checked when the username is unknown, so a miss costs as much as a wrong password
fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password("decoy-password-never-matches").ok())
        .as_deref()
}

/// Loose email shape check: `local@domain.tld`, no whitespace
fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !host.starts_with('.') && tld.len() >= 2,
        None => false,
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<()> {
    if !USERNAME_LEN.contains(&username.len()) || !is_email(username) {
        return Err(WalletError::Validation(
            "username must be a valid email address".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WalletError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_name(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LEN {
        return Err(WalletError::Validation(format!(
            "{field} must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AccountStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    starting_balance: Decimal,
}

impl AuthService {
    pub fn new(store: Arc<dyn AccountStore>, config: &WalletConfig) -> Self {
        Self {
            store,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: config.token_ttl,
            starting_balance: config.starting_balance,
        }
    }

    /// Register a user and open their account; returns the starting balance
    pub fn signup(&self, new_user: NewUser) -> Result<Decimal> {
        let username = normalize_username(&new_user.username);
        validate_credentials(&username, &new_user.password)?;
        let first_name = validate_name("firstName", &new_user.first_name)?;
        let last_name = validate_name("lastName", &new_user.last_name)?;

        if self.store.find_user(&username)?.is_some() {
            return Err(WalletError::DuplicateUser(username));
        }

        let id = UserId::from_username(&username);
        let user = User {
            id: id.clone(),
            username,
            password_hash: hash_password(&new_user.password)?,
            first_name,
            last_name,
            created_at: Utc::now(),
        };
        let account = Account::new(id, self.starting_balance);

        // The store re-checks uniqueness atomically in case of a concurrent signup
        self.store.insert_user(&user, &account)?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(account.amount)
    }

    /// Check credentials and issue a bearer token
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let username = normalize_username(username);
        validate_credentials(&username, password)?;

        let user = match self.store.find_user(&username)? {
            Some(user) if verify_password(password, &user.password_hash) => user,
            Some(_) => {
                debug!(username = %username, "Login rejected: wrong password");
                return Err(WalletError::InvalidCredentials);
            }
            None => {
                if let Some(hash) = decoy_hash() {
                    verify_password(password, hash);
                }
                debug!(username = %username, "Login rejected: unknown user");
                return Err(WalletError::InvalidCredentials);
            }
        };

        info!(user_id = %user.id, "User logged in");
        self.issue_token(&user, Utc::now().timestamp().max(0) as u64)
    }

    /// Sign a token for `user` as if issued at `issued_at` (unix seconds)
    pub fn issue_token(&self, user: &User, issued_at: u64) -> Result<String> {
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: issued_at,
            exp: issued_at + self.token_ttl.as_secs(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| WalletError::Config(format!("could not sign token: {e}")))
    }

    /// Validate signature and expiry of a bearer token
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => WalletError::AuthToken("token expired".to_string()),
                ErrorKind::InvalidSignature => {
                    WalletError::AuthToken("invalid token signature".to_string())
                }
                _ => WalletError::AuthToken("invalid token".to_string()),
            })
    }
}
