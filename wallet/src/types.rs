use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::games::{Game, RoundResult};

/// Balance every new account opens with
pub const DEFAULT_STARTING_BALANCE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Decimal places kept for every amount written to the ledger
pub const MONEY_SCALE: u32 = 2;

/// Largest single deposit, withdrawal or bet (one trillion)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Derive the stable id for a username (SHA-256 of the normalized name)
    pub fn from_username(username: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_username(username).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub amount: Decimal,
    /// Bumped on every write; the store only accepts a write carrying the version it read
    pub version: u64,
    pub transactions: Vec<Transaction>,
}

impl Account {
    pub fn new(user_id: UserId, starting_balance: Decimal) -> Self {
        Self {
            user_id,
            amount: starting_balance.round_dp(MONEY_SCALE),
            version: 0,
            transactions: Vec::new(),
        }
    }

    /// Set the balance and append the matching ledger entry
    pub(crate) fn record(&mut self, kind: TransactionKind, amount: Decimal, new_balance: Decimal) -> &Transaction {
        self.amount = new_balance.round_dp(MONEY_SCALE);
        self.transactions.push(Transaction {
            id: Uuid::new_v4(),
            kind,
            amount: amount.round_dp(MONEY_SCALE),
            balance_after: self.amount,
            timestamp: Utc::now(),
        });
        &self.transactions[self.transactions.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Ledger label, serialized as free text ("Deposit", "Dice Win", ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    GameResult { game: Game, result: RoundResult },
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => f.write_str("Deposit"),
            Self::Withdrawal => f.write_str("Withdrawal"),
            Self::GameResult { game, result } => write!(f, "{} {}", game.title(), result),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "Withdrawal" => Ok(Self::Withdrawal),
            _ => {
                let (game, result) = s
                    .split_once(' ')
                    .ok_or_else(|| format!("unknown transaction type '{s}'"))?;
                Ok(Self::GameResult {
                    game: game.parse()?,
                    result: result.parse()?,
                })
            }
        }
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for TransactionKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
