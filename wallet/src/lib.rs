//! Fake-money wallet ledger: accounts, authentication, balance changes and
//! server-side settlement of game rounds.

pub mod auth;
pub mod config;
pub mod error;
pub mod games;
pub mod service;
pub mod store;
pub mod types;

pub use auth::{AuthService, Claims, NewUser};
pub use config::WalletConfig;
pub use error::{Result, WalletError};
pub use service::{GameRequest, Receipt, Settlement, WalletService};
pub use store::AccountStore;
pub use types::{Account, Transaction, TransactionKind, User, UserId};
