use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wallet::games::{GameParams, RoundOutcome};
use wallet::{GameRequest, Transaction, TransactionKind, UserId, WalletError};

use super::run_blocking;
use crate::{
    AppState,
    error::ApiError,
    middleware::{AuthUser, JsonBody, MaybeAuthUser},
};

// Ledger entry as sent to clients; money goes out as JSON numbers
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            kind: tx.kind,
            amount: tx.amount,
            balance_after: tx.balance_after,
            timestamp: tx.timestamp,
        }
    }
}

// Balance response
#[derive(Serialize)]
pub struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

// Transaction history response
#[derive(Serialize)]
pub struct TransactionsResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub transactions: Vec<TransactionView>,
}

// Deposit / withdraw request; the account comes from the token or the body
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsRequest {
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub amount: Decimal,
}

// Deposit / withdraw response
#[derive(Serialize)]
pub struct FundsResponse {
    pub message: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

// Game result request, as sent by the game pages
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub balance: Option<Decimal>,
    pub game_result: String,
    pub bet_amount: Decimal,
    #[serde(default)]
    pub params: GameParams,
}

// Game result response
#[derive(Serialize)]
pub struct UpdateResponse {
    pub message: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub transaction: TransactionView,
    pub outcome: RoundOutcome,
}

impl FundsRequest {
    // A valid token always wins over whatever the body names
    fn target(&self, user: &MaybeAuthUser) -> Result<UserId, WalletError> {
        if let Some(claims) = &user.0 {
            return Ok(claims.user_id());
        }
        match (&self.user_id, &self.username) {
            (Some(user_id), _) if !user_id.trim().is_empty() => {
                Ok(UserId(user_id.trim().to_string()))
            }
            (_, Some(username)) if !username.trim().is_empty() => {
                Ok(UserId::from_username(username))
            }
            _ => Err(WalletError::Validation(
                "username or userId is required".to_string(),
            )),
        }
    }
}

// Get balance endpoint
pub async fn get_balance(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let wallet = state.wallet.clone();
    let balance = run_blocking(move || wallet.get_balance(&claims.user_id())).await?;
    Ok(Json(BalanceResponse { balance }))
}

// Transaction history endpoint
pub async fn get_transactions(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let wallet = state.wallet.clone();
    let account = run_blocking(move || wallet.account(&claims.user_id())).await?;
    Ok(Json(TransactionsResponse {
        balance: account.amount,
        transactions: account.transactions.into_iter().map(Into::into).collect(),
    }))
}

// Deposit endpoint
pub async fn deposit(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    JsonBody(payload): JsonBody<FundsRequest>,
) -> Result<(StatusCode, Json<FundsResponse>), ApiError> {
    let user_id = payload.target(&user)?;
    let wallet = state.wallet.clone();
    let receipt = run_blocking(move || wallet.deposit(&user_id, payload.amount)).await?;
    Ok((
        StatusCode::OK,
        Json(FundsResponse {
            message: "Deposit successful".to_string(),
            balance: receipt.balance,
        }),
    ))
}

// Withdraw endpoint
pub async fn withdraw(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    JsonBody(payload): JsonBody<FundsRequest>,
) -> Result<(StatusCode, Json<FundsResponse>), ApiError> {
    let user_id = payload.target(&user)?;
    let wallet = state.wallet.clone();
    let receipt = run_blocking(move || wallet.withdraw(&user_id, payload.amount)).await?;
    Ok((
        StatusCode::OK,
        Json(FundsResponse {
            message: "Withdrawal successful".to_string(),
            balance: receipt.balance,
        }),
    ))
}

// Game result endpoint; the round is replayed server-side
pub async fn update(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    JsonBody(payload): JsonBody<UpdateRequest>,
) -> Result<(StatusCode, Json<UpdateResponse>), ApiError> {
    let request = GameRequest {
        result_kind: payload.game_result,
        bet_amount: payload.bet_amount,
        client_balance: payload.balance,
        params: payload.params,
    };
    let wallet = state.wallet.clone();
    let settlement =
        run_blocking(move || wallet.apply_game_result(&claims.user_id(), &request)).await?;

    Ok((
        StatusCode::OK,
        Json(UpdateResponse {
            message: "Wallet updated".to_string(),
            balance: settlement.balance,
            transaction: settlement.transaction.into(),
            outcome: settlement.outcome,
        }),
    ))
}
