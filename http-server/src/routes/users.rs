use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wallet::NewUser;

use super::run_blocking;
use crate::{AppState, error::ApiError, middleware::JsonBody};

// Signup request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

// Signup response
#[derive(Serialize)]
pub struct SignupResponse {
    pub message: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

// Signup endpoint
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let auth = state.auth.clone();
    let amount = run_blocking(move || {
        auth.signup(NewUser {
            username: payload.username,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User successfully registered".to_string(),
            amount,
        }),
    ))
}

// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let auth = state.auth.clone();
    let token = run_blocking(move || auth.login(&payload.username, &payload.password)).await?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            message: "Welcome".to_string(),
            token,
        }),
    ))
}
