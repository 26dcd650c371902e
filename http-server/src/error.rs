use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use wallet::WalletError;

// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: &'static str,
}

#[derive(Debug)]
pub enum ApiError {
    /// No usable `Authorization: Bearer` header
    MissingToken(&'static str),
    Wallet(WalletError),
}

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        Self::Wallet(e)
    }
}

fn status_for(e: &WalletError) -> StatusCode {
    match e {
        WalletError::Validation(_)
        | WalletError::DuplicateUser(_)
        | WalletError::InvalidCredentials
        | WalletError::InvalidAmount(_)
        | WalletError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        WalletError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        WalletError::AuthToken(_) => StatusCode::FORBIDDEN,
        WalletError::VersionConflict(_) | WalletError::Store(_) | WalletError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MissingToken(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    message: message.to_string(),
                    error: "missing_token",
                },
            ),
            ApiError::Wallet(e) => {
                let message = if e.is_internal() {
                    // Details stay in the log
                    tracing::error!(error = %e, "Request failed");
                    "Something went wrong".to_string()
                } else {
                    e.to_string()
                };
                (
                    status_for(&e),
                    ErrorResponse {
                        message,
                        error: e.code(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WalletError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (WalletError::DuplicateUser("x".into()), StatusCode::BAD_REQUEST),
            (WalletError::InvalidCredentials, StatusCode::BAD_REQUEST),
            (WalletError::InvalidAmount(Decimal::ZERO), StatusCode::BAD_REQUEST),
            (
                WalletError::InsufficientBalance {
                    requested: Decimal::TEN,
                    available: Decimal::ONE,
                },
                StatusCode::BAD_REQUEST,
            ),
            (WalletError::AccountNotFound("x".into()), StatusCode::NOT_FOUND),
            (WalletError::AuthToken("x".into()), StatusCode::FORBIDDEN),
            (WalletError::Store("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), status);
        }
        assert_eq!(
            ApiError::MissingToken("no header").into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
