//! JSON error responses for the HTTP surface.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::data::DataError;
use crate::trading::{AccountError, PriceCheckError};

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    /// Machine-readable kind, e.g. `InsufficientFunds`
    pub error: String,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal", message)
    }
}

impl From<DataError> for WebError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::InvalidSymbol(_) | DataError::Validation { .. } => {
                Self::bad_request("InvalidSymbol", err.to_string())
            }
            other => {
                tracing::error!("Unexpected data error: {}", other);
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<AccountError> for WebError {
    fn from(err: AccountError) -> Self {
        match &err {
            AccountError::Ledger(ledger) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, ledger.kind(), err.to_string())
            }
            AccountError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "AccountNotFound", err.to_string())
            }
            AccountError::RetriesExhausted { .. } => {
                Self::new(StatusCode::CONFLICT, "ConcurrentModification", err.to_string())
            }
            AccountError::Store(store) => {
                tracing::error!("Account store failure: {}", store);
                Self::internal("Account store unavailable")
            }
        }
    }
}

impl From<PriceCheckError> for WebError {
    fn from(err: PriceCheckError) -> Self {
        match &err {
            PriceCheckError::PriceDeviation { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "PriceDeviation", err.to_string())
            }
            PriceCheckError::QuoteUnavailable { .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "QuoteUnavailable", err.to_string())
            }
        }
    }
}

/// Malformed order bodies, e.g. a negative or fractional quantity
impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "InvalidRequest", rejection.body_text())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.error,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::LedgerError;

    #[test]
    fn test_ledger_errors_are_unprocessable() {
        let err: WebError = AccountError::Ledger(LedgerError::PositionNotFound {
            symbol: "AAPL".to_string(),
        })
        .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error, "PositionNotFound");
    }

    #[test]
    fn test_exhausted_retries_conflict() {
        let err: WebError = AccountError::RetriesExhausted {
            account_id: "alice".to_string(),
            attempts: 5,
        }
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_invalid_symbol_is_bad_request() {
        let err: WebError = DataError::InvalidSymbol("AA$PL".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.error, "InvalidSymbol");
    }
}
