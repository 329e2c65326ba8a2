//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use tonlimit_core::{CoreError, OrderId, OrderStatus, UserRef};
use tonlimit_store::StoreError;
use tonlimit_wallet::{AdapterError, CustodyError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No wallet for user {0}")]
    NoWallet(UserRef),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Order {id} is {status} and can no longer be changed")]
    NotEditable { id: OrderId, status: OrderStatus },

    #[error("Wallet provisioning failed: {0}")]
    Provisioning(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoWallet(_) | Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotEditable { .. } => StatusCode::CONFLICT,
            Self::Provisioning(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Metrics(_) | Self::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::Invalid(e.to_string())
    }
}

impl From<AdapterError> for ApiError {
    fn from(e: AdapterError) -> Self {
        Self::Provisioning(e.to_string())
    }
}

impl From<CustodyError> for ApiError {
    fn from(e: CustodyError) -> Self {
        Self::Provisioning(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::OrderNotFound(id),
            StoreError::NotEditable { id, status } => Self::NotEditable { id, status },
            StoreError::Invalid(core) => Self::Invalid(core.to_string()),
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_statuses() {
        let id = OrderId::new();
        assert_eq!(
            ApiError::from(StoreError::NotFound(id)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::NotEditable {
                id,
                status: OrderStatus::Pending
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::Corrupt("bad row".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provisioning_errors_are_bad_gateway() {
        let err = ApiError::from(AdapterError::Unavailable("down".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        let err = ApiError::from(CustodyError::MalformedSecret("3 words".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
