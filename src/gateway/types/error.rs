//! Error responses
//!
//! Every handler error becomes an HTTP status plus the `{code, msg}` envelope.
//!
//! | ErrorKind         | Status |
//! |-------------------|--------|
//! | `InvalidArgument` | 400    |
//! | `NotFound`        | 404    |
//! | `Conflict`        | 409    |
//! | `Unavailable`     | 503    |
//! | `Internal`        | 500    |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::response::{ApiResponse, error_codes};
use crate::ledger::{ErrorKind, StoreError};
use crate::transfer::TransferError;

/// Handler error: HTTP status plus API error code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap `data` in a success envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn into_err<T>(self) -> Result<T, Self> {
        Err(self)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let kind = e.kind();
        let code = match &e {
            StoreError::NotFound {
                entity: "account", ..
            } => error_codes::ACCOUNT_NOT_FOUND,
            _ => match kind {
                ErrorKind::InvalidArgument => error_codes::INVALID_PARAMETER,
                ErrorKind::NotFound => error_codes::NOT_FOUND,
                ErrorKind::Conflict => error_codes::CONFLICT,
                ErrorKind::Unavailable => error_codes::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => error_codes::INTERNAL_ERROR,
            },
        };

        if kind == ErrorKind::Internal {
            tracing::error!(error = %e, "Store request failed");
            return Self::new(status_for(kind), code, "internal error");
        }
        Self::new(status_for(kind), code, e.to_string())
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        let code = match &e {
            TransferError::SameAccount => error_codes::SAME_ACCOUNT,
            TransferError::InvalidAmount => error_codes::INVALID_AMOUNT,
            TransferError::UnsupportedCurrency(_) => error_codes::UNSUPPORTED_CURRENCY,
            TransferError::CurrencyMismatch { .. } => error_codes::CURRENCY_MISMATCH,
            TransferError::AccountNotFound(_) => error_codes::ACCOUNT_NOT_FOUND,
            TransferError::Conflict { .. } => error_codes::CONFLICT,
            TransferError::StoreUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
            TransferError::Store(inner) => return inner.clone().into(),
        };
        Self::new(status_for(e.kind()), code, e.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::bad_request(e.to_string())
    }
}
