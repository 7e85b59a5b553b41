//! Transfer Error Types

use thiserror::Error;

use crate::ledger::{AccountId, ErrorKind, StoreError};

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Source and target account cannot be the same")]
    SameAccount,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Currency mismatch: account {account_id} is {actual}, expected {expected}")]
    CurrencyMismatch {
        account_id: AccountId,
        expected: String,
        actual: String,
    },

    // === Account Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    // === System Errors ===
    #[error("Transfer conflicted with concurrent updates after {attempts} attempts: {reason}")]
    Conflict { attempts: u32, reason: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            TransferError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::Conflict { .. } => "CONFLICT",
            TransferError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            TransferError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::SameAccount
            | TransferError::InvalidAmount
            | TransferError::UnsupportedCurrency(_)
            | TransferError::CurrencyMismatch { .. } => ErrorKind::InvalidArgument,
            TransferError::AccountNotFound(_) => ErrorKind::NotFound,
            TransferError::Conflict { .. } => ErrorKind::Conflict,
            TransferError::StoreUnavailable(_) => ErrorKind::Unavailable,
            TransferError::Store(e) => e.kind(),
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unavailable => 503,
            ErrorKind::Internal => 500,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound {
                entity: "account",
                id,
            } => TransferError::AccountNotFound(id),
            StoreError::Unavailable(msg) => TransferError::StoreUnavailable(msg),
            StoreError::Conflict(reason) => TransferError::Conflict {
                attempts: 1,
                reason,
            },
            other => TransferError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(TransferError::InvalidAmount.code(), "INVALID_AMOUNT");
        assert_eq!(
            TransferError::UnsupportedCurrency("JPY".into()).code(),
            "UNSUPPORTED_CURRENCY"
        );
        assert_eq!(TransferError::AccountNotFound(7).code(), "ACCOUNT_NOT_FOUND");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::InvalidAmount.http_status(), 400);
        assert_eq!(TransferError::SameAccount.http_status(), 400);
        assert_eq!(
            TransferError::UnsupportedCurrency("JPY".into()).http_status(),
            400
        );
        assert_eq!(TransferError::AccountNotFound(1).http_status(), 404);
        assert_eq!(
            TransferError::Conflict {
                attempts: 3,
                reason: "lock".into()
            }
            .http_status(),
            409
        );
        assert_eq!(
            TransferError::StoreUnavailable("down".into()).http_status(),
            503
        );
        assert_eq!(
            TransferError::Store(StoreError::Database("boom".into())).http_status(),
            500
        );
    }

    #[test]
    fn test_from_store_error() {
        assert_eq!(
            TransferError::from(StoreError::account_not_found(5)),
            TransferError::AccountNotFound(5)
        );
        assert_eq!(
            TransferError::from(StoreError::Unavailable("pool closed".into())),
            TransferError::StoreUnavailable("pool closed".into())
        );
        assert!(matches!(
            TransferError::from(StoreError::Conflict("deadlock".into())),
            TransferError::Conflict { attempts: 1, .. }
        ));
        assert!(matches!(
            TransferError::from(StoreError::transfer_not_found(5)),
            TransferError::Store(_)
        ));
    }

    #[test]
    fn test_display() {
        let err = TransferError::CurrencyMismatch {
            account_id: 2,
            expected: "USD".into(),
            actual: "EUR".into(),
        };
        assert_eq!(
            err.to_string(),
            "Currency mismatch: account 2 is EUR, expected USD"
        );
    }
}
