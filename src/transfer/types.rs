//! Transfer Core Types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ledger::{Account, AccountId, Entry, Transfer};

/// Caller-facing transfer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Minor units, must be positive
    pub amount: i64,
    /// Expected currency of both accounts, if the caller states one
    pub currency: Option<String>,
}

impl TransferRequest {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

/// Validated input to the transfer unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTxParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

/// Everything a committed transfer wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl TransferTxResult {
    /// Package the five rows of one transfer.
    ///
    /// Rows that do not belong together indicate a bug in the caller, not a
    /// user error, so they are only checked in debug builds.
    pub fn assemble(
        transfer: Transfer,
        from_entry: Entry,
        to_entry: Entry,
        from_account: Account,
        to_account: Account,
    ) -> Self {
        debug_assert_eq!(from_entry.account_id, transfer.from_account_id);
        debug_assert_eq!(to_entry.account_id, transfer.to_account_id);
        debug_assert_eq!(from_account.id, transfer.from_account_id);
        debug_assert_eq!(to_account.id, transfer.to_account_id);
        debug_assert_eq!(from_entry.amount, -transfer.amount);
        debug_assert_eq!(to_entry.amount, transfer.amount);

        Self {
            transfer,
            from_account,
            to_account,
            from_entry,
            to_entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(id: AccountId, balance: i64) -> Account {
        Account {
            id,
            owner: format!("owner{id}"),
            balance,
            currency: "USD".to_string(),
            created_at: Utc::now(),
        }
    }

    fn entry(id: i64, account_id: AccountId, amount: i64) -> Entry {
        Entry {
            id,
            account_id,
            amount,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_request_builder() {
        let req = TransferRequest::new(1, 2, 30).with_currency("USD");
        assert_eq!(req.amount, 30);
        assert_eq!(req.currency.as_deref(), Some("USD"));
        assert_eq!(TransferRequest::new(1, 2, 30).currency, None);
    }

    #[test]
    fn test_assemble_keeps_rows() {
        let transfer = Transfer {
            id: 9,
            from_account_id: 1,
            to_account_id: 2,
            amount: 30,
            created_at: Utc::now(),
        };
        let result = TransferTxResult::assemble(
            transfer.clone(),
            entry(1, 1, -30),
            entry(2, 2, 30),
            account(1, 70),
            account(2, 80),
        );

        assert_eq!(result.transfer, transfer);
        assert_eq!(result.from_entry.amount + result.to_entry.amount, 0);
        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_assemble_rejects_mismatched_rows() {
        let transfer = Transfer {
            id: 9,
            from_account_id: 1,
            to_account_id: 2,
            amount: 30,
            created_at: Utc::now(),
        };
        TransferTxResult::assemble(
            transfer,
            entry(1, 3, -30),
            entry(2, 2, 30),
            account(1, 70),
            account(2, 80),
        );
    }
}
