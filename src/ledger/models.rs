//! Ledger rows and query parameters
//!
//! Amounts and balances are signed minor currency units (cents) in `i64`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account identifier (`accounts.id`, BIGSERIAL)
pub type AccountId = i64;

/// Balance-holding account in a single currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    /// Minor units
    pub balance: i64,
    /// Currency tag, e.g. "USD"
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Signed balance change recorded against one account
///
/// Positive = credit, negative = debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Entry {
    pub id: i64,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Money moved from one account to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Always positive
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

/// Page over accounts, optionally restricted to one owner
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListAccountsParams {
    pub owner: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Administrative absolute balance set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateAccountParams {
    pub id: AccountId,
    pub balance: i64,
}

/// Relative balance adjustment applied inside a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddAccountBalanceParams {
    pub id: AccountId,
    pub amount: i64,
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateEntryParams {
    pub account_id: AccountId,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListEntriesParams {
    pub account_id: Option<AccountId>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateEntryParams {
    pub id: i64,
    pub amount: i64,
}

// ============================================================================
// Transfers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

/// Page over transfers
///
/// When either filter is set, a row matches if `from_account_id` equals the
/// `from` filter OR `to_account_id` equals the `to` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListTransfersParams {
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub limit: i64,
    pub offset: i64,
}

impl ListTransfersParams {
    pub(crate) fn matches(&self, transfer: &Transfer) -> bool {
        match (self.from_account_id, self.to_account_id) {
            (None, None) => true,
            (from, to) => {
                from == Some(transfer.from_account_id) || to == Some(transfer.to_account_id)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateTransferParams {
    pub id: i64,
    pub amount: i64,
}
