//! Store and unit-of-work traits
//!
//! Single-row operations on [`Store`] are each atomic on their own. Multi-row
//! work goes through a [`UnitOfWork`] obtained from [`Store::begin`], whose
//! writes become visible only on commit.

use async_trait::async_trait;
use tracing::warn;

use super::error::StoreError;
use super::models::{
    Account, AccountId, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Transfer, UpdateAccountParams, UpdateEntryParams, UpdateTransferParams,
};
use crate::transfer::tx;
use crate::transfer::types::{TransferTxParams, TransferTxResult};

/// Ledger persistence
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), StoreError>;

    // === Accounts ===
    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, StoreError>;
    async fn get_account(&self, id: AccountId) -> Result<Account, StoreError>;
    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError>;
    async fn update_account(&self, params: UpdateAccountParams) -> Result<Account, StoreError>;
    async fn delete_account(&self, id: AccountId) -> Result<(), StoreError>;

    // === Entries ===
    async fn create_entry(&self, params: CreateEntryParams) -> Result<Entry, StoreError>;
    async fn get_entry(&self, id: i64) -> Result<Entry, StoreError>;
    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError>;
    async fn update_entry(&self, params: UpdateEntryParams) -> Result<Entry, StoreError>;
    async fn delete_entry(&self, id: i64) -> Result<(), StoreError>;

    // === Transfers ===
    async fn create_transfer(&self, params: CreateTransferParams) -> Result<Transfer, StoreError>;
    async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError>;
    async fn list_transfers(
        &self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError>;
    async fn update_transfer(&self, params: UpdateTransferParams)
    -> Result<Transfer, StoreError>;
    async fn delete_transfer(&self, id: i64) -> Result<(), StoreError>;

    /// Open a unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Run the transfer steps in one unit of work and commit.
    ///
    /// Any failure discards the unit of work; nothing it wrote survives.
    async fn execute_transfer(
        &self,
        params: &TransferTxParams,
    ) -> Result<TransferTxResult, StoreError> {
        let mut uow = self.begin().await?;

        match tx::run(uow.as_mut(), params).await {
            Ok(result) => {
                uow.commit().await?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(
                        store = self.name(),
                        error = %rollback_err,
                        "Rollback failed; unit of work will be discarded on drop"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Atomic group of writes
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] discards it.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn create_transfer(&mut self, params: CreateTransferParams)
    -> Result<Transfer, StoreError>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError>;

    /// Add `amount` to the stored balance under the account's row lock and
    /// return the updated account. The lock is held until commit or rollback.
    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Reject negative paging values before they reach a backend
pub(crate) fn check_page(limit: i64, offset: i64) -> Result<(), StoreError> {
    if limit < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "limit must not be negative: {limit}"
        )));
    }
    if offset < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "offset must not be negative: {offset}"
        )));
    }
    Ok(())
}
