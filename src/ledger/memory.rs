//! In-process ledger store
//!
//! Same contract as the PostgreSQL store, used by tests and by the binary
//! when no database is configured.
//!
//! Committed rows live behind a synchronous `RwLock` that is never held across
//! an `.await`. Each account additionally has an async row lock. Balance
//! writers (units of work, `update_account`, `delete_account`) hold the row
//! lock for the whole read-modify-write span, so a unit of work can read the
//! committed balance, stage a new one and apply it at commit without another
//! writer slipping in between. Lock waits are bounded by `lock_timeout` and
//! surface as [`StoreError::Conflict`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::debug;

use super::error::StoreError;
use super::models::{
    Account, AccountId, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Transfer, UpdateAccountParams, UpdateEntryParams, UpdateTransferParams,
};
use super::store::{Store, UnitOfWork, check_page};

/// Default bound on a single row-lock wait
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

impl Tables {
    fn require_account(&self, id: AccountId) -> Result<&Account, StoreError> {
        self.accounts
            .get(&id)
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    fn check_transfer_refs(&self, from: AccountId, to: AccountId) -> Result<(), StoreError> {
        self.require_account(from)?;
        self.require_account(to)?;
        Ok(())
    }

    fn is_referenced(&self, id: AccountId) -> bool {
        self.entries.values().any(|e| e.account_id == id)
            || self
                .transfers
                .values()
                .any(|t| t.from_account_id == id || t.to_account_id == id)
    }
}

/// Mirrors the CHECK constraints on `transfers`
fn check_transfer_shape(params: &CreateTransferParams) -> Result<(), StoreError> {
    if params.amount <= 0 {
        return Err(StoreError::Constraint(format!(
            "transfer amount must be positive: {}",
            params.amount
        )));
    }
    if params.from_account_id == params.to_account_id {
        return Err(StoreError::Constraint(format!(
            "transfer source and destination are both account {}",
            params.from_account_id
        )));
    }
    Ok(())
}

fn page<'a, T: Clone + 'a>(
    rows: impl Iterator<Item = &'a T>,
    limit: i64,
    offset: i64,
) -> Result<Vec<T>, StoreError> {
    check_page(limit, offset)?;
    Ok(rows
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect())
}

struct Inner {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<RowLock<()>>>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
    lock_timeout: Duration,
}

impl Inner {
    /// Lock entries exist only for live accounts. Both map locks are taken
    /// in `tables` then `row_locks` order, here and in `delete_account`.
    async fn lock_row(&self, id: AccountId) -> Result<OwnedMutexGuard<()>, StoreError> {
        let lock = {
            let tables = self.tables.read();
            tables.require_account(id)?;
            self.row_locks.lock().entry(id).or_default().clone()
        };

        tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                StoreError::Conflict(format!(
                    "timed out after {:?} waiting for lock on account {}",
                    self.lock_timeout, id
                ))
            })
    }

    fn next_id(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// In-memory [`Store`]
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                account_seq: AtomicI64::new(0),
                entry_seq: AtomicI64::new(0),
                transfer_seq: AtomicI64::new(0),
                lock_timeout,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let account = Account {
            id: Inner::next_id(&self.inner.account_seq),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.inner
            .tables
            .write()
            .accounts
            .insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, StoreError> {
        self.inner.tables.read().require_account(id).cloned()
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        let tables = self.inner.tables.read();
        let rows = tables
            .accounts
            .values()
            .filter(|a| params.owner.as_ref().is_none_or(|owner| &a.owner == owner));
        page(rows, params.limit, params.offset)
    }

    async fn update_account(&self, params: UpdateAccountParams) -> Result<Account, StoreError> {
        let _row = self.inner.lock_row(params.id).await?;

        let mut tables = self.inner.tables.write();
        let account = tables
            .accounts
            .get_mut(&params.id)
            .ok_or_else(|| StoreError::account_not_found(params.id))?;
        account.balance = params.balance;
        Ok(account.clone())
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        let _row = self.inner.lock_row(id).await?;

        let mut tables = self.inner.tables.write();
        tables.require_account(id)?;
        if tables.is_referenced(id) {
            return Err(StoreError::Constraint(format!(
                "account {id} is still referenced by entries or transfers"
            )));
        }
        tables.accounts.remove(&id);
        self.inner.row_locks.lock().remove(&id);
        Ok(())
    }

    async fn create_entry(&self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        let mut tables = self.inner.tables.write();
        tables.require_account(params.account_id)?;

        let entry = Entry {
            id: Inner::next_id(&self.inner.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        tables.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&self, id: i64) -> Result<Entry, StoreError> {
        self.inner
            .tables
            .read()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::entry_not_found(id))
    }

    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        let tables = self.inner.tables.read();
        let rows = tables
            .entries
            .values()
            .filter(|e| params.account_id.is_none_or(|id| e.account_id == id));
        page(rows, params.limit, params.offset)
    }

    async fn update_entry(&self, params: UpdateEntryParams) -> Result<Entry, StoreError> {
        let mut tables = self.inner.tables.write();
        let entry = tables
            .entries
            .get_mut(&params.id)
            .ok_or_else(|| StoreError::entry_not_found(params.id))?;
        entry.amount = params.amount;
        Ok(entry.clone())
    }

    async fn delete_entry(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .tables
            .write()
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::entry_not_found(id))
    }

    async fn create_transfer(&self, params: CreateTransferParams) -> Result<Transfer, StoreError> {
        check_transfer_shape(&params)?;

        let mut tables = self.inner.tables.write();
        tables.check_transfer_refs(params.from_account_id, params.to_account_id)?;

        let transfer = Transfer {
            id: Inner::next_id(&self.inner.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        tables.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError> {
        self.inner
            .tables
            .read()
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::transfer_not_found(id))
    }

    async fn list_transfers(
        &self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        let tables = self.inner.tables.read();
        let rows = tables.transfers.values().filter(|t| params.matches(t));
        page(rows, params.limit, params.offset)
    }

    async fn update_transfer(
        &self,
        params: UpdateTransferParams,
    ) -> Result<Transfer, StoreError> {
        if params.amount <= 0 {
            return Err(StoreError::Constraint(format!(
                "transfer amount must be positive: {}",
                params.amount
            )));
        }
        let mut tables = self.inner.tables.write();
        let transfer = tables
            .transfers
            .get_mut(&params.id)
            .ok_or_else(|| StoreError::transfer_not_found(params.id))?;
        transfer.amount = params.amount;
        Ok(transfer.clone())
    }

    async fn delete_transfer(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .tables
            .write()
            .transfers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::transfer_not_found(id))
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork::new(self.inner.clone())))
    }
}

/// Staged writes plus the row locks taken so far
pub struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    locks: BTreeMap<AccountId, OwnedMutexGuard<()>>,
    /// New absolute balance per locked account
    balances: BTreeMap<AccountId, i64>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    finished: bool,
}

impl MemoryUnitOfWork {
    fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            locks: BTreeMap::new(),
            balances: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
            finished: false,
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Database(
                "unit of work already committed or rolled back".to_string(),
            ));
        }
        Ok(())
    }

    fn discard(&mut self) {
        self.finished = true;
        self.balances.clear();
        self.entries.clear();
        self.transfers.clear();
        // Releasing the guards unlocks the rows
        self.locks.clear();
    }

    fn has_writes(&self) -> bool {
        !(self.balances.is_empty() && self.entries.is_empty() && self.transfers.is_empty())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        self.ensure_open()?;
        check_transfer_shape(&params)?;
        self.inner
            .tables
            .read()
            .check_transfer_refs(params.from_account_id, params.to_account_id)?;

        let transfer = Transfer {
            id: Inner::next_id(&self.inner.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        self.ensure_open()?;
        self.inner
            .tables
            .read()
            .require_account(params.account_id)?;

        let entry = Entry {
            id: Inner::next_id(&self.inner.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.ensure_open()?;

        if !self.locks.contains_key(&params.id) {
            let guard = self.inner.lock_row(params.id).await?;
            self.locks.insert(params.id, guard);
        }

        let mut account = self.inner.tables.read().require_account(params.id)?.clone();
        let current = self
            .balances
            .get(&params.id)
            .copied()
            .unwrap_or(account.balance);
        let updated = current.checked_add(params.amount).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "balance of account {} would overflow adding {}",
                params.id, params.amount
            ))
        })?;

        self.balances.insert(params.id, updated);
        account.balance = updated;
        Ok(account)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;

        let result = {
            let mut tables = self.inner.tables.write();
            let refs_ok = self
                .balances
                .keys()
                .chain(self.entries.iter().map(|e| &e.account_id))
                .try_for_each(|id| tables.require_account(*id).map(|_| ()))
                .and_then(|_| {
                    self.transfers.iter().try_for_each(|t| {
                        tables.check_transfer_refs(t.from_account_id, t.to_account_id)
                    })
                });

            match refs_ok {
                Ok(()) => {
                    for (id, balance) in &self.balances {
                        if let Some(account) = tables.accounts.get_mut(id) {
                            account.balance = *balance;
                        }
                    }
                    for entry in self.entries.drain(..) {
                        tables.entries.insert(entry.id, entry);
                    }
                    for transfer in self.transfers.drain(..) {
                        tables.transfers.insert(transfer.id, transfer);
                    }
                    Ok(())
                }
                // A referenced account vanished after it was checked
                Err(StoreError::NotFound { id, .. }) => Err(StoreError::Constraint(format!(
                    "account {id} was deleted before commit"
                ))),
                Err(e) => Err(e),
            }
        };

        self.discard();
        result
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.discard();
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished && self.has_writes() {
            debug!(
                locked_accounts = self.locks.len(),
                "Discarding unfinished unit of work"
            );
        }
    }
}
