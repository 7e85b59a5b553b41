//! Transfer Coordinator
//!
//! Validates a transfer request, runs the transfer unit of work against the
//! store and retries it when it loses a race with a concurrent transfer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::state::TransferState;
use super::types::{TransferRequest, TransferTxParams, TransferTxResult};
use crate::currency;
use crate::ledger::{Account, AccountId, Store, StoreError};

/// How often a conflicting unit of work is run again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Sleep before attempt `n + 1` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(20),
        }
    }
}

/// Transfer Coordinator - validates and executes transfers
pub struct TransferCoordinator {
    store: Arc<dyn Store>,
    retry: RetryPolicy,
}

impl TransferCoordinator {
    /// Create a new TransferCoordinator with the default retry policy
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: Arc<dyn Store>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry: RetryPolicy {
                max_attempts: retry.max_attempts.max(1),
                ..retry
            },
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Move `req.amount` from one account to another.
    ///
    /// On success the transfer row, both entries and both balance updates
    /// are committed together. On failure none of them are.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferTxResult, TransferError> {
        let mut state = TransferState::Validating;

        let params = match self.validate(&req).await {
            Ok(params) => params,
            Err(e) => {
                advance(&mut state, TransferState::RolledBack);
                debug!(
                    from = req.from_account_id,
                    to = req.to_account_id,
                    amount = req.amount,
                    error = %e,
                    "Transfer rejected"
                );
                return Err(e);
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            advance(&mut state, TransferState::InTransaction);

            match self.store.execute_transfer(&params).await {
                Ok(result) => {
                    advance(&mut state, TransferState::Committed);
                    info!(
                        transfer_id = result.transfer.id,
                        from = params.from_account_id,
                        to = params.to_account_id,
                        amount = params.amount,
                        attempt,
                        "Transfer committed"
                    );
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        from = params.from_account_id,
                        to = params.to_account_id,
                        attempt,
                        error = %e,
                        "Transfer conflicted, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                }
                Err(e) => {
                    advance(&mut state, TransferState::RolledBack);
                    let err = self.classify(e, &params, attempt).await;
                    match &err {
                        TransferError::StoreUnavailable(_) | TransferError::Store(_) => error!(
                            from = params.from_account_id,
                            to = params.to_account_id,
                            error = %err,
                            "Transfer rolled back"
                        ),
                        _ => warn!(
                            from = params.from_account_id,
                            to = params.to_account_id,
                            attempt,
                            error = %err,
                            "Transfer rolled back"
                        ),
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Everything that can be rejected before a unit of work is opened
    async fn validate(&self, req: &TransferRequest) -> Result<TransferTxParams, TransferError> {
        if req.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        if req.from_account_id == req.to_account_id {
            return Err(TransferError::SameAccount);
        }

        if let Some(tag) = &req.currency
            && !currency::is_supported(tag)
        {
            return Err(TransferError::UnsupportedCurrency(tag.clone()));
        }

        let from = self.store.get_account(req.from_account_id).await?;
        let to = self.store.get_account(req.to_account_id).await?;

        check_currencies(&from, &to, req.currency.as_deref())?;

        Ok(TransferTxParams {
            from_account_id: req.from_account_id,
            to_account_id: req.to_account_id,
            amount: req.amount,
        })
    }

    /// Turn the final store error of a failed transfer into a caller error
    async fn classify(
        &self,
        e: StoreError,
        params: &TransferTxParams,
        attempts: u32,
    ) -> TransferError {
        match e {
            StoreError::Conflict(reason) => TransferError::Conflict { attempts, reason },
            // An account was removed between validation and commit
            StoreError::Constraint(_) => match self.find_missing_account(params).await {
                Some(id) => TransferError::AccountNotFound(id),
                None => TransferError::Store(e),
            },
            other => other.into(),
        }
    }

    async fn find_missing_account(&self, params: &TransferTxParams) -> Option<AccountId> {
        for id in [params.from_account_id, params.to_account_id] {
            if let Err(StoreError::NotFound { .. }) = self.store.get_account(id).await {
                return Some(id);
            }
        }
        None
    }
}

/// Both accounts must hold the same supported currency, and it must be the
/// one the caller asked for, if any.
fn check_currencies(
    from: &Account,
    to: &Account,
    requested: Option<&str>,
) -> Result<(), TransferError> {
    for account in [from, to] {
        if !currency::is_supported(&account.currency) {
            return Err(TransferError::UnsupportedCurrency(account.currency.clone()));
        }
    }

    let expected = requested.unwrap_or(&from.currency);
    for account in [from, to] {
        if account.currency != expected {
            return Err(TransferError::CurrencyMismatch {
                account_id: account.id,
                expected: expected.to_string(),
                actual: account.currency.clone(),
            });
        }
    }
    Ok(())
}

fn advance(state: &mut TransferState, next: TransferState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal transfer state transition {state} -> {next}"
    );
    debug!(from = %state, to = %next, "Transfer state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        CreateAccountParams, ListEntriesParams, ListTransfersParams, MemoryStore, UnitOfWork,
    };
    use crate::ledger::{
        AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry,
        ListAccountsParams, Transfer, UpdateAccountParams, UpdateEntryParams,
        UpdateTransferParams,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn create_account(store: &MemoryStore, balance: i64, currency: &str) -> Account {
        store
            .create_account(CreateAccountParams {
                owner: crate::util::random_owner(),
                balance,
                currency: currency.to_string(),
            })
            .await
            .unwrap()
    }

    async fn count_rows(store: &MemoryStore) -> (usize, usize) {
        let entries = store
            .list_entries(ListEntriesParams {
                limit: 1_000,
                ..Default::default()
            })
            .await
            .unwrap();
        let transfers = store
            .list_transfers(ListTransfersParams {
                limit: 1_000,
                ..Default::default()
            })
            .await
            .unwrap();
        (entries.len(), transfers.len())
    }

    fn coordinator(store: &MemoryStore) -> TransferCoordinator {
        TransferCoordinator::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_transfer_moves_money() {
        let store = MemoryStore::new();
        let a = create_account(&store, 100, "USD").await;
        let b = create_account(&store, 50, "USD").await;

        let result = coordinator(&store)
            .transfer(TransferRequest::new(a.id, b.id, 30))
            .await
            .unwrap();

        assert_eq!(result.transfer.from_account_id, a.id);
        assert_eq!(result.transfer.to_account_id, b.id);
        assert_eq!(result.transfer.amount, 30);
        assert_eq!(result.from_entry.account_id, a.id);
        assert_eq!(result.from_entry.amount, -30);
        assert_eq!(result.to_entry.account_id, b.id);
        assert_eq!(result.to_entry.amount, 30);
        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);

        assert_eq!(store.get_account(a.id).await.unwrap().balance, 70);
        assert_eq!(store.get_account(b.id).await.unwrap().balance, 80);
        assert_eq!(count_rows(&store).await, (2, 1));
        assert_eq!(
            store.get_transfer(result.transfer.id).await.unwrap(),
            result.transfer
        );
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected() {
        let store = MemoryStore::new();
        let a = create_account(&store, 100, "USD").await;
        let b = create_account(&store, 50, "USD").await;
        let coordinator = coordinator(&store);

        for amount in [0, -10] {
            let err = coordinator
                .transfer(TransferRequest::new(a.id, b.id, amount))
                .await
                .unwrap_err();
            assert_eq!(err, TransferError::InvalidAmount);
            assert_eq!(err.kind(), crate::ledger::ErrorKind::InvalidArgument);
        }

        assert_eq!(count_rows(&store).await, (0, 0));
        assert_eq!(store.get_account(a.id).await.unwrap(), a);
        assert_eq!(store.get_account(b.id).await.unwrap(), b);
    }

    #[tokio::test]
    async fn test_same_account_is_rejected() {
        let store = MemoryStore::new();
        let a = create_account(&store, 100, "USD").await;

        let err = coordinator(&store)
            .transfer(TransferRequest::new(a.id, a.id, 10))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::SameAccount);
        assert_eq!(count_rows(&store).await, (0, 0));
    }

    #[tokio::test]
    async fn test_missing_account_is_not_found() {
        let store = MemoryStore::new();
        let a = create_account(&store, 100, "USD").await;
        let coordinator = coordinator(&store);

        let err = coordinator
            .transfer(TransferRequest::new(a.id, 9_999, 10))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::AccountNotFound(9_999));
        assert_eq!(err.kind(), crate::ledger::ErrorKind::NotFound);

        let err = coordinator
            .transfer(TransferRequest::new(9_998, a.id, 10))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::AccountNotFound(9_998));

        assert_eq!(count_rows(&store).await, (0, 0));
        assert_eq!(store.get_account(a.id).await.unwrap(), a);
    }

    #[tokio::test]
    async fn test_unsupported_currency_is_rejected() {
        let store = MemoryStore::new();
        let a = create_account(&store, 100, "JPY").await;
        let b = create_account(&store, 50, "JPY").await;
        let c = create_account(&store, 50, "USD").await;
        let coordinator = coordinator(&store);

        let err = coordinator
            .transfer(TransferRequest::new(a.id, b.id, 10))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::UnsupportedCurrency("JPY".into()));

        // Request tag is checked before any account is read
        let err = coordinator
            .transfer(TransferRequest::new(c.id, 9_999, 10).with_currency("GBP"))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::UnsupportedCurrency("GBP".into()));

        assert_eq!(count_rows(&store).await, (0, 0));
    }

    #[tokio::test]
    async fn test_currency_mismatch_is_rejected() {
        let store = MemoryStore::new();
        let usd = create_account(&store, 100, "USD").await;
        let eur = create_account(&store, 100, "EUR").await;
        let usd2 = create_account(&store, 100, "USD").await;
        let coordinator = coordinator(&store);

        let err = coordinator
            .transfer(TransferRequest::new(usd.id, eur.id, 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::CurrencyMismatch { account_id, .. } if account_id == eur.id
        ));

        let err = coordinator
            .transfer(TransferRequest::new(usd.id, usd2.id, 10).with_currency("EUR"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::CurrencyMismatch { .. }));

        coordinator
            .transfer(TransferRequest::new(usd.id, usd2.id, 10).with_currency("USD"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_conflict_exhausts_attempts() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(30));
        let a = create_account(&store, 100, "USD").await;
        let b = create_account(&store, 50, "USD").await;

        // Hold the row lock on `a` for the whole test
        let mut blocker = store.begin().await.unwrap();
        blocker
            .add_account_balance(AddAccountBalanceParams { id: a.id, amount: 0 })
            .await
            .unwrap();

        let coordinator = TransferCoordinator::with_retry_policy(
            Arc::new(store.clone()),
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(5),
            },
        );
        let err = coordinator
            .transfer(TransferRequest::new(a.id, b.id, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Conflict { attempts: 3, .. }));
        assert_eq!(err.kind(), crate::ledger::ErrorKind::Conflict);
        assert_eq!(count_rows(&store).await, (0, 0));
        blocker.rollback().await.unwrap();
        assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_conflict_is_retried_until_lock_frees() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(50));
        let a = create_account(&store, 100, "USD").await;
        let b = create_account(&store, 50, "USD").await;

        let mut blocker = store.begin().await.unwrap();
        blocker
            .add_account_balance(AddAccountBalanceParams { id: b.id, amount: 0 })
            .await
            .unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            drop(blocker);
        });

        let coordinator = TransferCoordinator::with_retry_policy(
            Arc::new(store.clone()),
            RetryPolicy {
                max_attempts: 10,
                backoff: Duration::from_millis(20),
            },
        );
        let result = coordinator
            .transfer(TransferRequest::new(a.id, b.id, 10))
            .await
            .unwrap();

        assert_eq!(result.from_account.balance, 90);
        assert_eq!(result.to_account.balance, 60);
        // Failed attempts left nothing behind
        assert_eq!(count_rows(&store).await, (2, 1));
    }

    #[tokio::test]
    async fn test_cancelled_transfer_persists_nothing() {
        let store = MemoryStore::new();
        let a = create_account(&store, 100, "USD").await;
        let b = create_account(&store, 50, "USD").await;

        let mut blocker = store.begin().await.unwrap();
        blocker
            .add_account_balance(AddAccountBalanceParams { id: b.id, amount: 0 })
            .await
            .unwrap();

        let coordinator = coordinator(&store);
        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            coordinator.transfer(TransferRequest::new(a.id, b.id, 10)),
        )
        .await;
        assert!(cancelled.is_err());
        blocker.rollback().await.unwrap();

        assert_eq!(count_rows(&store).await, (0, 0));
        assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
        assert_eq!(store.get_account(b.id).await.unwrap().balance, 50);
    }

    /// Delegates to a [`MemoryStore`] but fails every `begin`
    struct FailingBeginStore {
        inner: MemoryStore,
        error: StoreError,
        begin_calls: AtomicUsize,
    }

    #[async_trait]
    impl Store for FailingBeginStore {
        fn name(&self) -> &'static str {
            "failing-begin"
        }
        async fn health_check(&self) -> Result<(), StoreError> {
            Err(self.error.clone())
        }
        async fn create_account(&self, p: CreateAccountParams) -> Result<Account, StoreError> {
            self.inner.create_account(p).await
        }
        async fn get_account(&self, id: AccountId) -> Result<Account, StoreError> {
            self.inner.get_account(id).await
        }
        async fn list_accounts(&self, p: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
            self.inner.list_accounts(p).await
        }
        async fn update_account(&self, p: UpdateAccountParams) -> Result<Account, StoreError> {
            self.inner.update_account(p).await
        }
        async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
            self.inner.delete_account(id).await
        }
        async fn create_entry(&self, p: CreateEntryParams) -> Result<Entry, StoreError> {
            self.inner.create_entry(p).await
        }
        async fn get_entry(&self, id: i64) -> Result<Entry, StoreError> {
            self.inner.get_entry(id).await
        }
        async fn list_entries(&self, p: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
            self.inner.list_entries(p).await
        }
        async fn update_entry(&self, p: UpdateEntryParams) -> Result<Entry, StoreError> {
            self.inner.update_entry(p).await
        }
        async fn delete_entry(&self, id: i64) -> Result<(), StoreError> {
            self.inner.delete_entry(id).await
        }
        async fn create_transfer(&self, p: CreateTransferParams) -> Result<Transfer, StoreError> {
            self.inner.create_transfer(p).await
        }
        async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError> {
            self.inner.get_transfer(id).await
        }
        async fn list_transfers(
            &self,
            p: ListTransfersParams,
        ) -> Result<Vec<Transfer>, StoreError> {
            self.inner.list_transfers(p).await
        }
        async fn update_transfer(&self, p: UpdateTransferParams) -> Result<Transfer, StoreError> {
            self.inner.update_transfer(p).await
        }
        async fn delete_transfer(&self, id: i64) -> Result<(), StoreError> {
            self.inner.delete_transfer(id).await
        }
        async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
            self.begin_calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    #[tokio::test]
    async fn test_unavailable_store_is_not_retried() {
        let inner = MemoryStore::new();
        let a = create_account(&inner, 100, "USD").await;
        let b = create_account(&inner, 50, "USD").await;
        let store = Arc::new(FailingBeginStore {
            inner,
            error: StoreError::Unavailable("connection refused".into()),
            begin_calls: AtomicUsize::new(0),
        });

        let coordinator = TransferCoordinator::new(store.clone());
        let err = coordinator
            .transfer(TransferRequest::new(a.id, b.id, 10))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransferError::StoreUnavailable("connection refused".into())
        );
        assert_eq!(store.begin_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conflict_on_begin_is_retried() {
        let inner = MemoryStore::new();
        let a = create_account(&inner, 100, "USD").await;
        let b = create_account(&inner, 50, "USD").await;
        let store = Arc::new(FailingBeginStore {
            inner,
            error: StoreError::Conflict("serialization failure".into()),
            begin_calls: AtomicUsize::new(0),
        });

        let coordinator = TransferCoordinator::with_retry_policy(
            store.clone(),
            RetryPolicy {
                max_attempts: 4,
                backoff: Duration::from_millis(1),
            },
        );
        let err = coordinator
            .transfer(TransferRequest::new(a.id, b.id, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Conflict { attempts: 4, .. }));
        assert_eq!(store.begin_calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let coordinator = TransferCoordinator::with_retry_policy(
            Arc::new(MemoryStore::new()),
            RetryPolicy {
                max_attempts: 0,
                backoff: Duration::ZERO,
            },
        );
        assert_eq!(coordinator.retry.max_attempts, 1);
    }
}
