//! PostgreSQL ledger store
//!
//! Every unit of work is a database transaction at the default READ COMMITTED
//! level. Balance adjustments are a single
//! `UPDATE accounts SET balance = balance + $1`, which takes the row lock and
//! keeps it until the transaction ends. `lock_timeout` bounds the wait so a
//! stuck lock surfaces as [`StoreError::Conflict`] (SQLSTATE 55P03).

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::StoreError;
use super::memory::DEFAULT_LOCK_TIMEOUT;
use super::models::{
    Account, AccountId, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Transfer, UpdateAccountParams, UpdateEntryParams, UpdateTransferParams,
};
use super::store::{Store, UnitOfWork, check_page};

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Resolve a foreign-key violation on insert to the account that is missing
fn missing_account(e: sqlx::Error, refs: &[(&str, AccountId)]) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION)
        && let Some(constraint) = db.constraint()
        && let Some((_, id)) = refs.iter().find(|(name, _)| *name == constraint)
    {
        return StoreError::account_not_found(*id);
    }
    StoreError::from(e)
}

fn entry_refs(params: &CreateEntryParams) -> [(&'static str, AccountId); 1] {
    [("entries_account_id_fkey", params.account_id)]
}

fn transfer_refs(params: &CreateTransferParams) -> [(&'static str, AccountId); 2] {
    [
        ("transfers_from_account_id_fkey", params.from_account_id),
        ("transfers_to_account_id_fkey", params.to_account_id),
    ]
}

/// PostgreSQL [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_lock_timeout(pool, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&params.owner)
        .bind(params.balance)
        .bind(&params.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"SELECT id, owner, balance, currency, created_at FROM accounts WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        check_page(params.limit, params.offset)?;

        let rows = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE ($1::text IS NULL OR owner = $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(params.owner.as_deref())
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn update_account(&self, params: UpdateAccountParams) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts SET balance = $2
            WHERE id = $1
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(params.id)
        .bind(params.balance)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::account_not_found(params.id))
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::account_not_found(id));
        }
        Ok(())
    }

    async fn create_entry(&self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_account(e, &entry_refs(&params)))
    }

    async fn get_entry(&self, id: i64) -> Result<Entry, StoreError> {
        sqlx::query_as::<_, Entry>(
            r#"SELECT id, account_id, amount, created_at FROM entries WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::entry_not_found(id))
    }

    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        check_page(params.limit, params.offset)?;

        let rows = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE ($1::bigint IS NULL OR account_id = $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn update_entry(&self, params: UpdateEntryParams) -> Result<Entry, StoreError> {
        sqlx::query_as::<_, Entry>(
            r#"
            UPDATE entries SET amount = $2
            WHERE id = $1
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.id)
        .bind(params.amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::entry_not_found(params.id))
    }

    async fn delete_entry(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::entry_not_found(id));
        }
        Ok(())
    }

    async fn create_transfer(&self, params: CreateTransferParams) -> Result<Transfer, StoreError> {
        sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_account(e, &transfer_refs(&params)))
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError> {
        sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::transfer_not_found(id))
    }

    async fn list_transfers(
        &self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        check_page(params.limit, params.offset)?;

        let rows = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE ($1::bigint IS NULL AND $2::bigint IS NULL)
               OR from_account_id = $1
               OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn update_transfer(
        &self,
        params: UpdateTransferParams,
    ) -> Result<Transfer, StoreError> {
        sqlx::query_as::<_, Transfer>(
            r#"
            UPDATE transfers SET amount = $2
            WHERE id = $1
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.id)
        .bind(params.amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::transfer_not_found(params.id))
    }

    async fn delete_transfer(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM transfers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::transfer_not_found(id));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters
        let set_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

/// Unit of work backed by one database transaction
///
/// Dropping it without commit rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or_else(|| {
            StoreError::Database("unit of work already committed or rolled back".to_string())
        })
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        let tx = self.tx()?;
        sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| missing_account(e, &transfer_refs(&params)))
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        let tx = self.tx()?;
        sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| missing_account(e, &entry_refs(&params)))
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        let tx = self.tx()?;
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts SET balance = balance + $1
            WHERE id = $2
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(params.amount)
        .bind(params.id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| StoreError::account_not_found(params.id))
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or_else(|| {
            StoreError::Database("unit of work already committed or rolled back".to_string())
        })?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or_else(|| {
            StoreError::Database("unit of work already committed or rolled back".to_string())
        })?;
        tx.rollback().await?;
        Ok(())
    }
}
