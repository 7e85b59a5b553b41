//! Ledger Store
//!
//! Persistent accounts, entries and transfers.
//!
//! Two backends implement [`Store`]:
//! - [`PgStore`]: PostgreSQL through `sqlx`, one database transaction per unit of work
//! - [`MemoryStore`]: in-process tables with per-account row locks
//!
//! # Tables
//!
//! ```text
//! accounts (id, owner, balance, currency, created_at)
//!     ▲                    ▲
//!     │ account_id         │ from_account_id / to_account_id
//! entries (id, account_id, amount, created_at)
//! transfers (id, from_account_id, to_account_id, amount, created_at)
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::{ErrorKind, StoreError};
pub use memory::MemoryStore;
pub use models::{
    Account, AccountId, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Transfer, UpdateAccountParams, UpdateEntryParams, UpdateTransferParams,
};
pub use postgres::PgStore;
pub use store::{Store, UnitOfWork};
