//! simple_bank - Accounts, Ledger Entries and Money Transfers
//!
//! # Modules
//!
//! - [`ledger`] - Account, entry and transfer persistence (PostgreSQL or in-memory)
//! - [`transfer`] - Atomic transfers with deadlock-free lock ordering and conflict retry
//! - [`currency`] - Supported currency policy
//! - [`gateway`] - HTTP API (axum)
//! - [`db`] - PostgreSQL pool and migrations
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup
//! - [`util`] - Random fixtures for tests

pub mod config;
pub mod currency;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod transfer;
pub mod util;

// Convenient re-exports at crate root
pub use currency::Currency;
pub use ledger::{Account, Entry, MemoryStore, PgStore, Store, StoreError, Transfer};
pub use transfer::{TransferCoordinator, TransferError, TransferRequest, TransferTxResult};
