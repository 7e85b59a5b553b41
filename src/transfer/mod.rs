//! Money Transfer
//!
//! Moves money between two accounts of the same currency. A transfer writes
//! five rows in one unit of work: the transfer record, one entry per account
//! and both balance updates. Either all five are committed or none are.
//!
//! # Flow
//!
//! ```text
//! TransferRequest
//!     │ validate (amount, same account, currency policy, accounts exist)
//!     ▼
//! Store::execute_transfer ──Conflict──▶ retry (bounded)
//!     │
//!     ▼
//! TransferTxResult
//! ```
//!
//! # Deadlock Avoidance
//!
//! Balance updates always lock the lower account id first (see [`tx`]), so
//! opposite-direction transfers between the same two accounts never wait on
//! each other in a cycle.

pub mod coordinator;
pub mod error;
pub mod state;
pub mod tx;
pub mod types;

// Re-exports for convenience
pub use coordinator::{RetryPolicy, TransferCoordinator};
pub use error::TransferError;
pub use state::TransferState;
pub use types::{TransferRequest, TransferTxParams, TransferTxResult};
