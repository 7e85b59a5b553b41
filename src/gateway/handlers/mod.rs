//! HTTP handlers

pub mod account;
pub mod health;
pub mod transfer;

pub use account::{
    CreateAccountRequest, ListAccountsQuery, create_account, get_account, list_accounts,
    update_account_balance,
};
pub use health::{HealthResponse, health_check};
pub use transfer::{CreateTransferRequest, create_transfer};
