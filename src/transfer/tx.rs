//! Transfer unit-of-work steps
//!
//! ```text
//! 1. INSERT transfer (from, to, amount)
//! 2. INSERT entry (from, -amount)
//! 3. INSERT entry (to,   +amount)
//! 4. balance += delta on both accounts, lower account id first
//! ```
//!
//! Step 4 always touches the lower id first. Two transfers moving money in
//! opposite directions between the same pair therefore request the row
//! locks in the same order and cannot wait on each other in a cycle.

use crate::ledger::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, StoreError,
    UnitOfWork,
};

use super::types::{TransferTxParams, TransferTxResult};

/// Run the transfer steps. The caller commits or discards `uow`.
pub async fn run(
    uow: &mut dyn UnitOfWork,
    params: &TransferTxParams,
) -> Result<TransferTxResult, StoreError> {
    let transfer = uow
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let from_entry = uow
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await?;

    let to_entry = uow
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let (from_account, to_account) = if params.from_account_id < params.to_account_id {
        let (from, to) = add_money(
            uow,
            (params.from_account_id, -params.amount),
            (params.to_account_id, params.amount),
        )
        .await?;
        (from, to)
    } else {
        let (to, from) = add_money(
            uow,
            (params.to_account_id, params.amount),
            (params.from_account_id, -params.amount),
        )
        .await?;
        (from, to)
    };

    Ok(TransferTxResult::assemble(
        transfer,
        from_entry,
        to_entry,
        from_account,
        to_account,
    ))
}

/// Apply two balance deltas in the given order
async fn add_money(
    uow: &mut dyn UnitOfWork,
    (first_id, first_amount): (i64, i64),
    (second_id, second_amount): (i64, i64),
) -> Result<(Account, Account), StoreError> {
    let first = uow
        .add_account_balance(AddAccountBalanceParams {
            id: first_id,
            amount: first_amount,
        })
        .await?;
    let second = uow
        .add_account_balance(AddAccountBalanceParams {
            id: second_id,
            amount: second_amount,
        })
        .await?;
    Ok((first, second))
}
