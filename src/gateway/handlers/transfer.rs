//! Transfer handlers

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiResult, ok};
use crate::ledger::AccountId;
use crate::transfer::{TransferRequest, TransferTxResult};

/// Transfer request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1))]
    #[schema(example = 1)]
    pub from_account_id: AccountId,
    #[validate(range(min = 1))]
    #[schema(example = 2)]
    pub to_account_id: AccountId,
    /// Minor units; must be positive
    #[schema(example = 30)]
    pub amount: i64,
    /// Currency both accounts must hold
    #[schema(example = "USD")]
    pub currency: String,
}

/// Move money between two accounts
///
/// POST /transfers
#[utoipa::path(
    post,
    path = "/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = TransferTxResult, content_type = "application/json"),
        (status = 400, description = "Invalid amount, same account, or currency rejected"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Conflicted with concurrent transfers"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTransferRequest>,
) -> ApiResult<TransferTxResult> {
    req.validate()?;

    let request = TransferRequest::new(req.from_account_id, req.to_account_id, req.amount)
        .with_currency(req.currency);

    ok(state.coordinator.transfer(request).await?)
}
