//! Account handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes, ok};
use crate::currency;
use crate::ledger::{
    Account, AccountId, CreateAccountParams, ListAccountsParams, UpdateAccountParams,
};

/// Open account request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "alice")]
    pub owner: String,
    #[schema(example = "USD")]
    pub currency: String,
}

/// Page of accounts, `page_id` counts from 1
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAccountsQuery {
    #[validate(range(min = 1))]
    pub page_id: i64,
    #[validate(range(min = 5, max = 10))]
    pub page_size: i64,
}

/// Open an account with a zero balance
///
/// POST /accounts
#[utoipa::path(
    post,
    path = "/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", body = Account, content_type = "application/json"),
        (status = 400, description = "Invalid owner or unsupported currency"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Account> {
    req.validate()?;

    if !currency::is_supported(&req.currency) {
        return ApiError::new(
            StatusCode::BAD_REQUEST,
            error_codes::UNSUPPORTED_CURRENCY,
            format!("Unsupported currency: {}", req.currency),
        )
        .into_err();
    }

    let account = state
        .store
        .create_account(CreateAccountParams {
            owner: req.owner,
            balance: 0,
            currency: req.currency,
        })
        .await?;

    tracing::info!(account_id = account.id, currency = %account.currency, "Account created");
    ok(account)
}

/// GET /accounts/{id}
#[utoipa::path(
    get,
    path = "/accounts/{id}",
    params(
        ("id" = i64, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account details", body = Account, content_type = "application/json"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AccountId>,
) -> ApiResult<Account> {
    ok(state.store.get_account(id).await?)
}

/// GET /accounts?page_id=1&page_size=5
#[utoipa::path(
    get,
    path = "/accounts",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "Accounts ordered by id", body = Vec<Account>, content_type = "application/json"),
        (status = 400, description = "Invalid paging parameters")
    ),
    tag = "Account"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAccountsQuery>,
) -> ApiResult<Vec<Account>> {
    query.validate()?;

    let offset = (query.page_id - 1)
        .checked_mul(query.page_size)
        .ok_or_else(|| ApiError::bad_request("page_id out of range"))?;

    let accounts = state
        .store
        .list_accounts(ListAccountsParams {
            owner: None,
            limit: query.page_size,
            offset,
        })
        .await?;
    ok(accounts)
}

/// Administrative absolute balance set
///
/// PUT /accounts/{id}/{balance}
#[utoipa::path(
    put,
    path = "/accounts/{id}/{balance}",
    params(
        ("id" = i64, Path, description = "Account ID"),
        ("balance" = i64, Path, description = "New balance in minor units")
    ),
    responses(
        (status = 200, description = "Updated account", body = Account, content_type = "application/json"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn update_account_balance(
    State(state): State<Arc<AppState>>,
    Path((id, balance)): Path<(AccountId, i64)>,
) -> ApiResult<Account> {
    let account = state
        .store
        .update_account(UpdateAccountParams { id, balance })
        .await?;

    tracing::warn!(account_id = id, balance, "Account balance overwritten");
    ok(account)
}
