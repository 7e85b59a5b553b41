//! OpenAPI Documentation
//!
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::gateway::handlers::{CreateAccountRequest, CreateTransferRequest, HealthResponse};
use crate::ledger::{Account, Entry, Transfer};
use crate::transfer::TransferTxResult;

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Simple Bank API",
        version = "1.0.0",
        description = "Accounts, ledger entries and atomic money transfers."
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::account::create_account,
        crate::gateway::handlers::account::get_account,
        crate::gateway::handlers::account::list_accounts,
        crate::gateway::handlers::account::update_account_balance,
        crate::gateway::handlers::transfer::create_transfer,
    ),
    components(
        schemas(
            HealthResponse,
            Account,
            Entry,
            Transfer,
            TransferTxResult,
            CreateAccountRequest,
            CreateTransferRequest,
        )
    ),
    tags(
        (name = "Account", description = "Account management"),
        (name = "Transfer", description = "Money transfers between accounts"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
