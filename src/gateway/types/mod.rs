//! Gateway types module
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: Error response carrying HTTP status and API error code
//!
//! ## Submodules
//! - [`response`]: Response wrapper and error codes
//! - [`error`]: Error mapping from ledger and transfer errors

pub mod error;
pub mod response;

// Re-export commonly used types at module root
pub use error::{ApiError, ApiResult, ok};
pub use response::{ApiResponse, error_codes};
