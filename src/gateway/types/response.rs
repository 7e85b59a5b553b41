//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `error_codes`: Standard error code constants

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INVALID_AMOUNT: i32 = 1002;
    pub const SAME_ACCOUNT: i32 = 1003;
    pub const UNSUPPORTED_CURRENCY: i32 = 1004;
    pub const CURRENCY_MISMATCH: i32 = 1005;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4004;
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4009;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_omits_data() {
        let resp = ApiResponse::<()>::error(error_codes::NOT_FOUND, "missing");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["code"], 4004);
        assert_eq!(json["msg"], "missing");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_success_response() {
        let json = serde_json::to_value(ApiResponse::success(7)).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["data"], 7);
    }
}
