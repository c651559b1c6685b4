//! # Response Envelope
//!
//! Every storefront response carries a success flag and a human-readable
//! message, with the payload on success or the error code on failure.
//!
//! ```json
//! { "success": true,  "message": "Checkout complete", "data": { ... } }
//! { "success": false, "message": "Cart is empty", "code": "CART_ERROR" }
//! ```

use serde::Serialize;

use crate::error::{ApiError, ErrorCode};

/// Uniform response envelope handed to the external router.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            message: message.into(),
            data: Some(data),
            code: None,
        }
    }

    pub fn error(err: ApiError) -> Self {
        ApiResponse {
            success: false,
            message: err.message,
            data: None,
            code: Some(err.code),
        }
    }

    /// Wraps a command result.
    pub fn from_result(result: Result<T, ApiError>, success_message: impl Into<String>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data, success_message),
            Err(err) => ApiResponse::error(err),
        }
    }
}
