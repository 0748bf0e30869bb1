//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `error_codes`: Standard error code constants
//! - `ApiError` / `ApiResult`: handler error plumbing

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::card::CardError;
use crate::funding::FundingError;
use crate::session::SessionError;
use crate::transfer::TransferError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
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
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const CARD_NOT_FUNDABLE: i32 = 1003;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const FORBIDDEN: i32 = 2003;

    // Transfer outcomes (3xxx)
    pub const DEBIT_FAILED: i32 = 3001;
    pub const CREDIT_FAILED: i32 = 3002;
    pub const IN_PROGRESS: i32 = 3003;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

// ============================================================================
// Handler Errors
// ============================================================================

/// Error returned by gateway handlers, rendered as an `ApiResponse`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
    pub data: Option<serde_json::Value>,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap `data` in a success envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn missing_auth(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::MISSING_AUTH, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error_codes::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn into_err<T>(self) -> ApiResult<T> {
        Err(self)
    }

    /// Build from a domain error's stable code and suggested HTTP status
    fn from_domain(code: &str, status: u16, msg: String) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let api_code = match code {
            "INSUFFICIENT_BALANCE" => error_codes::INSUFFICIENT_BALANCE,
            "CARD_FROZEN" | "CARD_INACTIVE" => error_codes::CARD_NOT_FUNDABLE,
            "DEBIT_FAILED" => error_codes::DEBIT_FAILED,
            "CREDIT_FAILED" => error_codes::CREDIT_FAILED,
            "IN_PROGRESS" => error_codes::IN_PROGRESS,
            _ => match status {
                StatusCode::BAD_REQUEST => error_codes::INVALID_PARAMETER,
                StatusCode::UNAUTHORIZED => error_codes::AUTH_FAILED,
                StatusCode::FORBIDDEN => error_codes::FORBIDDEN,
                StatusCode::NOT_FOUND => error_codes::NOT_FOUND,
                StatusCode::SERVICE_UNAVAILABLE => error_codes::SERVICE_UNAVAILABLE,
                _ => error_codes::INTERNAL_ERROR,
            },
        };
        Self::new(status, api_code, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            code: self.code,
            msg: self.msg,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<FundingError> for ApiError {
    fn from(e: FundingError) -> Self {
        let err = ApiError::from_domain(e.code(), e.http_status(), e.to_string());
        match &e {
            FundingError::InProgress(id) => {
                err.with_data(serde_json::json!({ "transfer_id": id.to_string() }))
            }
            FundingError::CreditFailed { rolled_back, .. } => {
                err.with_data(serde_json::json!({ "rolled_back": rolled_back }))
            }
            _ => err,
        }
    }
}

impl From<CardError> for ApiError {
    fn from(e: CardError) -> Self {
        ApiError::from_domain(e.code(), e.http_status(), e.to_string())
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        ApiError::from_domain(e.code(), e.http_status(), e.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::AdminRequired => ApiError::forbidden(e.to_string()),
            SessionError::Unknown | SessionError::Expired => ApiError::unauthorized(e.to_string()),
        }
    }
}
