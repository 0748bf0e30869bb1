//! Gateway types module
//!
//! ## Input Types
//! - [`StrictDecimal`]: Format-validated decimal for API input
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: Error envelope with HTTP status

pub mod money;
pub mod response;

pub use money::StrictDecimal;
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
