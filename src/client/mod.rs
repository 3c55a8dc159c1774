//! Errata Tool API integration module.
//!
//! This module provides the HTTP client used by every resource module and
//! the response wrapper that lets callers inspect failures instead of having
//! them raised automatically.

mod http;
mod response;

pub use http::{AuthMode, ErrataClient};
pub use response::{extract_error_message, ApiResponse};
