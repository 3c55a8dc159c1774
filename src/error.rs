//! Error types for the Errata Tool reconciliation system.
//!
//! The hierarchy mirrors the ways a reconciliation attempt can fail:
//! a value the caller asked for does not exist (lookup), the server could not
//! be reached or answered with an unexpected status (transport), the server
//! rejected a write (remote validation), or a scraped page did not have the
//! structure we expect (parse). Manifest problems are configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the reconciliation system.
#[derive(Debug, Error)]
pub enum ErrataError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A requested key, label or remote object is absent.
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Network failure or unexpected HTTP status.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server rejected a create or edit request.
    #[error("Errata Tool rejected the request: {0}")]
    Remote(#[from] RemoteError),

    /// A scraped HTML page did not have the expected structure.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Manifest validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An environment variable had an unusable value.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// A requested key or label does not exist.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The live settings do not contain a key the desired state manages.
    #[error("setting '{key}' is not present in the current state")]
    MissingSetting {
        /// The managed key.
        key: String,
    },

    /// A label is not part of an enumeration.
    #[error("unknown {enumeration} label '{label}'")]
    UnknownLabel {
        /// Name of the enumeration (e.g. "push target").
        enumeration: String,
        /// The label that was not found.
        label: String,
    },

    /// The Errata Tool has no account with this login name.
    #[error("{login_name}")]
    UserNotFound {
        /// Login name of the missing account.
        login_name: String,
    },

    /// A name filter matched more than one object.
    #[error("multiple {resource_type} objects named {name} found ({count})")]
    Ambiguous {
        /// Resource type that was queried.
        resource_type: String,
        /// The name used as filter.
        name: String,
        /// Number of matches.
        count: usize,
    },

    /// A response did not contain a field we need.
    #[error("response from {path} has no '{field}' field")]
    MissingField {
        /// API path that was queried.
        path: String,
        /// The absent field.
        field: String,
    },
}

/// Network and HTTP status errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request to {url} failed: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The server answered with a status the caller cannot handle.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        /// HTTP method.
        method: String,
        /// Full URL of the request.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("could not decode response from {url}: {message}")]
    Decode {
        /// Full URL of the request.
        url: String,
        /// Description of the decoding problem.
        message: String,
    },
}

/// The server refused a write and explained why.
#[derive(Debug, Error)]
#[error("{method} {path} returned HTTP {status}: {message}")]
pub struct RemoteError {
    /// HTTP method of the rejected request.
    pub method: String,
    /// API path of the rejected request.
    pub path: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable message extracted from the error payload.
    pub message: String,
    /// The complete response body.
    pub body: String,
}

/// Scraped HTML did not look the way we expect.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Expected markup is missing or malformed.
    #[error("unexpected markup in {page}: {message}")]
    Html {
        /// Page path that was scraped.
        page: String,
        /// Description of the problem.
        message: String,
    },

    /// A push target description is not in the known table.
    #[error("unknown push target description '{description}'")]
    UnknownDescription {
        /// The description text from the page.
        description: String,
    },

    /// The page yielded no labels at all.
    #[error("no labels found in {page}")]
    EmptyTable {
        /// Page path that was scraped.
        page: String,
    },
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ErrataError>;

impl ErrataError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this is a "user not found" lookup error.
    #[must_use]
    pub const fn is_user_not_found(&self) -> bool {
        matches!(self, Self::Lookup(LookupError::UserNotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl LookupError {
    /// Creates a missing-setting error.
    #[must_use]
    pub fn missing_setting(key: impl Into<String>) -> Self {
        Self::MissingSetting { key: key.into() }
    }

    /// Creates an unknown-label error.
    #[must_use]
    pub fn unknown_label(enumeration: impl Into<String>, label: impl Into<String>) -> Self {
        Self::UnknownLabel {
            enumeration: enumeration.into(),
            label: label.into(),
        }
    }
}

impl ParseError {
    /// Creates an HTML structure error.
    #[must_use]
    pub fn html(page: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Html {
            page: page.into(),
            message: message.into(),
        }
    }
}
