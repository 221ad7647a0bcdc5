//! Error kinds raised by the token services and the resource server.

use std::error::Error as StdError;
use std::fmt;

use serde_json::{json, Value};
use tracing::warn;

/// Why a presented access token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenReason {
    /// A token was required but none was presented.
    Missing,
    /// No token is stored under the presented identifier.
    NotFound,
    /// The token exists but its lifetime is over.
    Expired,
    /// The token is valid but lacks a required scope.
    InsufficientScope,
}

impl InvalidTokenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidTokenReason::Missing => "missing",
            InvalidTokenReason::NotFound => "not_found",
            InvalidTokenReason::Expired => "expired",
            InvalidTokenReason::InsufficientScope => "insufficient_scope",
        }
    }
}

impl fmt::Display for InvalidTokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidTokenReason::Missing => write!(f, "no access token was presented"),
            InvalidTokenReason::NotFound => write!(f, "token does not exist"),
            InvalidTokenReason::Expired => write!(f, "token expired"),
            InvalidTokenReason::InsufficientScope => write!(f, "insufficient scope"),
        }
    }
}

/// Failures reported by a storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A token with this identifier is already stored.
    DuplicateIdentifier(String),
    /// No free identifier was found within the configured number of attempts.
    IdentifierExhausted(usize),
    /// Any other backend failure (connectivity, unrelated constraint...).
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DuplicateIdentifier(id) => write!(f, "Duplicate token identifier: {}", id),
            StorageError::IdentifierExhausted(n) => write!(f, "No unique token identifier after {} attempts", n),
            StorageError::Backend(msg) => write!(f, "Storage backend error: {}", msg),
        }
    }
}

impl StdError for StorageError {}

impl From<&str> for StorageError {
    fn from(error: &str) -> Self {
        StorageError::Backend(error.to_string())
    }
}

impl From<String> for StorageError {
    fn from(error: String) -> Self {
        StorageError::Backend(error)
    }
}

/// Core OAuth2 error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// A requested scope is not registered; carries the offending scope names.
    InvalidScope(String),
    /// The presented access token cannot be used.
    InvalidAccessToken(InvalidTokenReason),
    /// The storage collaborator failed. Never a statement about token validity.
    Storage(StorageError),
    /// A token service was handed a token of another family. A bug in the calling grant
    /// handler, not an infrastructure fault.
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// Any other internal failure, e.g. the system random source being unavailable.
    ServerError(String),
}

impl OAuthError {
    /// RFC 6749 / RFC 6750 error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::InvalidAccessToken(InvalidTokenReason::InsufficientScope) => "insufficient_scope",
            OAuthError::InvalidAccessToken(_) => "invalid_token",
            OAuthError::Storage(_) | OAuthError::KindMismatch { .. } | OAuthError::ServerError(_) => "server_error",
        }
    }

    /// HTTP status an endpoint should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            OAuthError::InvalidScope(_) => 400,
            OAuthError::InvalidAccessToken(InvalidTokenReason::InsufficientScope) => 403,
            OAuthError::InvalidAccessToken(_) => 401,
            OAuthError::Storage(_) | OAuthError::KindMismatch { .. } | OAuthError::ServerError(_) => 500,
        }
    }

    /// Client facing description. Storage details stay in the logs.
    pub fn description(&self) -> String {
        match self {
            OAuthError::InvalidScope(scope) => format!("The requested scope is invalid: {}", scope),
            OAuthError::InvalidAccessToken(InvalidTokenReason::InsufficientScope) => {
                "The token does not carry the required scope".to_string()
            }
            OAuthError::InvalidAccessToken(_) => "The access token is missing, invalid or expired".to_string(),
            OAuthError::Storage(_) | OAuthError::KindMismatch { .. } | OAuthError::ServerError(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Reason code for invalid token errors, for logs and telemetry.
    pub fn reason(&self) -> Option<InvalidTokenReason> {
        match self {
            OAuthError::InvalidAccessToken(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Convert this error into the JSON body of an OAuth error response.
    pub fn to_json(&self) -> Value {
        let code = self.error_code();
        // Structured log
        warn!(
            error = %self,
            error_code = code,
            http_status = self.status_code(),
            reason = self.reason().map(|r| r.as_str()),
            "OAuth error occurred"
        );
        json!({ "error": code, "error_description": self.description() })
    }

    /// Same as [`OAuthError::to_json`], serialized.
    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.to_json()).unwrap_or_default()
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthError::InvalidScope(scope) => write!(f, "Invalid scope: {}", scope),
            OAuthError::InvalidAccessToken(reason) => write!(f, "Invalid access token: {}", reason),
            OAuthError::Storage(err) => write!(f, "{}", err),
            OAuthError::KindMismatch { expected, found } => {
                write!(f, "Token kind mismatch: expected {}, got {}", expected, found)
            }
            OAuthError::ServerError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl StdError for OAuthError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            OAuthError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for OAuthError {
    fn from(err: StorageError) -> Self {
        OAuthError::Storage(err)
    }
}

impl From<InvalidTokenReason> for OAuthError {
    fn from(reason: InvalidTokenReason) -> Self {
        OAuthError::InvalidAccessToken(reason)
    }
}
