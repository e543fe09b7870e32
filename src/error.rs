//! Error types for the expense cache.

use std::fmt;

/// Result type for cache and API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classified failure for queries and mutations.
///
/// Every failure that reaches a caller is one of these variants. The
/// classification is derived purely from the failure itself, never from the
/// operation that triggered it, so a single mapping to user-facing messages
/// works for every endpoint.
#[derive(Debug, Clone)]
pub enum Error {
    /// The server rejected the request with a structured error body.
    ///
    /// Typically a validation failure. The message is taken from the
    /// server's `{error: "..."}` body when available, so it is safe to show
    /// to the user. Not-found responses for retired ids land here too.
    ///
    /// **Recovery:** correct the input and resubmit.
    BadRequest(String),

    /// The transport could not complete the request.
    ///
    /// Common causes:
    /// - Server unreachable or connection refused
    /// - DNS resolution failure
    /// - Request timed out (the adapter bounds every request)
    ///
    /// **Recovery:** transient; retry at the user's initiative.
    NetworkError(String),

    /// The response body was malformed.
    ///
    /// The request completed but the payload could not be decoded into the
    /// expected shape. Retrying has no benefit; treat as unexpected.
    ParseError(String),

    /// Client-side validation rejected the input before any network call.
    ///
    /// Raised at the form-validation boundary: description length out of
    /// bounds, non-positive amount, empty patch, malformed date range.
    ValidationError(String),

    /// Anything that fits no other class.
    ///
    /// Includes server errors without a structured body (e.g. a bare 500)
    /// and unacknowledged deletes.
    Unknown(String),
}

impl Error {
    /// Fixed user-facing message for this failure class.
    ///
    /// `BadRequest` and `ValidationError` carry server/boundary text meant
    /// for display; the remaining classes map to one generic message each.
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest(msg) if !msg.is_empty() => msg.clone(),
            Error::BadRequest(_) => "Bad request".to_string(),
            Error::NetworkError(_) => "Network error. Please check your connection.".to_string(),
            Error::ParseError(_) => "Error parsing the response. Please try again.".to_string(),
            Error::ValidationError(msg) => msg.clone(),
            Error::Unknown(_) => "An unknown error occurred. Please try again.".to_string(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::NetworkError(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Error::NetworkError(msg) => write!(f, "Network error: {}", msg),
            Error::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::Unknown(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}

#[cfg(feature = "rest")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            Error::NetworkError(e.to_string())
        } else if e.is_decode() {
            Error::ParseError(e.to_string())
        } else {
            Error::Unknown(e.to_string())
        }
    }
}
