//! Classification of failed upstream calls into user-facing causes.
//!
//! Every failure maps to exactly one [`ErrorCategory`]; classification never fails and never
//! retries. The category's `Display` is the single line shown to the tool caller.

use std::fmt;

use crate::transport::TransportError;

const CHECK_PARAMETERS: &str = "Check the provided parameters.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// HTTP 400, with the upstream's message when it sent one.
    BadRequest { message: Option<String> },
    /// HTTP 401.
    AuthFailure,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    ServerError { status: u16 },
    Timeout,
    ConnectionRefused,
    /// Any other non-2xx status.
    UnknownStatus {
        status: u16,
        message: Option<String>,
    },
    /// Anything that is not a transport or status failure.
    Unexpected(String),
}

impl ErrorCategory {
    /// Wrap an arbitrary cause.
    #[must_use]
    pub fn unexpected(cause: impl fmt::Display) -> Self {
        Self::Unexpected(cause.to_string())
    }

    /// Stable snake_case name, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::AuthFailure => "auth_failure",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::Timeout => "timeout",
            Self::ConnectionRefused => "connection_refused",
            Self::UnknownStatus { .. } => "unknown_status",
            Self::Unexpected(_) => "unexpected",
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest { .. } => Some(400),
            Self::AuthFailure => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::RateLimited => Some(429),
            Self::ServerError { status } | Self::UnknownStatus { status, .. } => Some(*status),
            Self::Timeout | Self::ConnectionRefused | Self::Unexpected(_) => None,
        }
    }

    /// Whether repeating the same call later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError { .. } | Self::Timeout
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { message } => write!(
                f,
                "Error: Invalid request. {}",
                message.as_deref().unwrap_or(CHECK_PARAMETERS)
            ),
            Self::AuthFailure => f.write_str(
                "Error: Authentication failed. Check that the API token is configured and still valid.",
            ),
            Self::Forbidden => f.write_str(
                "Error: Permission denied. The configured credentials cannot access this resource.",
            ),
            Self::NotFound => f.write_str(
                "Error: Resource not found. Check that the ID is correct and that you have access to it.",
            ),
            Self::RateLimited => f.write_str(
                "Error: Rate limit exceeded. Wait a moment before making more requests.",
            ),
            Self::ServerError { status } => write!(
                f,
                "Error: The API returned a server error ({status}). This is usually temporary; try again shortly."
            ),
            Self::Timeout => f.write_str("Error: Request timed out. Try again."),
            Self::ConnectionRefused => f.write_str(
                "Error: Could not connect to the API. Check network connectivity and the configured base URL.",
            ),
            Self::UnknownStatus {
                status,
                message: Some(message),
            } => write!(f, "Error: API request failed with status {status}: {message}"),
            Self::UnknownStatus {
                status,
                message: None,
            } => write!(f, "Error: API request failed with status {status}."),
            Self::Unexpected(cause) => write!(f, "Error: Unexpected error: {cause}"),
        }
    }
}

impl std::error::Error for ErrorCategory {}

/// Map a status code (and optional upstream message) to its category.
#[must_use]
pub fn classify_status(status: u16, message: Option<&str>) -> ErrorCategory {
    match status {
        400 => ErrorCategory::BadRequest {
            message: message.map(str::to_string),
        },
        401 => ErrorCategory::AuthFailure,
        403 => ErrorCategory::Forbidden,
        404 => ErrorCategory::NotFound,
        429 => ErrorCategory::RateLimited,
        s if s >= 500 => ErrorCategory::ServerError { status: s },
        s => ErrorCategory::UnknownStatus {
            status: s,
            message: message.map(str::to_string),
        },
    }
}

/// Classify a transport failure.
#[must_use]
pub fn classify(error: &TransportError) -> ErrorCategory {
    match error {
        TransportError::Status {
            status, message, ..
        } => classify_status(*status, message.as_deref()),
        TransportError::Timeout(_) => ErrorCategory::Timeout,
        TransportError::Connect(_) => ErrorCategory::ConnectionRefused,
        TransportError::Decode(_)
        | TransportError::ResponseTooLarge(_)
        | TransportError::InvalidRequest(_)
        | TransportError::Request(_) => ErrorCategory::unexpected(error),
    }
}

/// Classify any error by walking its source chain for a transport failure.
#[must_use]
pub fn classify_error(error: &(dyn std::error::Error + 'static)) -> ErrorCategory {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = current {
        if let Some(category) = classify_known(e) {
            return category;
        }
        current = e.source();
    }
    ErrorCategory::unexpected(error)
}

/// Same as [`classify_error`] for `anyhow` errors.
#[must_use]
pub fn classify_anyhow(error: &anyhow::Error) -> ErrorCategory {
    error
        .chain()
        .find_map(classify_known)
        .unwrap_or_else(|| ErrorCategory::unexpected(error))
}

fn classify_known(e: &(dyn std::error::Error + 'static)) -> Option<ErrorCategory> {
    if let Some(t) = e.downcast_ref::<TransportError>() {
        return Some(classify(t));
    }
    if let Some(r) = e.downcast_ref::<reqwest::Error>() {
        return Some(classify(&TransportError::from_reqwest(r)));
    }
    e.downcast_ref::<ErrorCategory>().cloned()
}
