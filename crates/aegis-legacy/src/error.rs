use thiserror::Error;

/// Failures resolving a `session:<opaque>` subject to a character. The
/// engine maps `Invalid` to deny `session_invalid` and anything else to
/// deny `session_store_error`.
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("session '{0}' is invalid or expired")]
    Invalid(String),

    #[error("session store error: {0}")]
    Store(String),
}
