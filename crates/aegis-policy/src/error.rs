use thiserror::Error;

use aegis_kernel::KernelError;

/// Errors raised while compiling, storing, or hot-reloading policies.
///
/// One enum per crate boundary, `#[from]` conversions at the edges,
/// stable `reason`-style variants that callers can branch on.
#[derive(Debug, Error, Clone)]
pub enum PolicyError {
    #[error("compile error at {line}:{col}: {message}")]
    Compile {
        line: u32,
        col: u32,
        message: String,
    },

    #[error("unknown attribute '{namespace}.{attr}' at {line}:{col}")]
    UnknownAttribute {
        namespace: String,
        attr: String,
        line: u32,
        col: u32,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl PolicyError {
    pub fn compile(line: u32, col: u32, message: impl Into<String>) -> Self {
        PolicyError::Compile {
            line,
            col,
            message: message.into(),
        }
    }

    pub fn unknown_attribute(namespace: impl Into<String>, attr: impl Into<String>, line: u32, col: u32) -> Self {
        PolicyError::UnknownAttribute {
            namespace: namespace.into(),
            attr: attr.into(),
            line,
            col,
        }
    }
}

/// Errors surfaced by `PolicyCache::reload`.
#[derive(Debug, Error, Clone)]
pub enum ReloadError {
    #[error("policy '{name}' failed to compile: {source}")]
    CompileFailed { name: String, source: PolicyError },

    #[error("store error: {0}")]
    Store(String),
}

/// Stable, branch-on-able reasons a `Decision` can carry. These are
/// identifiers, not human prose — callers match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    SystemBypass,
    CacheUnavailable,
    AttributeResolutionFailed,
    SessionInvalid,
    SessionStoreError,
    Canceled,
    DefaultDeny,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::SystemBypass => "system_bypass",
            DenyReason::CacheUnavailable => "cache_unavailable",
            DenyReason::AttributeResolutionFailed => "attribute_resolution_failed",
            DenyReason::SessionInvalid => "session_invalid",
            DenyReason::SessionStoreError => "session_store_error",
            DenyReason::Canceled => "canceled",
            DenyReason::DefaultDeny => "default_deny",
        }
    }
}
