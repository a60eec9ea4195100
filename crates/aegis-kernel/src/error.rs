use thiserror::Error;

/// Shared error vocabulary for the reference model and attribute schema.
///
/// Every other crate in the workspace composes its own error enum from
/// this one via `#[from]`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("invalid entity reference '{0}': {1}")]
    InvalidEntityRef(String, String),

    #[error("unknown attribute '{namespace}.{name}'")]
    UnknownAttribute { namespace: String, name: String },

    #[error("namespace '{0}' is already registered")]
    DuplicateNamespace(String),

    #[error("schema is already frozen; no further namespaces can be registered")]
    SchemaFrozen,
}
