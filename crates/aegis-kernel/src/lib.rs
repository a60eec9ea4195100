//! Reference model, attribute schema, and shared error vocabulary.
//!
//! This crate is the leaf of the authorization core's dependency graph:
//! identifier grammar and typed attribute values that every other crate
//! in the workspace builds on, with no dependency back toward policy
//! evaluation itself.

mod attr_value;
mod bundle;
mod entity_ref;
mod error;
mod request;
mod schema;

pub use attr_value::{AttrType, AttrValue};
pub use bundle::AttributeBundle;
pub use entity_ref::{EntityRef, EntityType};
pub use error::KernelError;
pub use request::{AccessRequest, ClientKind, EnvHints};
pub use schema::{AttrDecl, NamespaceSchema, SchemaRegistry};
