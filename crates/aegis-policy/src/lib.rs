//! Attribute resolution, the policy DSL, persistence, the hot-reloadable
//! snapshot cache, and the deny-overrides evaluation engine — the core of
//! the authorization engine.

pub mod cache;
pub mod decision;
pub mod doc;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod snapshot;
pub mod store;

pub use cache::PolicyCache;
pub use decision::{Decision, Effect, Reason};
pub use doc::PolicyDoc;
pub use engine::Engine;
pub use error::{DenyReason, PolicyError, ReloadError};
pub use resolver::{AttributeProvider, AttributeResolver, ProviderError};
pub use snapshot::{CompiledPolicy, Snapshot};
pub use store::{InMemoryPolicyStore, PolicyStore};
