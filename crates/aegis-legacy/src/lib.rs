//! The legacy glob/role adapter and the session subject resolver — the
//! two pieces of the authorization core that exist purely to bridge
//! pre-engine callers onto it during migration.

pub mod error;
pub mod glob;
pub mod legacy;
pub mod session;

pub use error::SessionError;
pub use legacy::{CapabilityRegistry, LegacyAdapter, LocationResolver};
pub use session::{resolve_subject, SessionResolver};
