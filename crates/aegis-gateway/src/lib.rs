//! Orchestration: wires the kernel, policy, audit, and legacy crates into
//! one `Authorizer` facade, and backs the `aegisctl` admin CLI.

pub mod authorizer;

pub use authorizer::{Authorizer, AuthorizerConfig};
