//! Decision/audit pipeline — NDJSON entries, minimal/full modes, a
//! bounded async queue with backpressure, and a write-ahead log replayed
//! on restart.

pub mod entry;
pub mod pipeline;

pub use entry::{AuditEffect, AuditEntry};
pub use pipeline::{replay_wal, AuditError, AuditMode, AuditPipeline};
