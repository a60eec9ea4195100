use chrono::{DateTime, Utc};

use crate::entity_ref::EntityRef;

/// The kind of client that originated a request, used only as an
/// environment hint available to policy conditions via `context.client_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Telnet,
    WebSocket,
    Internal,
}

/// Optional environment hints attached to a request, surfaced to policy
/// conditions under the `context.*` namespace.
#[derive(Debug, Clone, Default)]
pub struct EnvHints {
    pub timestamp: Option<DateTime<Utc>>,
    pub client_kind: Option<ClientKind>,
}

/// An immutable request to perform `action` on `resource`, on behalf of
/// `subject`. Built once per command and never mutated.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    subject: EntityRef,
    action: String,
    resource: EntityRef,
    env: EnvHints,
}

impl AccessRequest {
    pub fn new(subject: EntityRef, action: impl Into<String>, resource: EntityRef) -> Self {
        AccessRequest {
            subject,
            action: action.into(),
            resource,
            env: EnvHints::default(),
        }
    }

    pub fn with_env(mut self, env: EnvHints) -> Self {
        self.env = env;
        self
    }

    pub fn subject(&self) -> &EntityRef {
        &self.subject
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn resource(&self) -> &EntityRef {
        &self.resource
    }

    pub fn env(&self) -> &EnvHints {
        &self.env
    }
}
