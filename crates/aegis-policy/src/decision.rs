//! The output of the evaluation engine.

use aegis_kernel::{AccessRequest, EntityRef};

use crate::error::DenyReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

/// Either a stable `DenyReason`, or — for an allow produced by a matching
/// `permit` policy, or a deny produced by a matching `forbid` policy — the
/// name of the policy that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Stable(DenyReason),
    Policy(String),
}

impl Reason {
    pub fn as_str(&self) -> &str {
        match self {
            Reason::Stable(r) => r.as_str(),
            Reason::Policy(name) => name,
        }
    }
}

/// A self-contained record of an authorization decision: effect, reason,
/// and an echo of the request it answers, ready to hand to the audit
/// pipeline without looking anything else up.
#[derive(Debug, Clone)]
pub struct Decision {
    pub effect: Effect,
    pub reason: Reason,
    pub policy_id: Option<String>,
    pub snapshot_generation: u64,
    pub subject: EntityRef,
    pub action: String,
    pub resource: EntityRef,
}

impl Decision {
    pub fn allow(reason: Reason, policy_id: Option<String>, snapshot_generation: u64, request: &AccessRequest) -> Self {
        Decision {
            effect: Effect::Allow,
            reason,
            policy_id,
            snapshot_generation,
            subject: request.subject().clone(),
            action: request.action().to_string(),
            resource: request.resource().clone(),
        }
    }

    pub fn deny(reason: DenyReason, policy_id: Option<String>, snapshot_generation: u64, request: &AccessRequest) -> Self {
        Decision {
            effect: Effect::Deny,
            reason: Reason::Stable(reason),
            policy_id,
            snapshot_generation,
            subject: request.subject().clone(),
            action: request.action().to_string(),
            resource: request.resource().clone(),
        }
    }

    pub fn deny_by_policy(name: String, policy_id: String, snapshot_generation: u64, request: &AccessRequest) -> Self {
        Decision {
            effect: Effect::Deny,
            reason: Reason::Policy(name),
            policy_id: Some(policy_id),
            snapshot_generation,
            subject: request.subject().clone(),
            action: request.action().to_string(),
            resource: request.resource().clone(),
        }
    }

    pub fn is_allow(&self) -> bool {
        self.effect == Effect::Allow
    }
}
