use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aegis_kernel::AttrValue;
use aegis_policy::{Decision, Effect};

/// One line of the audit log: required fields always present, `attrs`
/// only populated in full mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub seq: u64,
    pub subject: String,
    pub action: String,
    pub resource: String,
    pub effect: AuditEffect,
    pub reason: String,
    pub policy_id: Option<String>,
    pub snapshot_gen: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attrs: Option<HashMap<String, AttrValue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEffect {
    Allow,
    Deny,
}

impl From<Effect> for AuditEffect {
    fn from(e: Effect) -> Self {
        match e {
            Effect::Allow => AuditEffect::Allow,
            Effect::Deny => AuditEffect::Deny,
        }
    }
}

impl AuditEntry {
    pub fn from_decision(decision: &Decision, seq: u64, attrs: Option<HashMap<String, AttrValue>>) -> Self {
        AuditEntry {
            ts: Utc::now(),
            seq,
            subject: decision.subject.to_string(),
            action: decision.action.clone(),
            resource: decision.resource.to_string(),
            effect: decision.effect.into(),
            reason: decision.reason.as_str().to_string(),
            policy_id: decision.policy_id.clone(),
            snapshot_gen: decision.snapshot_generation,
            attrs,
        }
    }

    pub fn to_ndjson_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
