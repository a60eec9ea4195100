//! The deny-overrides evaluation engine. Produces a `Decision` from a
//! request, the currently installed snapshot, and whatever the attribute
//! resolver returns — deterministic given those three inputs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use aegis_kernel::{AccessRequest, AttrValue, AttributeBundle, ClientKind};

use crate::cache::PolicyCache;
use crate::decision::{Decision, Reason};
use crate::dsl::ast::Effect as AstEffect;
use crate::dsl::eval::eval_bool;
use crate::error::DenyReason;
use crate::resolver::{AttributeResolver, ProviderError};

/// Wires the attribute resolver and the policy cache together behind
/// `evaluate`. Owns no mutable state beyond its dependencies — every
/// call is independent.
pub struct Engine {
    cache: Arc<PolicyCache>,
    resolver: Arc<AttributeResolver>,
}

impl Engine {
    pub fn new(cache: Arc<PolicyCache>, resolver: Arc<AttributeResolver>) -> Self {
        Engine { cache, resolver }
    }

    #[instrument(skip(self, request, cancel), fields(subject = %request.subject(), action = %request.action(), resource = %request.resource()))]
    pub async fn evaluate(&self, request: &AccessRequest, cancel: &CancellationToken) -> Decision {
        if request.subject().is_system() {
            return Decision::allow(Reason::Stable(DenyReason::SystemBypass), None, 0, request);
        }

        if cancel.is_cancelled() {
            return Decision::deny(DenyReason::Canceled, None, 0, request);
        }

        let snapshot = self.cache.snapshot();
        if snapshot.is_empty() || self.cache.is_stale() {
            metrics::counter!("aegis_decision_total", "effect" => "deny", "reason" => "cache_unavailable").increment(1);
            return Decision::deny(DenyReason::CacheUnavailable, None, snapshot.generation(), request);
        }

        let (principal, resource) = tokio::select! {
            _ = cancel.cancelled() => {
                return Decision::deny(DenyReason::Canceled, None, snapshot.generation(), request);
            }
            result = self.resolve_both(request) => {
                match result {
                    Ok(bundles) => bundles,
                    Err(err) => {
                        warn!(error = %err, "attribute resolution failed");
                        metrics::counter!("aegis_decision_total", "effect" => "deny", "reason" => "attribute_resolution_failed").increment(1);
                        return Decision::deny(DenyReason::AttributeResolutionFailed, None, snapshot.generation(), request);
                    }
                }
            }
        };

        let env = env_bundle(request);

        let mut forbidding: Option<(String, String)> = None;
        let mut permitting: Option<(String, String)> = None;

        for policy in snapshot.policies() {
            if cancel.is_cancelled() {
                return Decision::deny(DenyReason::Canceled, None, snapshot.generation(), request);
            }

            let principal_type = request.subject().kind().to_string();
            let resource_type = request.resource().kind().to_string();
            if !policy.target_matches(&principal_type, request.action(), &resource_type) {
                continue;
            }

            let matched = match &policy.condition {
                None => true,
                Some(cond) => match eval_bool(cond, &principal, &resource, &env) {
                    Ok(b) => b,
                    Err(()) => false,
                },
            };
            if !matched {
                continue;
            }

            debug!(policy = %policy.name, effect = ?policy.effect, "policy matched");
            match policy.effect {
                AstEffect::Forbid if forbidding.is_none() => {
                    forbidding = Some((policy.id.clone(), policy.name.clone()));
                }
                AstEffect::Permit if permitting.is_none() => {
                    permitting = Some((policy.id.clone(), policy.name.clone()));
                }
                _ => {}
            }
        }

        let decision = if let Some((id, name)) = forbidding {
            metrics::counter!("aegis_decision_total", "effect" => "deny", "reason" => "policy").increment(1);
            Decision::deny_by_policy(name, id, snapshot.generation(), request)
        } else if let Some((id, name)) = permitting {
            metrics::counter!("aegis_decision_total", "effect" => "allow", "reason" => "policy").increment(1);
            Decision::allow(Reason::Policy(name), Some(id), snapshot.generation(), request)
        } else {
            metrics::counter!("aegis_decision_total", "effect" => "deny", "reason" => "default_deny").increment(1);
            Decision::deny(DenyReason::DefaultDeny, None, snapshot.generation(), request)
        };

        decision
    }

    async fn resolve_both(&self, request: &AccessRequest) -> Result<(AttributeBundle, AttributeBundle), ProviderError> {
        let principal = self.resolver.resolve_subject(request.subject()).await?;
        let resource = self.resolver.resolve_resource(request.resource()).await?;
        Ok((principal, resource))
    }
}

fn env_bundle(request: &AccessRequest) -> AttributeBundle {
    let mut bundle = AttributeBundle::new();
    let mut attrs: HashMap<String, AttrValue> = HashMap::new();
    if let Some(ts) = request.env().timestamp {
        attrs.insert("timestamp".to_string(), AttrValue::Int(ts.timestamp()));
    }
    if let Some(kind) = request.env().client_kind {
        let s = match kind {
            ClientKind::Telnet => "telnet",
            ClientKind::WebSocket => "websocket",
            ClientKind::Internal => "internal",
        };
        attrs.insert("client_kind".to_string(), AttrValue::from(s));
    }
    bundle.set("env", attrs);
    bundle
}
