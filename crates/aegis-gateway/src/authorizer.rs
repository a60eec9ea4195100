//! The composition root's facade: wires attribute resolution, the policy
//! cache, the evaluation engine, audit, and the legacy session resolver
//! into one `Authorizer` a command handler can call without knowing any
//! of the pieces behind it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use aegis_kernel::{AccessRequest, EntityRef, SchemaRegistry};
use aegis_audit::{AuditEntry, AuditPipeline};
use aegis_policy::{AttributeResolver, Decision, Engine, PolicyCache, PolicyDoc, PolicyStore};
use aegis_legacy::{resolve_subject, SessionError, SessionResolver};

pub struct AuthorizerConfig {
    pub stale_after: Duration,
    pub max_reload_interval: Duration,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        AuthorizerConfig {
            stale_after: aegis_policy::cache::DEFAULT_STALE_AFTER,
            max_reload_interval: aegis_policy::cache::DEFAULT_MAX_RELOAD_INTERVAL,
        }
    }
}

/// The single entry point a command handler uses: resolves a possibly
/// session-shaped subject, runs the engine, and records the decision.
pub struct Authorizer {
    engine: Engine,
    audit: Arc<AuditPipeline>,
    session_resolver: Option<Arc<dyn SessionResolver>>,
    cancel: CancellationToken,
    background: Vec<tokio::task::JoinHandle<()>>,
}

impl Authorizer {
    /// Wires the store, cache, engine, and audit pipeline together under
    /// one shared `CancellationToken`. The cache's background reload loop,
    /// the audit pipeline's writer task (if the caller built one with
    /// `AuditPipeline::full` and passes its handle here), and any other
    /// composition-root tasks are all signaled and awaited together by
    /// `shutdown`.
    pub async fn bootstrap(
        store: Arc<dyn PolicyStore>,
        schema: Arc<SchemaRegistry>,
        resolver: Arc<AttributeResolver>,
        session_resolver: Option<Arc<dyn SessionResolver>>,
        audit: Arc<AuditPipeline>,
        seeds: Vec<PolicyDoc>,
        config: AuthorizerConfig,
        cancel: CancellationToken,
        audit_writer: Option<tokio::task::JoinHandle<()>>,
    ) -> anyhow::Result<Self> {
        for seed in seeds {
            store.upsert_seed(seed).await?;
        }

        let cache = Arc::new(PolicyCache::new(store.clone(), schema).with_stale_after(config.stale_after));
        cache.reload().await?;
        info!("authorization policy cache primed");

        let changes = store.listen();
        let reload_handle = cache
            .clone()
            .spawn_reload_loop(changes, config.max_reload_interval, cancel.clone());

        let engine = Engine::new(cache, resolver);

        let mut background = vec![reload_handle];
        background.extend(audit_writer);

        Ok(Authorizer {
            engine,
            audit,
            session_resolver,
            cancel,
            background,
        })
    }

    /// Resolves `request`'s subject (expanding a session reference, if
    /// any), evaluates it, records the decision, and returns it to the
    /// caller. The handler proceeds only when the returned
    /// `Decision::is_allow()`.
    pub async fn evaluate(&self, request: AccessRequest) -> Decision {
        let request = match self.expand_session(request).await {
            Ok(r) => r,
            Err(decision) => {
                self.record(&decision).await;
                return decision;
            }
        };

        let decision = self.engine.evaluate(&request, &self.cancel).await;
        self.record(&decision).await;
        decision
    }

    async fn expand_session(&self, request: AccessRequest) -> Result<AccessRequest, Decision> {
        let Some(resolver) = &self.session_resolver else {
            return Ok(request);
        };
        if request.subject().kind() != aegis_kernel::EntityType::Session {
            return Ok(request);
        }

        match resolve_subject(resolver.as_ref(), request.subject()).await {
            Ok(character) => Ok(rebuild_with_subject(request, character)),
            Err(SessionError::Invalid(_)) => Err(Decision::deny(
                aegis_policy::DenyReason::SessionInvalid,
                None,
                0,
                &request,
            )),
            Err(SessionError::Store(_)) => Err(Decision::deny(
                aegis_policy::DenyReason::SessionStoreError,
                None,
                0,
                &request,
            )),
        }
    }

    async fn record(&self, decision: &Decision) {
        self.audit.record(|seq| AuditEntry::from_decision(decision, seq, None)).await;
    }

    /// Signals the background reload loop to stop and waits for it.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.background {
            let _ = handle.await;
        }
    }
}

fn rebuild_with_subject(request: AccessRequest, subject: EntityRef) -> AccessRequest {
    AccessRequest::new(subject, request.action().to_string(), request.resource().clone()).with_env(request.env().clone())
}

/// Default seed policies installed at first boot: a system-only admin
/// bootstrap bypass is unnecessary since `system:` always short-circuits
/// in the engine, so the seed set here is deliberately empty — operators
/// declare their own via the admin CLI or a seed config file.
pub fn default_seeds() -> Vec<PolicyDoc> {
    Vec::new()
}

pub fn default_wal_path() -> PathBuf {
    PathBuf::from("aegis-audit.wal")
}

pub fn default_log_path() -> PathBuf {
    PathBuf::from("aegis-audit.ndjson")
}
