//! Authorization core for a multi-user text-world server.
//!
//! Loads configuration, initializes structured logging, wires the policy
//! store/cache/resolver/engine/audit/legacy stack into one `Authorizer`,
//! and runs a small interactive command loop that exercises it end to
//! end. Real command handlers live elsewhere and call the same
//! `Authorizer::evaluate` this binary demonstrates.

mod config;
mod schema_seed;

use std::io::{self, BufRead, Write as _};
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aegis_audit::AuditPipeline;
use aegis_gateway::{Authorizer, AuthorizerConfig};
use aegis_kernel::{AccessRequest, EntityRef};
use aegis_policy::{AttributeResolver, InMemoryPolicyStore, PolicyStore};

use crate::config::{AuditModeConfig, Settings, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_logging();

    tracing::info!("starting authorization core");

    let schema = Arc::new(schema_seed::build_schema());

    let store: Arc<dyn PolicyStore> = match settings.store.backend {
        StoreBackend::Memory => Arc::new(InMemoryPolicyStore::new()),
        #[cfg(feature = "embedded")]
        StoreBackend::Embedded => {
            let path = settings
                .store
                .embedded_path
                .clone()
                .unwrap_or_else(|| "aegis-policies.db".to_string());
            Arc::new(aegis_policy::store::SurrealPolicyStore::new_embedded(&path, "aegis", "aegis").await?)
        }
        #[cfg(not(feature = "embedded"))]
        StoreBackend::Embedded => {
            anyhow::bail!("embedded store backend requires building with --features embedded")
        }
    };

    let resolver = Arc::new(AttributeResolver::new());

    let cancel = tokio_util::sync::CancellationToken::new();

    let (audit, audit_writer) = match settings.audit.mode {
        AuditModeConfig::Minimal => (AuditPipeline::minimal(), None),
        AuditModeConfig::Full => {
            let (pipeline, handle) = AuditPipeline::full(
                settings.audit.wal_path.clone().into(),
                settings.audit.log_path.clone().into(),
                settings.audit.queue_capacity,
                cancel.clone(),
            );
            (pipeline, Some(handle))
        }
    };

    let authorizer = Authorizer::bootstrap(
        store,
        schema,
        resolver,
        None,
        audit,
        schema_seed::seed_policies(),
        AuthorizerConfig {
            stale_after: settings.cache.stale_after(),
            max_reload_interval: settings.cache.max_reload_interval(),
        },
        cancel,
        audit_writer,
    )
    .await?;

    run_demo_loop(&authorizer).await?;

    authorizer.shutdown().await;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// A tiny REPL over `subject action resource`, used to exercise the
/// wired-up authorizer without standing up a full command dispatcher.
/// Reads stdin with blocking calls, which is fine for an interactive
/// single-session demo tool.
async fn run_demo_loop(authorizer: &Authorizer) -> anyhow::Result<()> {
    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            print!("> ");
            io::stdout().flush()?;
            continue;
        }
        if parts[0] == "quit" {
            break;
        }
        if parts.len() != 3 {
            println!("usage: <subject> <action> <resource>");
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        let (subject, action, resource) = (parts[0], parts[1], parts[2]);
        match (EntityRef::parse(subject), EntityRef::parse(resource)) {
            (Ok(subject), Ok(resource)) => {
                let request = AccessRequest::new(subject, action, resource);
                let decision = authorizer.evaluate(request).await;
                println!("{:?} ({})", decision.effect, decision.reason.as_str());
            }
            (Err(e), _) | (_, Err(e)) => println!("parse error: {e}"),
        }

        print!("> ");
        io::stdout().flush()?;
    }
    Ok(())
}
