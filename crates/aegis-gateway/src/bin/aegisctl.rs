//! Admin CLI for policy CRUD and manual cache reload. Ambient tooling —
//! the hot evaluation path never goes through this binary.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use aegis_kernel::SchemaRegistry;
use aegis_policy::doc::Effect;
use aegis_policy::{InMemoryPolicyStore, PolicyCache, PolicyDoc, PolicyStore};

#[derive(Parser)]
#[command(name = "aegisctl", about = "Administer the authorization policy store")]
struct Cli {
    /// Path to a persisted surrealdb-embedded store; omit for an ephemeral
    /// in-memory store (useful for dry-running a DSL change).
    #[arg(long, env = "AEGIS_DB_PATH")]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage policy documents.
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Force an out-of-band cache reload, bypassing the change-feed and
    /// the background loop's max interval.
    Reload,
}

#[derive(Subcommand)]
enum PolicyAction {
    Create {
        name: String,
        #[arg(long)]
        dsl_file: String,
        #[arg(long, value_enum)]
        effect: CliEffect,
    },
    Update {
        id: String,
        #[arg(long)]
        dsl_file: Option<String>,
        #[arg(long, value_enum)]
        effect: Option<CliEffect>,
    },
    Get {
        id: String,
    },
    Delete {
        id: String,
    },
    List,
}

#[derive(Clone, clap::ValueEnum)]
enum CliEffect {
    Permit,
    Forbid,
}

impl From<CliEffect> for Effect {
    fn from(e: CliEffect) -> Self {
        match e {
            CliEffect::Permit => Effect::Permit,
            CliEffect::Forbid => Effect::Forbid,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let store: Arc<dyn PolicyStore> = build_store(cli.db_path.as_deref()).await?;

    match cli.command {
        Command::Policy { action } => run_policy_action(store, action).await?,
        Command::Reload => run_reload(store).await?,
    }

    Ok(())
}

async fn build_store(db_path: Option<&str>) -> anyhow::Result<Arc<dyn PolicyStore>> {
    #[cfg(feature = "embedded")]
    if let Some(path) = db_path {
        let store = aegis_policy::store::SurrealPolicyStore::new_embedded(path, "aegis", "aegis").await?;
        return Ok(Arc::new(store));
    }
    #[cfg(not(feature = "embedded"))]
    if db_path.is_some() {
        anyhow::bail!("embedded store support requires building aegisctl with --features embedded");
    }
    Ok(Arc::new(InMemoryPolicyStore::new()))
}

async fn run_policy_action(store: Arc<dyn PolicyStore>, action: PolicyAction) -> anyhow::Result<()> {
    match action {
        PolicyAction::Create { name, dsl_file, effect } => {
            let dsl_text = std::fs::read_to_string(&dsl_file)?;
            let doc = PolicyDoc::new_admin(name, dsl_text, effect.into());
            let id = doc.id.clone();
            store.create(doc).await?;
            println!("created policy {id}");
        }
        PolicyAction::Update { id, dsl_file, effect } => {
            let mut doc = match store.get(&id).await? {
                Some(doc) => doc,
                None => {
                    println!("not found");
                    return Ok(());
                }
            };
            if let Some(dsl_file) = dsl_file {
                doc.dsl_text = std::fs::read_to_string(&dsl_file)?;
            }
            if let Some(effect) = effect {
                doc.effect = effect.into();
            }
            doc.updated_at = chrono::Utc::now();
            store.update(doc).await?;
            println!("updated policy {id}");
        }
        PolicyAction::Get { id } => match store.get(&id).await? {
            Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
            None => println!("not found"),
        },
        PolicyAction::Delete { id } => {
            let removed = store.delete(&id).await?;
            println!("{}", if removed { "deleted" } else { "not found" });
        }
        PolicyAction::List => {
            let docs = store.list().await?;
            for doc in docs {
                println!("{} {} enabled={}", doc.id, doc.name, doc.enabled);
            }
        }
    }
    Ok(())
}

/// Builds a cache over the same store a running server uses and forces a
/// reload, printing the resulting generation. This CLI has no access to
/// the live attribute schema a server process boots with, so it reloads
/// against an empty, frozen registry — sufficient to exercise the
/// out-of-band reload path and surface any policy that fails to compile,
/// though policies referencing namespaced attributes will only validate
/// when run against the real server's schema.
async fn run_reload(store: Arc<dyn PolicyStore>) -> anyhow::Result<()> {
    let mut schema = SchemaRegistry::new();
    schema.freeze();
    let cache = PolicyCache::new(store, Arc::new(schema));
    let snapshot = cache.reload().await?;
    println!("reloaded: generation={} policies={}", snapshot.generation(), snapshot.policies().len());
    Ok(())
}
