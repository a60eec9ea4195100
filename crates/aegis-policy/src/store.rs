//! Policy persistence and the change feed the cache listens on.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::doc::PolicyDoc;
use crate::error::PolicyError;

/// Operations the policy cache and admin tooling need from persisted
/// policy storage. `list_enabled`/`listen` are on the hot reload path;
/// the rest back admin CRUD only.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn list_enabled(&self) -> Result<Vec<PolicyDoc>, PolicyError>;

    /// Yields a receiver of opaque notification tokens; any message means
    /// "something changed, reload". Content is never inspected.
    fn listen(&self) -> broadcast::Receiver<String>;

    async fn get(&self, id: &str) -> Result<Option<PolicyDoc>, PolicyError>;
    async fn create(&self, doc: PolicyDoc) -> Result<(), PolicyError>;
    async fn update(&self, doc: PolicyDoc) -> Result<(), PolicyError>;
    async fn delete(&self, id: &str) -> Result<bool, PolicyError>;
    async fn list(&self) -> Result<Vec<PolicyDoc>, PolicyError>;

    /// Upserts a seed policy by name. Overwrites only if the existing row's
    /// `seed_version` is strictly lower than `doc.seed_version` — running
    /// this twice with the same seed set is a no-op the second time.
    async fn upsert_seed(&self, doc: PolicyDoc) -> Result<(), PolicyError>;
}

/// A plain in-process store, used by the composition root's default `mem`
/// wiring and by tests that don't need a real embedded database.
#[derive(Clone)]
pub struct InMemoryPolicyStore {
    inner: Arc<RwLock<HashMap<String, PolicyDoc>>>,
    changed: broadcast::Sender<String>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        InMemoryPolicyStore {
            inner: Arc::new(RwLock::new(HashMap::new())),
            changed: tx,
        }
    }

    fn notify(&self) {
        // A broadcast channel with no receivers errors on send; that's
        // fine, nobody is listening yet.
        let _ = self.changed.send("changed".to_string());
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn list_enabled(&self) -> Result<Vec<PolicyDoc>, PolicyError> {
        let guard = self.inner.read().await;
        Ok(guard.values().filter(|d| d.enabled).cloned().collect())
    }

    fn listen(&self) -> broadcast::Receiver<String> {
        self.changed.subscribe()
    }

    async fn get(&self, id: &str) -> Result<Option<PolicyDoc>, PolicyError> {
        let guard = self.inner.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn create(&self, doc: PolicyDoc) -> Result<(), PolicyError> {
        let mut guard = self.inner.write().await;
        if guard.values().any(|d| d.name == doc.name) {
            return Err(PolicyError::Store(format!(
                "policy name '{}' already exists",
                doc.name
            )));
        }
        guard.insert(doc.id.clone(), doc);
        drop(guard);
        self.notify();
        Ok(())
    }

    async fn update(&self, doc: PolicyDoc) -> Result<(), PolicyError> {
        let mut guard = self.inner.write().await;
        if !guard.contains_key(&doc.id) {
            return Err(PolicyError::Store(format!("policy '{}' not found", doc.id)));
        }
        guard.insert(doc.id.clone(), doc);
        drop(guard);
        self.notify();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, PolicyError> {
        let mut guard = self.inner.write().await;
        let removed = guard.remove(id).is_some();
        drop(guard);
        if removed {
            self.notify();
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<PolicyDoc>, PolicyError> {
        let guard = self.inner.read().await;
        Ok(guard.values().cloned().collect())
    }

    async fn upsert_seed(&self, doc: PolicyDoc) -> Result<(), PolicyError> {
        let mut guard = self.inner.write().await;
        let existing_id = guard
            .values()
            .find(|d| d.name == doc.name)
            .map(|d| d.id.clone());

        match existing_id {
            Some(id) => {
                let should_overwrite = guard
                    .get(&id)
                    .map(|existing| existing.seed_version < doc.seed_version)
                    .unwrap_or(true);
                if should_overwrite {
                    let mut doc = doc;
                    doc.id = id;
                    guard.insert(doc.id.clone(), doc);
                }
            }
            None => {
                guard.insert(doc.id.clone(), doc);
            }
        }
        drop(guard);
        self.notify();
        Ok(())
    }
}

/// A `PolicyDoc` as stored in the `policies` table row.
#[cfg(feature = "mem")]
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PolicyRecord {
    doc: PolicyDoc,
}

/// A surrealdb-backed store. One struct parameterized over the engine so
/// `mem` and `embedded` builds share everything but the `Surreal::new`
/// call.
#[cfg(feature = "mem")]
pub struct SurrealPolicyStore {
    db: surrealdb::Surreal<surrealdb::engine::local::Db>,
    table: String,
    changed: broadcast::Sender<String>,
}

#[cfg(feature = "mem")]
impl SurrealPolicyStore {
    /// In-process, non-persistent engine — default wiring and integration
    /// tests that want real surrealdb query semantics without a disk.
    pub async fn new_mem(namespace: &str, database: &str) -> Result<Self, PolicyError> {
        let db = surrealdb::Surreal::new::<surrealdb::engine::local::Mem>(())
            .await
            .map_err(|e| PolicyError::Store(e.to_string()))?;
        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| PolicyError::Store(e.to_string()))?;
        let (tx, _rx) = broadcast::channel(64);
        Ok(SurrealPolicyStore {
            db,
            table: "policies".to_string(),
            changed: tx,
        })
    }

    #[cfg(feature = "embedded")]
    pub async fn new_embedded(path: &str, namespace: &str, database: &str) -> Result<Self, PolicyError> {
        let db = surrealdb::Surreal::new::<surrealdb::engine::local::RocksDb>(path)
            .await
            .map_err(|e| PolicyError::Store(e.to_string()))?;
        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| PolicyError::Store(e.to_string()))?;
        let (tx, _rx) = broadcast::channel(64);
        Ok(SurrealPolicyStore {
            db,
            table: "policies".to_string(),
            changed: tx,
        })
    }

    fn notify(&self) {
        let _ = self.changed.send("changed".to_string());
    }
}

#[cfg(feature = "mem")]
#[async_trait]
impl PolicyStore for SurrealPolicyStore {
    async fn list_enabled(&self) -> Result<Vec<PolicyDoc>, PolicyError> {
        let recs: Vec<PolicyRecord> = self
            .db
            .select(self.table.as_str())
            .await
            .map_err(|e| PolicyError::Store(e.to_string()))?;
        Ok(recs.into_iter().map(|r| r.doc).filter(|d| d.enabled).collect())
    }

    fn listen(&self) -> broadcast::Receiver<String> {
        self.changed.subscribe()
    }

    async fn get(&self, id: &str) -> Result<Option<PolicyDoc>, PolicyError> {
        let thing = (self.table.as_str(), id);
        let rec: Option<PolicyRecord> = self.db.select(thing).await.map_err(|e| PolicyError::Store(e.to_string()))?;
        Ok(rec.map(|r| r.doc))
    }

    async fn create(&self, doc: PolicyDoc) -> Result<(), PolicyError> {
        let thing = (self.table.as_str(), doc.id.clone());
        let _res: Option<PolicyRecord> = self
            .db
            .upsert(thing)
            .content(PolicyRecord { doc })
            .await
            .map_err(|e| PolicyError::Store(e.to_string()))?;
        self.notify();
        Ok(())
    }

    async fn update(&self, doc: PolicyDoc) -> Result<(), PolicyError> {
        self.create(doc).await
    }

    async fn delete(&self, id: &str) -> Result<bool, PolicyError> {
        let thing = (self.table.as_str(), id);
        let res: Option<PolicyRecord> = self.db.delete(thing).await.map_err(|e| PolicyError::Store(e.to_string()))?;
        let removed = res.is_some();
        if removed {
            self.notify();
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<PolicyDoc>, PolicyError> {
        let recs: Vec<PolicyRecord> = self
            .db
            .select(self.table.as_str())
            .await
            .map_err(|e| PolicyError::Store(e.to_string()))?;
        Ok(recs.into_iter().map(|r| r.doc).collect())
    }

    async fn upsert_seed(&self, doc: PolicyDoc) -> Result<(), PolicyError> {
        let existing = self
            .list()
            .await?
            .into_iter()
            .find(|d| d.name == doc.name);
        match existing {
            Some(current) if current.seed_version < doc.seed_version => {
                let mut doc = doc;
                doc.id = current.id;
                self.create(doc).await
            }
            Some(_) => Ok(()),
            None => self.create(doc).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Effect;

    #[tokio::test]
    async fn create_then_list_enabled() {
        let store = InMemoryPolicyStore::new();
        let doc = PolicyDoc::new_admin("p1", "permit(principal, action, resource);", Effect::Permit);
        store.create(doc.clone()).await.unwrap();
        let enabled = store.list_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "p1");
    }

    #[tokio::test]
    async fn disabled_policy_excluded_from_list_enabled() {
        let store = InMemoryPolicyStore::new();
        let mut doc = PolicyDoc::new_admin("p1", "permit(principal, action, resource);", Effect::Permit);
        doc.enabled = false;
        store.create(doc).await.unwrap();
        assert!(store.list_enabled().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_rejected() {
        let store = InMemoryPolicyStore::new();
        let doc1 = PolicyDoc::new_admin("p1", "permit(principal, action, resource);", Effect::Permit);
        let mut doc2 = PolicyDoc::new_admin("p1", "forbid(principal, action, resource);", Effect::Forbid);
        doc2.id = ulid::Ulid::new().to_string();
        store.create(doc1).await.unwrap();
        assert!(store.create(doc2).await.is_err());
    }

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let store = InMemoryPolicyStore::new();
        let doc = PolicyDoc::new_seed(
            "seed:admin",
            "permit(principal, action, resource);",
            Effect::Permit,
            1,
            "admin wildcard",
        );
        store.upsert_seed(doc.clone()).await.unwrap();
        store.upsert_seed(doc).await.unwrap();
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].seed_version, 1);
    }

    #[tokio::test]
    async fn reseeding_with_higher_version_overwrites() {
        let store = InMemoryPolicyStore::new();
        let v1 = PolicyDoc::new_seed(
            "seed:admin",
            "permit(principal, action, resource);",
            Effect::Permit,
            1,
            "v1",
        );
        store.upsert_seed(v1).await.unwrap();
        let v2 = PolicyDoc::new_seed(
            "seed:admin",
            "forbid(principal, action, resource);",
            Effect::Forbid,
            2,
            "v2",
        );
        store.upsert_seed(v2).await.unwrap();
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].seed_version, 2);
        assert_eq!(all[0].effect, Effect::Forbid);
    }

    #[tokio::test]
    async fn delete_then_get_returns_none() {
        let store = InMemoryPolicyStore::new();
        let doc = PolicyDoc::new_admin("p1", "permit(principal, action, resource);", Effect::Permit);
        let id = doc.id.clone();
        store.create(doc).await.unwrap();
        assert!(store.delete(&id).await.unwrap());
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn surreal_mem_store_round_trips() {
        let store = SurrealPolicyStore::new_mem("aegis_test", "aegis_test")
            .await
            .expect("connect mem surreal");
        let doc = PolicyDoc::new_admin("p1", "permit(principal, action, resource);", Effect::Permit);
        let id = doc.id.clone();
        store.create(doc).await.expect("create");
        let loaded = store.get(&id).await.expect("get").expect("present");
        assert_eq!(loaded.name, "p1");
        let removed = store.delete(&id).await.expect("delete");
        assert!(removed);
    }
}
