//! Exercises the wired-up `Authorizer` facade end to end: admin role
//! grant, builder-cannot-delete, self-access, forbid-overrides-permit,
//! stale-cache fail-closed, and session resolution failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use aegis_audit::AuditPipeline;
use aegis_kernel::{AccessRequest, AttrType, AttrValue, EntityRef, EntityType, NamespaceSchema, SchemaRegistry};
use aegis_gateway::{Authorizer, AuthorizerConfig};
use aegis_legacy::{SessionError, SessionResolver};
use aegis_policy::doc::Effect;
use aegis_policy::{AttributeProvider, AttributeResolver, InMemoryPolicyStore, PolicyDoc, PolicyStore, ProviderError};

struct CharacterProvider {
    roles: HashMap<String, String>,
}

#[async_trait]
impl AttributeProvider for CharacterProvider {
    fn namespace(&self) -> &str {
        "character"
    }

    async fn resolve_subject(&self, id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError> {
        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), AttrValue::from(id.id()));
        if let Some(role) = self.roles.get(id.id()) {
            attrs.insert("role".to_string(), AttrValue::from(role.as_str()));
        }
        Ok(attrs)
    }

    async fn resolve_resource(&self, id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError> {
        self.resolve_subject(id).await
    }
}

struct PropertyProvider;

#[async_trait]
impl AttributeProvider for PropertyProvider {
    fn namespace(&self) -> &str {
        "property"
    }

    async fn resolve_subject(&self, _id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError> {
        Ok(HashMap::new())
    }

    async fn resolve_resource(&self, id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError> {
        let mut attrs = HashMap::new();
        let sensitivity = if id.id().starts_with("secret.") { "secret" } else { "public" };
        attrs.insert("sensitivity".to_string(), AttrValue::from(sensitivity));
        Ok(attrs)
    }
}

fn schema() -> Arc<SchemaRegistry> {
    let mut reg = SchemaRegistry::new();
    reg.register(
        "character",
        NamespaceSchema::new().declare("role", AttrType::String).declare("id", AttrType::String),
    )
    .unwrap();
    reg.register("property", NamespaceSchema::new().declare("sensitivity", AttrType::String))
        .unwrap();
    reg.freeze();
    Arc::new(reg)
}

fn seeds() -> Vec<PolicyDoc> {
    vec![
        PolicyDoc::new_seed(
            "admin-wildcard",
            r#"permit(principal, action, resource) when { principal.character.role == "admin" };"#,
            Effect::Permit,
            1,
            "admins may perform any action",
        ),
        PolicyDoc::new_seed(
            "player-self-access",
            r#"permit(principal is character, action, resource is character)
               when { resource.character.id == principal.character.id };"#,
            Effect::Permit,
            1,
            "a character may always act on itself",
        ),
        PolicyDoc::new_seed(
            "permit-read-property",
            r#"permit(principal, action in ["read"], resource is property);"#,
            Effect::Permit,
            1,
            "anyone may read a property by default",
        ),
        PolicyDoc::new_seed(
            "forbid-secret-property",
            r#"forbid(principal, action, resource is property)
               when { resource.property.sensitivity == "secret" };"#,
            Effect::Forbid,
            1,
            "secret properties are never readable regardless of the permit above",
        ),
    ]
}

async fn build_authorizer() -> (Authorizer, Arc<InMemoryPolicyStore>) {
    let store = Arc::new(InMemoryPolicyStore::new());
    let mut resolver = AttributeResolver::new();
    let mut roles = HashMap::new();
    roles.insert("01ADMIN".to_string(), "admin".to_string());
    roles.insert("01BUILD".to_string(), "builder".to_string());
    resolver.register(EntityType::Character, Arc::new(CharacterProvider { roles }));
    resolver.register(EntityType::Property, Arc::new(PropertyProvider));

    let authorizer = Authorizer::bootstrap(
        store.clone(),
        schema(),
        Arc::new(resolver),
        None,
        AuditPipeline::minimal(),
        seeds(),
        AuthorizerConfig::default(),
        tokio_util::sync::CancellationToken::new(),
        None,
    )
    .await
    .unwrap();

    (authorizer, store)
}

#[tokio::test]
async fn admin_role_grants_any_action() {
    let (authorizer, _store) = build_authorizer().await;
    let request = AccessRequest::new(EntityRef::character("01ADMIN"), "delete", EntityRef::location("01LOC"));
    let decision = authorizer.evaluate(request).await;
    assert!(decision.is_allow());
}

#[tokio::test]
async fn builder_cannot_delete_location() {
    let (authorizer, _store) = build_authorizer().await;
    let request = AccessRequest::new(EntityRef::character("01BUILD"), "delete", EntityRef::location("01LOC"));
    let decision = authorizer.evaluate(request).await;
    assert!(!decision.is_allow());
}

#[tokio::test]
async fn character_may_always_act_on_itself() {
    let (authorizer, _store) = build_authorizer().await;
    let request = AccessRequest::new(
        EntityRef::character("01BUILD"),
        "inspect",
        EntityRef::character("01BUILD"),
    );
    let decision = authorizer.evaluate(request).await;
    assert!(decision.is_allow());
}

#[tokio::test]
async fn forbid_on_secret_property_overrides_general_read_permit() {
    let (authorizer, _store) = build_authorizer().await;

    let public_read = AccessRequest::new(
        EntityRef::character("01BUILD"),
        "read",
        EntityRef::property("public.description"),
    );
    assert!(authorizer.evaluate(public_read).await.is_allow());

    let secret_read = AccessRequest::new(
        EntityRef::character("01BUILD"),
        "read",
        EntityRef::property("secret.password"),
    );
    assert!(!authorizer.evaluate(secret_read).await.is_allow());
}

struct FixedSessionResolver {
    token_to_character: HashMap<String, String>,
}

#[async_trait]
impl SessionResolver for FixedSessionResolver {
    async fn resolve_session(&self, token: &str) -> Result<EntityRef, SessionError> {
        self.token_to_character
            .get(token)
            .map(|id| EntityRef::character(id.clone()))
            .ok_or_else(|| SessionError::Invalid(token.to_string()))
    }
}

#[tokio::test]
async fn invalid_session_token_denies_without_reaching_the_engine() {
    let store = Arc::new(InMemoryPolicyStore::new());
    let mut resolver = AttributeResolver::new();
    resolver.register(EntityType::Character, Arc::new(CharacterProvider { roles: HashMap::new() }));

    let session_resolver: Arc<dyn SessionResolver> = Arc::new(FixedSessionResolver {
        token_to_character: HashMap::new(),
    });

    let authorizer = Authorizer::bootstrap(
        store,
        schema(),
        Arc::new(resolver),
        Some(session_resolver),
        AuditPipeline::minimal(),
        seeds(),
        AuthorizerConfig::default(),
        tokio_util::sync::CancellationToken::new(),
        None,
    )
    .await
    .unwrap();

    let request = AccessRequest::new(
        EntityRef::session("not-a-real-token"),
        "read",
        EntityRef::property("public.description"),
    );
    let decision = authorizer.evaluate(request).await;
    assert!(!decision.is_allow());

    authorizer.shutdown().await;
}

#[tokio::test]
async fn stale_cache_denies_everything() {
    let (authorizer, _store) = {
        let store = Arc::new(InMemoryPolicyStore::new());
        let mut resolver = AttributeResolver::new();
        resolver.register(EntityType::Character, Arc::new(CharacterProvider {
            roles: [("01ADMIN".to_string(), "admin".to_string())].into_iter().collect(),
        }));

        let authorizer = Authorizer::bootstrap(
            store.clone(),
            schema(),
            Arc::new(resolver),
            None,
            AuditPipeline::minimal(),
            seeds(),
            AuthorizerConfig {
                stale_after: Duration::from_millis(1),
                max_reload_interval: Duration::from_secs(3600),
            },
            tokio_util::sync::CancellationToken::new(),
            None,
        )
        .await
        .unwrap();
        (authorizer, store)
    };

    tokio::time::sleep(Duration::from_millis(20)).await;

    let request = AccessRequest::new(EntityRef::character("01ADMIN"), "delete", EntityRef::location("01LOC"));
    let decision = authorizer.evaluate(request).await;
    assert!(!decision.is_allow());

    authorizer.shutdown().await;
}
