//! The attribute resolver. Gathers subject/resource attribute bundles
//! for one request, dispatching by entity-type prefix, and fails closed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use aegis_kernel::{AttrValue, AttributeBundle, EntityRef, EntityType};

/// A provider owns exactly one namespace and knows how to resolve
/// attributes for subjects and resources of the entity types it covers:
/// one trait, many infrastructure-specific implementations.
#[async_trait]
pub trait AttributeProvider: Send + Sync {
    fn namespace(&self) -> &str;

    async fn resolve_subject(&self, id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError>;

    async fn resolve_resource(&self, id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError>;
}

#[derive(Debug, Error, Clone)]
#[error("attribute provider '{namespace}' failed: {message}")]
pub struct ProviderError {
    pub namespace: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError {
            namespace: namespace.into(),
            message: message.into(),
        }
    }
}

/// Dispatches to the provider registered for an entity's type prefix. A
/// type with no registered provider resolves to an empty bundle for that
/// namespace rather than an error — a missing provider is a modeling gap,
/// not a resolution failure, and downstream attribute lookups on it just
/// come back null.
#[derive(Default)]
pub struct AttributeResolver {
    providers: HashMap<EntityType, Arc<dyn AttributeProvider>>,
}

impl AttributeResolver {
    pub fn new() -> Self {
        AttributeResolver::default()
    }

    pub fn register(&mut self, entity_type: EntityType, provider: Arc<dyn AttributeProvider>) {
        self.providers.insert(entity_type, provider);
    }

    pub async fn resolve_subject(&self, subject: &EntityRef) -> Result<AttributeBundle, ProviderError> {
        let mut bundle = AttributeBundle::new();
        if let Some(provider) = self.providers.get(&subject.kind()) {
            let attrs = provider.resolve_subject(subject).await?;
            bundle.set(provider.namespace().to_string(), attrs);
        }
        Ok(bundle)
    }

    pub async fn resolve_resource(&self, resource: &EntityRef) -> Result<AttributeBundle, ProviderError> {
        let mut bundle = AttributeBundle::new();
        if let Some(provider) = self.providers.get(&resource.kind()) {
            let attrs = provider.resolve_resource(resource).await?;
            bundle.set(provider.namespace().to_string(), attrs);
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCharacterProvider;

    #[async_trait]
    impl AttributeProvider for StaticCharacterProvider {
        fn namespace(&self) -> &str {
            "character"
        }

        async fn resolve_subject(&self, _id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError> {
            let mut attrs = HashMap::new();
            attrs.insert("role".to_string(), AttrValue::from("builder"));
            Ok(attrs)
        }

        async fn resolve_resource(&self, _id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError> {
            Ok(HashMap::new())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AttributeProvider for FailingProvider {
        fn namespace(&self) -> &str {
            "object"
        }

        async fn resolve_subject(&self, _id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError> {
            Err(ProviderError::new("object", "backend unreachable"))
        }

        async fn resolve_resource(&self, _id: &EntityRef) -> Result<HashMap<String, AttrValue>, ProviderError> {
            Err(ProviderError::new("object", "backend unreachable"))
        }
    }

    #[tokio::test]
    async fn resolves_registered_provider() {
        let mut resolver = AttributeResolver::new();
        resolver.register(EntityType::Character, Arc::new(StaticCharacterProvider));
        let bundle = resolver.resolve_subject(&EntityRef::character("01ABC")).await.unwrap();
        assert_eq!(bundle.get("character", "role").as_str(), Some("builder"));
    }

    #[tokio::test]
    async fn missing_provider_yields_empty_bundle() {
        let resolver = AttributeResolver::new();
        let bundle = resolver.resolve_subject(&EntityRef::location("01ABC")).await.unwrap();
        assert!(bundle.get("location", "anything").is_null());
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let mut resolver = AttributeResolver::new();
        resolver.register(EntityType::Object, Arc::new(FailingProvider));
        let result = resolver.resolve_subject(&EntityRef::object("01ABC")).await;
        assert!(result.is_err());
    }
}
