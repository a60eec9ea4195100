//! The legacy adapter. Accepts the old `Check(subject, action,
//! resource) -> bool` shape used before the DSL engine existed, and maps
//! it onto the capability registry without touching the evaluation engine
//! at all — callers migrate one at a time.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use aegis_kernel::{EntityRef, EntityType};

use crate::glob;

/// Supplies the subject's current location for `$here` expansion. An
/// external collaborator on purpose — the legacy adapter has no notion of
/// "where a character is", only the plugin/caller does.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn current_location(&self, subject: &EntityRef) -> Option<EntityRef>;
}

/// Per-plugin map of allowed glob patterns, e.g. `"echo" -> ["command:*"]`.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: RwLock<HashMap<String, Vec<String>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, plugin_id: impl Into<String>, pattern: impl Into<String>) {
        self.capabilities
            .write()
            .unwrap()
            .entry(plugin_id.into())
            .or_default()
            .push(pattern.into());
    }

    fn patterns_for(&self, plugin_id: &str) -> Vec<String> {
        self.capabilities
            .read()
            .unwrap()
            .get(plugin_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Normalizes the legacy `char:`/`character:` prefix split: both type
/// prefixes name the same subject during migration.
fn normalize_subject(subject: &str) -> String {
    if let Some(rest) = subject.strip_prefix("char:") {
        format!("character:{rest}")
    } else {
        subject.to_string()
    }
}

pub struct LegacyAdapter {
    registry: CapabilityRegistry,
    locations: Box<dyn LocationResolver>,
}

impl LegacyAdapter {
    pub fn new(registry: CapabilityRegistry, locations: Box<dyn LocationResolver>) -> Self {
        LegacyAdapter { registry, locations }
    }

    /// The legacy boolean check. `resource` is expected in `plugin:<id>`
    /// shape for capability checks; anything else always denies, since the
    /// legacy adapter only ever bridged plugin permission checks.
    pub async fn check(&self, subject: &str, action: &str, resource: &str) -> bool {
        let subject = normalize_subject(subject);
        let Ok(subject_ref) = EntityRef::parse(&subject) else {
            warn!(subject, "legacy check: unparseable subject");
            return false;
        };
        let Ok(resource_ref) = EntityRef::parse(resource) else {
            warn!(resource, "legacy check: unparseable resource");
            return false;
        };
        if resource_ref.kind() != EntityType::Plugin {
            return false;
        }

        let here = self.locations.current_location(&subject_ref).await;
        let here_id = here.as_ref().map(|r| r.to_string());

        let patterns = self.registry.patterns_for(resource_ref.id());
        patterns
            .iter()
            .any(|pattern| glob::matches(pattern, action, subject_ref.id(), here_id.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLocation(Option<EntityRef>);

    #[async_trait]
    impl LocationResolver for FixedLocation {
        async fn current_location(&self, _subject: &EntityRef) -> Option<EntityRef> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn grants_exact_action() {
        let registry = CapabilityRegistry::new();
        registry.grant("echo", "speak");
        let adapter = LegacyAdapter::new(registry, Box::new(FixedLocation(None)));
        assert!(adapter.check("character:01ABC", "speak", "plugin:echo").await);
        assert!(!adapter.check("character:01ABC", "shout", "plugin:echo").await);
    }

    #[tokio::test]
    async fn char_and_character_prefixes_are_equivalent() {
        let registry = CapabilityRegistry::new();
        registry.grant("echo", "speak");
        let adapter = LegacyAdapter::new(registry, Box::new(FixedLocation(None)));
        assert!(adapter.check("char:01ABC", "speak", "plugin:echo").await);
    }

    #[tokio::test]
    async fn wildcard_pattern_grants_any_action() {
        let registry = CapabilityRegistry::new();
        registry.grant("builder-tools", "*");
        let adapter = LegacyAdapter::new(registry, Box::new(FixedLocation(None)));
        assert!(adapter.check("character:01ABC", "anything", "plugin:builder-tools").await);
    }

    #[tokio::test]
    async fn here_token_resolves_via_location_resolver() {
        let registry = CapabilityRegistry::new();
        registry.grant("nav", "goto:$here:*");
        let here = EntityRef::location("01LOC");
        let adapter = LegacyAdapter::new(registry, Box::new(FixedLocation(Some(here))));
        assert!(adapter.check("character:01ABC", "goto:location:01LOC:north", "plugin:nav").await);
    }

    #[tokio::test]
    async fn non_plugin_resource_always_denies() {
        let registry = CapabilityRegistry::new();
        let adapter = LegacyAdapter::new(registry, Box::new(FixedLocation(None)));
        assert!(!adapter.check("character:01ABC", "look", "location:01XYZ").await);
    }
}
