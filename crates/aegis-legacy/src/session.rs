//! The session subject resolver. Maps an opaque `session:<id>` reference
//! to the `character:<ulid>` subject the engine actually evaluates
//! against. Pluggable — the engine never touches the session store
//! directly.

use async_trait::async_trait;

use aegis_kernel::EntityRef;

use crate::error::SessionError;

#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve_session(&self, session_id: &str) -> Result<EntityRef, SessionError>;
}

/// Resolves a subject reference, expanding `session:*` to the character it
/// currently maps to. Any other entity type passes through unchanged.
pub async fn resolve_subject(
    resolver: &dyn SessionResolver,
    subject: &EntityRef,
) -> Result<EntityRef, SessionError> {
    if subject.kind() != aegis_kernel::EntityType::Session {
        return Ok(subject.clone());
    }
    resolver.resolve_session(subject.id()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapResolver(Mutex<HashMap<String, EntityRef>>);

    #[async_trait]
    impl SessionResolver for MapResolver {
        async fn resolve_session(&self, session_id: &str) -> Result<EntityRef, SessionError> {
            self.0
                .lock()
                .unwrap()
                .get(session_id)
                .cloned()
                .ok_or_else(|| SessionError::Invalid(session_id.to_string()))
        }
    }

    #[tokio::test]
    async fn resolves_known_session_to_character() {
        let mut map = HashMap::new();
        map.insert("tok-1".to_string(), EntityRef::character("01ABC"));
        let resolver = MapResolver(Mutex::new(map));
        let subject = EntityRef::session("tok-1");
        let resolved = resolve_subject(&resolver, &subject).await.unwrap();
        assert_eq!(resolved, EntityRef::character("01ABC"));
    }

    #[tokio::test]
    async fn unknown_session_is_invalid() {
        let resolver = MapResolver(Mutex::new(HashMap::new()));
        let subject = EntityRef::session("missing");
        assert!(matches!(
            resolve_subject(&resolver, &subject).await,
            Err(SessionError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn non_session_subject_passes_through() {
        let resolver = MapResolver(Mutex::new(HashMap::new()));
        let subject = EntityRef::character("01ABC");
        let resolved = resolve_subject(&resolver, &subject).await.unwrap();
        assert_eq!(resolved, subject);
    }
}
