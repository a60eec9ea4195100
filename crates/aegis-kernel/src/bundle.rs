use std::collections::HashMap;

use crate::attr_value::AttrValue;

/// Per-namespace attributes resolved for one subject or resource within a
/// single request.
///
/// Single-assignment: once a provider has answered for a namespace its
/// results are frozen for the life of the request. `set` panics on a
/// second call for the same namespace — an internal invariant of the
/// attribute resolver, never reachable from untrusted input.
#[derive(Debug, Clone, Default)]
pub struct AttributeBundle {
    namespaces: HashMap<String, HashMap<String, AttrValue>>,
}

impl AttributeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, namespace: impl Into<String>, attrs: HashMap<String, AttrValue>) {
        let namespace = namespace.into();
        if self.namespaces.contains_key(&namespace) {
            panic!("AttributeBundle::set called twice for namespace '{namespace}'");
        }
        self.namespaces.insert(namespace, attrs);
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Looks up `namespace.attr`. Returns `AttrValue::Null` for an
    /// unresolved namespace or a namespace that resolved but didn't
    /// produce this attribute — both are "no data", not an error.
    pub fn get(&self, namespace: &str, attr: &str) -> AttrValue {
        self.namespaces
            .get(namespace)
            .and_then(|m| m.get(attr))
            .cloned()
            .unwrap_or(AttrValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_namespace_yields_null() {
        let bundle = AttributeBundle::new();
        assert!(bundle.get("character", "role").is_null());
    }

    #[test]
    fn resolved_namespace_returns_value() {
        let mut bundle = AttributeBundle::new();
        let mut attrs = HashMap::new();
        attrs.insert("role".to_string(), AttrValue::from("admin"));
        bundle.set("character", attrs);
        assert_eq!(bundle.get("character", "role").as_str(), Some("admin"));
        assert!(bundle.get("character", "missing").is_null());
    }

    #[test]
    #[should_panic]
    fn double_set_panics() {
        let mut bundle = AttributeBundle::new();
        bundle.set("character", HashMap::new());
        bundle.set("character", HashMap::new());
    }
}
