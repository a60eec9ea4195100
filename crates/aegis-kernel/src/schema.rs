use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attr_value::AttrType;
use crate::error::KernelError;

/// A single attribute declaration within a namespace: a name and its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrDecl {
    pub name: String,
    pub attr_type: AttrType,
}

/// The set of attribute declarations for one namespace
/// (`character`, `location`, `scene`, `object`, `exit`, `session`, `env`, …).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceSchema {
    attrs: HashMap<String, AttrType>,
}

impl NamespaceSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, name: impl Into<String>, attr_type: AttrType) -> Self {
        self.attrs.insert(name.into(), attr_type);
        self
    }

    pub fn attr_type(&self, name: &str) -> Option<AttrType> {
        self.attrs.get(name).copied()
    }

    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }
}

/// The full attribute schema: a mapping from namespace name to
/// `NamespaceSchema`, registered once at startup and then frozen.
///
/// Register-then-freeze: every namespace must be declared before the
/// first policy compiles, and nothing can be added once evaluation
/// starts reading against it.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    namespaces: HashMap<String, NamespaceSchema>,
    frozen: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a namespace. Fails if the namespace already exists or the
    /// registry has been frozen.
    pub fn register(
        &mut self,
        namespace: impl Into<String>,
        schema: NamespaceSchema,
    ) -> Result<(), KernelError> {
        if self.frozen {
            return Err(KernelError::SchemaFrozen);
        }
        let namespace = namespace.into();
        if self.namespaces.contains_key(&namespace) {
            return Err(KernelError::DuplicateNamespace(namespace));
        }
        self.namespaces.insert(namespace, schema);
        Ok(())
    }

    /// Freezes the registry. After this call, `register` always errors.
    ///
    /// Calling `freeze` twice is a programmer error — like an empty
    /// subject id in `EntityRef::new`, it signals startup wiring went
    /// wrong rather than a runtime condition, so it panics instead of
    /// returning a recoverable error (see DESIGN.md for the Open Question
    /// this settles).
    pub fn freeze(&mut self) {
        if self.frozen {
            panic!("SchemaRegistry::freeze called twice");
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceSchema> {
        self.namespaces.get(name)
    }

    /// Looks up the declared type of `namespace.attr`, used by the DSL
    /// compiler to reject unknown attribute references at compile time
    /// rather than at evaluation time.
    pub fn attr_type(&self, namespace: &str, attr: &str) -> Option<AttrType> {
        self.namespaces.get(namespace)?.attr_type(attr)
    }
}
