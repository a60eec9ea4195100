use std::fmt;

use crate::error::KernelError;

/// The closed set of known entity-reference type prefixes.
///
/// Adding a new prefix is a schema change, not a runtime registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Character,
    Location,
    Scene,
    Object,
    Exit,
    Command,
    Plugin,
    Stream,
    Property,
    Session,
    System,
}

impl EntityType {
    fn as_str(self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Location => "location",
            EntityType::Scene => "scene",
            EntityType::Object => "object",
            EntityType::Exit => "exit",
            EntityType::Command => "command",
            EntityType::Plugin => "plugin",
            EntityType::Stream => "stream",
            EntityType::Property => "property",
            EntityType::Session => "session",
            EntityType::System => "system",
        }
    }

    /// Looks up a type by its lowercase prefix name (`"character"`, …).
    /// Used by the DSL compiler to validate `is <type>` target clauses
    /// against the same closed set `EntityRef::parse` uses.
    pub fn from_name(s: &str) -> Option<Self> {
        Self::parse_prefix(s)
    }

    fn parse_prefix(s: &str) -> Option<Self> {
        Some(match s {
            "character" => EntityType::Character,
            "location" => EntityType::Location,
            "scene" => EntityType::Scene,
            "object" => EntityType::Object,
            "exit" => EntityType::Exit,
            "command" => EntityType::Command,
            "plugin" => EntityType::Plugin,
            "stream" => EntityType::Stream,
            "property" => EntityType::Property,
            "session" => EntityType::Session,
            "system" => EntityType::System,
            _ => return None,
        })
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed reference to a subject or resource: `<type>:<id>`.
///
/// The id may itself contain `:` (stream references embed another
/// `EntityRef`-shaped string, e.g. `stream:location:01XYZ`), so parsing
/// splits only on the first colon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    kind: EntityType,
    id: String,
}

impl EntityRef {
    /// The synthetic `system` subject: empty id, bypasses policy evaluation.
    pub fn system() -> Self {
        EntityRef {
            kind: EntityType::System,
            id: String::new(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == EntityType::System
    }

    pub fn kind(&self) -> EntityType {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Constructs an `EntityRef` of a known type.
    ///
    /// # Panics
    ///
    /// Panics if `id` is empty and `kind` is not `System`. An empty subject
    /// id would silently bypass authorization downstream, so this is
    /// treated as a programmer error rather than a recoverable one — the
    /// one place in this crate a panic is the documented contract.
    pub fn new(kind: EntityType, id: impl Into<String>) -> Self {
        let id = id.into();
        if kind != EntityType::System && id.is_empty() {
            panic!("EntityRef::new: empty id for non-system type {kind}");
        }
        EntityRef { kind, id }
    }

    pub fn character(id: impl Into<String>) -> Self {
        Self::new(EntityType::Character, id)
    }

    pub fn location(id: impl Into<String>) -> Self {
        Self::new(EntityType::Location, id)
    }

    pub fn scene(id: impl Into<String>) -> Self {
        Self::new(EntityType::Scene, id)
    }

    pub fn object(id: impl Into<String>) -> Self {
        Self::new(EntityType::Object, id)
    }

    pub fn exit(id: impl Into<String>) -> Self {
        Self::new(EntityType::Exit, id)
    }

    pub fn command(id: impl Into<String>) -> Self {
        Self::new(EntityType::Command, id)
    }

    pub fn plugin(id: impl Into<String>) -> Self {
        Self::new(EntityType::Plugin, id)
    }

    pub fn stream(id: impl Into<String>) -> Self {
        Self::new(EntityType::Stream, id)
    }

    pub fn property(id: impl Into<String>) -> Self {
        Self::new(EntityType::Property, id)
    }

    pub fn session(id: impl Into<String>) -> Self {
        Self::new(EntityType::Session, id)
    }

    /// Parses `<type>:<id>` into a typed `EntityRef`.
    ///
    /// Rejects empty ids (except `system`) and unknown type prefixes with
    /// `KernelError::InvalidEntityRef`.
    pub fn parse(s: &str) -> Result<Self, KernelError> {
        let (prefix, rest) = s.split_once(':').ok_or_else(|| {
            KernelError::InvalidEntityRef(s.to_string(), "missing ':' separator".to_string())
        })?;

        let kind = EntityType::parse_prefix(prefix).ok_or_else(|| {
            KernelError::InvalidEntityRef(s.to_string(), format!("unknown type prefix '{prefix}'"))
        })?;

        if kind != EntityType::System && rest.is_empty() {
            return Err(KernelError::InvalidEntityRef(
                s.to_string(),
                "id must not be empty".to_string(),
            ));
        }
        if kind == EntityType::System && !rest.is_empty() {
            return Err(KernelError::InvalidEntityRef(
                s.to_string(),
                "system sentinel must have an empty id".to_string(),
            ));
        }

        Ok(EntityRef {
            kind,
            id: rest.to_string(),
        })
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
