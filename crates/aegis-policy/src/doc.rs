use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// `permit` or `forbid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Permit,
    Forbid,
}

impl From<crate::dsl::ast::Effect> for Effect {
    fn from(e: crate::dsl::ast::Effect) -> Self {
        match e {
            crate::dsl::ast::Effect::Permit => Effect::Permit,
            crate::dsl::ast::Effect::Forbid => Effect::Forbid,
        }
    }
}

/// A persisted policy document. Owned by the store; the cache only ever
/// sees the subset of these that are enabled, compiled into a
/// `CompiledPolicy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDoc {
    pub id: String,
    pub name: String,
    pub dsl_text: String,
    pub effect: Effect,
    pub enabled: bool,
    pub seed_version: u32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyDoc {
    pub fn new_admin(name: impl Into<String>, dsl_text: impl Into<String>, effect: Effect) -> Self {
        let now = Utc::now();
        PolicyDoc {
            id: Ulid::new().to_string(),
            name: name.into(),
            dsl_text: dsl_text.into(),
            effect,
            enabled: true,
            seed_version: 0,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_seed(
        name: impl Into<String>,
        dsl_text: impl Into<String>,
        effect: Effect,
        seed_version: u32,
        description: impl Into<String>,
    ) -> Self {
        assert!(seed_version >= 1, "seed policies must have seed_version >= 1");
        let now = Utc::now();
        PolicyDoc {
            id: Ulid::new().to_string(),
            name: name.into(),
            dsl_text: dsl_text.into(),
            effect,
            enabled: true,
            seed_version,
            description: Some(description.into()),
            created_at: now,
            updated_at: now,
        }
    }
}
