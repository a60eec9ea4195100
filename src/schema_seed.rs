//! The attribute schema and seed policy set installed at first boot.
//! A real deployment would load both from config; this is the fixed
//! starting point used by the demo loop and the end-to-end tests.

use aegis_kernel::{AttrType, NamespaceSchema, SchemaRegistry};
use aegis_policy::doc::Effect;
use aegis_policy::PolicyDoc;

pub fn build_schema() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            "character",
            NamespaceSchema::new()
                .declare("role", AttrType::String)
                .declare("id", AttrType::String),
        )
        .expect("character namespace registers exactly once at startup");
    registry
        .register("object", NamespaceSchema::new().declare("locked", AttrType::Bool))
        .expect("object namespace registers exactly once at startup");
    registry
        .register(
            "property",
            NamespaceSchema::new()
                .declare("sensitivity", AttrType::String)
                .declare("path", AttrType::String),
        )
        .expect("property namespace registers exactly once at startup");
    registry.freeze();
    registry
}

pub fn seed_policies() -> Vec<PolicyDoc> {
    vec![
        PolicyDoc::new_seed(
            "seed:admin-wildcard",
            r#"permit(principal, action, resource) when { principal.character.role == "admin" };"#,
            Effect::Permit,
            1,
            "admins may perform any action",
        ),
        PolicyDoc::new_seed(
            "seed:player-self-access",
            r#"permit(principal is character, action, resource is character)
               when { resource.character.id == principal.character.id };"#,
            Effect::Permit,
            1,
            "a character may always act on itself",
        ),
    ]
}
