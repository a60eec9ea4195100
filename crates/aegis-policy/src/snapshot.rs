use crate::dsl::ast::{ActionSet, Effect, Expr, Target};

/// The output of compiling one `PolicyDoc`: a target predicate plus a
/// condition tree, both already validated against the schema. Immutable
/// once compiled.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub id: String,
    pub name: String,
    pub effect: Effect,
    pub target: Target,
    pub condition: Option<Expr>,
}

impl CompiledPolicy {
    pub fn target_matches(&self, principal_type: &str, action: &str, resource_type: &str) -> bool {
        if let Some(pt) = &self.target.principal_type {
            if pt != principal_type {
                return false;
            }
        }
        if let Some(rt) = &self.target.resource_type {
            if rt != resource_type {
                return false;
            }
        }
        matches!(&self.target.actions, ActionSet::Any) || self.target.actions.matches(action)
    }
}

/// An ordered, immutable sequence of compiled policies, installed
/// atomically by the cache.
#[derive(Debug, Clone)]
pub struct Snapshot {
    policies: Vec<CompiledPolicy>,
    built_at_unix: i64,
    source_count: usize,
    generation: u64,
}

impl Snapshot {
    pub fn new(policies: Vec<CompiledPolicy>, built_at_unix: i64, source_count: usize, generation: u64) -> Self {
        Snapshot {
            policies,
            built_at_unix,
            source_count,
            generation,
        }
    }

    /// The snapshot installed before any successful reload: empty,
    /// generation 0, so `PolicyCache::snapshot()` never returns null.
    pub fn empty() -> Self {
        Snapshot {
            policies: Vec::new(),
            built_at_unix: 0,
            source_count: 0,
            generation: 0,
        }
    }

    pub fn policies(&self) -> &[CompiledPolicy] {
        &self.policies
    }

    pub fn built_at_unix(&self) -> i64 {
        self.built_at_unix
    }

    pub fn source_count(&self) -> usize {
        self.source_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.generation == 0
    }
}
