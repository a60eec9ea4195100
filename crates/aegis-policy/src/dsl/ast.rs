//! The compiled-policy AST: a `Target` (the fast pre-filter) plus a boolean
//! `Condition` expression tree.

use std::collections::BTreeSet;

/// Which side of the request an attribute reference reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrScope {
    Principal,
    Resource,
    Context,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Has,
    StartsWith,
    Length,
}

/// A node in the condition expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    AttrRef {
        scope: AttrScope,
        /// `None` only for `Context` references (`context.<attr>` has no
        /// namespace segment in the DSL — it resolves against the `env`
        /// namespace internally).
        namespace: Option<String>,
        attr: String,
        line: u32,
        col: u32,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(Box<Expr>, CmpOp, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Permit,
    Forbid,
}

/// The action clause of a target: either "any action" or a closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSet {
    Any,
    Set(BTreeSet<String>),
}

impl ActionSet {
    pub fn matches(&self, action: &str) -> bool {
        match self {
            ActionSet::Any => true,
            ActionSet::Set(set) => set.contains(action),
        }
    }
}

/// The principal/action/resource gating clause of a policy, distinct from
/// its condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub principal_type: Option<String>,
    pub actions: ActionSet,
    pub resource_type: Option<String>,
}

/// A fully parsed (but not yet schema-validated) policy statement.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyAst {
    pub effect: Effect,
    pub target: Target,
    pub condition: Option<Expr>,
}
