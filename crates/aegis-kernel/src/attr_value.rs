use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A typed attribute value.
///
/// Types are declared up front in a `NamespaceSchema`; a mismatch between
/// the declared type and what a provider actually returns fails the
/// condition that reads it rather than the whole request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    String(String),
    Int(i64),
    Bool(bool),
    StringSet(BTreeSet<String>),
    StringList(Vec<String>),
    Null,
}

/// The declared type of an attribute, independent of any particular value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    String,
    Int,
    Bool,
    StringSet,
    StringList,
}

impl AttrValue {
    pub fn type_of(&self) -> Option<AttrType> {
        match self {
            AttrValue::String(_) => Some(AttrType::String),
            AttrValue::Int(_) => Some(AttrType::Int),
            AttrValue::Bool(_) => Some(AttrType::Bool),
            AttrValue::StringSet(_) => Some(AttrType::StringSet),
            AttrValue::StringList(_) => Some(AttrType::StringList),
            AttrValue::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            AttrValue::StringSet(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            AttrValue::StringList(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}
