//! Runtime evaluation of a compiled condition against the attribute
//! bundles resolved for one request.
//!
//! A runtime type mismatch, unknown-attribute lookup, or function misuse
//! makes the *condition* false for that policy — it never aborts the
//! whole evaluation. Such failures are logged at `debug!` and otherwise
//! swallowed: a translation hiccup for one policy is a per-policy
//! concern, not a fatal one.

use std::collections::BTreeSet;

use aegis_kernel::{AttrValue, AttributeBundle};
use tracing::debug;

use super::ast::{AttrScope, CmpOp, Expr, Func, Literal};

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    StringSet(BTreeSet<String>),
    StringList(Vec<String>),
    Null,
}

impl From<AttrValue> for Value {
    fn from(v: AttrValue) -> Self {
        match v {
            AttrValue::String(s) => Value::Str(s),
            AttrValue::Int(i) => Value::Int(i),
            AttrValue::Bool(b) => Value::Bool(b),
            AttrValue::StringSet(s) => Value::StringSet(s),
            AttrValue::StringList(l) => Value::StringList(l),
            AttrValue::Null => Value::Null,
        }
    }
}

/// What one failed runtime evaluation step looks like — never escapes this
/// module as an error type callers propagate; it only ever collapses to
/// `false` one level up in `eval_bool`.
struct EvalTypeError(String);

fn eval_value(
    expr: &Expr,
    principal: &AttributeBundle,
    resource: &AttributeBundle,
    env: &AttributeBundle,
) -> Result<Value, EvalTypeError> {
    match expr {
        Expr::Literal(Literal::Str(s)) => Ok(Value::Str(s.clone())),
        Expr::Literal(Literal::Int(i)) => Ok(Value::Int(*i)),
        Expr::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
        Expr::Literal(Literal::List(items)) => Ok(Value::StringList(items.clone())),
        Expr::AttrRef {
            scope,
            namespace,
            attr,
            ..
        } => {
            let bundle = match scope {
                AttrScope::Principal => principal,
                AttrScope::Resource => resource,
                AttrScope::Context => env,
            };
            let ns = match scope {
                AttrScope::Context => "env",
                _ => namespace.as_deref().unwrap_or(""),
            };
            Ok(Value::from(bundle.get(ns, attr)))
        }
        Expr::Not(_) | Expr::And(_, _) | Expr::Or(_, _) | Expr::Cmp(_, _, _) => {
            eval_bool(expr, principal, resource, env)
                .map(Value::Bool)
                .map_err(|()| EvalTypeError("boolean sub-expression failed".to_string()))
        }
        Expr::Call(func, args) => eval_call(*func, args, principal, resource, env),
    }
}

fn eval_call(
    func: Func,
    args: &[Expr],
    principal: &AttributeBundle,
    resource: &AttributeBundle,
    env: &AttributeBundle,
) -> Result<Value, EvalTypeError> {
    match func {
        Func::Has => {
            if args.len() != 2 {
                return Err(EvalTypeError("has() takes exactly 2 arguments".to_string()));
            }
            let collection = eval_value(&args[0], principal, resource, env)?;
            let needle = eval_value(&args[1], principal, resource, env)?;
            let found = match (&collection, &needle) {
                (Value::StringSet(set), Value::Str(s)) => set.contains(s),
                (Value::StringList(list), Value::Str(s)) => list.iter().any(|x| x == s),
                _ => return Err(EvalTypeError("has() expects a collection and a string".to_string())),
            };
            Ok(Value::Bool(found))
        }
        Func::StartsWith => {
            if args.len() != 2 {
                return Err(EvalTypeError(
                    "startswith() takes exactly 2 arguments".to_string(),
                ));
            }
            let s = eval_value(&args[0], principal, resource, env)?;
            let prefix = eval_value(&args[1], principal, resource, env)?;
            match (s, prefix) {
                (Value::Str(s), Value::Str(p)) => Ok(Value::Bool(s.starts_with(&p))),
                _ => Err(EvalTypeError("startswith() expects two strings".to_string())),
            }
        }
        Func::Length => {
            if args.len() != 1 {
                return Err(EvalTypeError("length() takes exactly 1 argument".to_string()));
            }
            let v = eval_value(&args[0], principal, resource, env)?;
            let len = match v {
                Value::Str(s) => s.chars().count() as i64,
                Value::StringList(l) => l.len() as i64,
                Value::StringSet(s) => s.len() as i64,
                _ => return Err(EvalTypeError("length() expects a string or collection".to_string())),
            };
            Ok(Value::Int(len))
        }
    }
}

fn eval_cmp(lhs: &Value, op: CmpOp, rhs: &Value) -> Result<bool, EvalTypeError> {
    use CmpOp::*;
    match op {
        Eq => Ok(lhs == rhs),
        Ne => Ok(lhs != rhs),
        Lt | Le | Gt | Ge => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(match op {
                Lt => a < b,
                Le => a <= b,
                Gt => a > b,
                Ge => a >= b,
                _ => unreachable!(),
            }),
            (Value::Str(a), Value::Str(b)) => Ok(match op {
                Lt => a < b,
                Le => a <= b,
                Gt => a > b,
                Ge => a >= b,
                _ => unreachable!(),
            }),
            _ => Err(EvalTypeError(format!(
                "ordering operator requires two comparable operands, got {lhs:?} and {rhs:?}"
            ))),
        },
        In => match rhs {
            Value::StringSet(set) => match lhs {
                Value::Str(s) => Ok(set.contains(s)),
                _ => Err(EvalTypeError("'in' left-hand side must be a string".to_string())),
            },
            Value::StringList(list) => match lhs {
                Value::Str(s) => Ok(list.iter().any(|x| x == s)),
                _ => Err(EvalTypeError("'in' left-hand side must be a string".to_string())),
            },
            _ => Err(EvalTypeError("'in' right-hand side must be a collection".to_string())),
        },
        NotIn => eval_cmp(lhs, In, rhs).map(|b| !b),
        Contains => match lhs {
            Value::StringSet(set) => match rhs {
                Value::Str(s) => Ok(set.contains(s)),
                _ => Err(EvalTypeError("'contains' right-hand side must be a string".to_string())),
            },
            Value::StringList(list) => match rhs {
                Value::Str(s) => Ok(list.iter().any(|x| x == s)),
                _ => Err(EvalTypeError("'contains' right-hand side must be a string".to_string())),
            },
            Value::Str(s) => match rhs {
                Value::Str(sub) => Ok(s.contains(sub.as_str())),
                _ => Err(EvalTypeError("'contains' right-hand side must be a string".to_string())),
            },
            _ => Err(EvalTypeError("'contains' left-hand side must be a collection or string".to_string())),
        },
    }
}

fn eval_bool_inner(
    expr: &Expr,
    principal: &AttributeBundle,
    resource: &AttributeBundle,
    env: &AttributeBundle,
) -> Result<bool, EvalTypeError> {
    match expr {
        Expr::Literal(Literal::Bool(b)) => Ok(*b),
        Expr::Not(inner) => Ok(!eval_bool_inner(inner, principal, resource, env)?),
        Expr::And(l, r) => {
            Ok(eval_bool_inner(l, principal, resource, env)? && eval_bool_inner(r, principal, resource, env)?)
        }
        Expr::Or(l, r) => {
            Ok(eval_bool_inner(l, principal, resource, env)? || eval_bool_inner(r, principal, resource, env)?)
        }
        Expr::Cmp(l, op, r) => {
            let lv = eval_value(l, principal, resource, env)?;
            let rv = eval_value(r, principal, resource, env)?;
            eval_cmp(&lv, *op, &rv)
        }
        Expr::Call(Func::Has, _) | Expr::AttrRef { .. } => match eval_value(expr, principal, resource, env)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalTypeError(format!("expected boolean, found {other:?}"))),
        },
        other => Err(EvalTypeError(format!("expression is not a boolean: {other:?}"))),
    }
}

/// Evaluates a condition to a plain `bool`. Any internal type error is
/// logged and folded into `false` — never propagated.
pub fn eval_bool(
    expr: &Expr,
    principal: &AttributeBundle,
    resource: &AttributeBundle,
    env: &AttributeBundle,
) -> Result<bool, ()> {
    match eval_bool_inner(expr, principal, resource, env) {
        Ok(b) => Ok(b),
        Err(EvalTypeError(msg)) => {
            debug!("condition evaluation type error: {msg}");
            Ok(false)
        }
    }
}
