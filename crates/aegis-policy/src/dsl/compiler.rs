//! Ties the lexer, parser, and schema together: `compile_policy_text`
//! turns raw DSL source into a `CompiledPolicy`, rejecting unknown
//! attribute references and unknown target types before the policy ever
//! reaches the cache.

use aegis_kernel::{AttrType, EntityType, SchemaRegistry};

use super::ast::{AttrScope, Expr, PolicyAst};
use super::lexer::lex;
use super::parser::parse;
use crate::error::PolicyError;
use crate::snapshot::CompiledPolicy;

pub fn compile_policy_text(
    name: &str,
    id: &str,
    src: &str,
    schema: &SchemaRegistry,
) -> Result<CompiledPolicy, PolicyError> {
    let tokens = lex(src)?;
    let mut asts = parse(&tokens)?;
    if asts.len() != 1 {
        return Err(PolicyError::compile(
            1,
            1,
            format!("expected exactly one policy statement, found {}", asts.len()),
        ));
    }
    let ast = asts.remove(0);
    compile_ast(name, id, ast, schema)
}

fn compile_ast(
    name: &str,
    id: &str,
    ast: PolicyAst,
    schema: &SchemaRegistry,
) -> Result<CompiledPolicy, PolicyError> {
    if let Some(ty) = &ast.target.principal_type {
        validate_entity_type(ty, 1, 1)?;
    }
    if let Some(ty) = &ast.target.resource_type {
        validate_entity_type(ty, 1, 1)?;
    }
    if let Some(cond) = &ast.condition {
        validate_expr(cond, schema)?;
    }

    Ok(CompiledPolicy {
        id: id.to_string(),
        name: name.to_string(),
        effect: ast.effect,
        target: ast.target,
        condition: ast.condition,
    })
}

fn validate_entity_type(ty: &str, line: u32, col: u32) -> Result<(), PolicyError> {
    if EntityType::from_name(ty).is_some() {
        Ok(())
    } else {
        Err(PolicyError::compile(
            line,
            col,
            format!("unknown entity type '{ty}' in target clause"),
        ))
    }
}

fn validate_expr(expr: &Expr, schema: &SchemaRegistry) -> Result<(), PolicyError> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::AttrRef {
            scope,
            namespace,
            attr,
            line,
            col,
        } => {
            let ns: &str = match scope {
                AttrScope::Context => "env",
                _ => namespace.as_deref().unwrap_or(""),
            };
            match schema.attr_type(ns, attr) {
                Some(_attr_type) => Ok(()),
                None => Err(PolicyError::unknown_attribute(ns, attr, *line, *col)),
            }
        }
        Expr::Not(inner) => validate_expr(inner, schema),
        Expr::And(l, r) | Expr::Or(l, r) => {
            validate_expr(l, schema)?;
            validate_expr(r, schema)
        }
        Expr::Cmp(l, _, r) => {
            validate_expr(l, schema)?;
            validate_expr(r, schema)
        }
        Expr::Call(_, args) => {
            for a in args {
                validate_expr(a, schema)?;
            }
            Ok(())
        }
    }
}
