//! Recursive-descent parser over the token stream produced by `lexer`.
//!
//! Grammar:
//!
//! ```text
//! policy     := effect '(' target ')' ('when' '{' or_expr '}')? ';'
//! effect     := 'permit' | 'forbid'
//! target     := principal_clause ',' action_clause ',' resource_clause
//! or_expr    := and_expr ('||' and_expr)*
//! and_expr   := unary ('&&' unary)*
//! unary      := '!' unary | comparison
//! comparison := primary (cmp_op primary)?
//! primary    := literal | attr_ref | func_call | '(' or_expr ')'
//! ```

use std::collections::BTreeSet;

use super::ast::{ActionSet, AttrScope, CmpOp, Effect, Expr, Func, Literal, PolicyAst, Target};
use super::lexer::{Spanned, Token};
use crate::error::PolicyError;

pub struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Spanned {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Spanned {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> PolicyError {
        let at = self.peek();
        PolicyError::compile(at.line, at.col, message)
    }

    fn expect_word(&mut self, word: &str) -> Result<(), PolicyError> {
        match &self.peek().token {
            Token::Word(w) if w == word => {
                self.advance();
                Ok(())
            }
            _ => Err(self.err(format!("expected '{word}'"))),
        }
    }

    fn expect_token(&mut self, tok: Token) -> Result<(), PolicyError> {
        if self.peek().token == tok {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {tok:?}, found {:?}", self.peek().token)))
        }
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(&self.peek().token, Token::Word(w) if w == word)
    }

    fn take_word(&mut self) -> Result<String, PolicyError> {
        match self.advance().token {
            Token::Word(w) => Ok(w),
            other => Err(PolicyError::compile(
                self.peek().line,
                self.peek().col,
                format!("expected identifier, found {other:?}"),
            )),
        }
    }

    /// Parses every `effect(...) [when {...}];` statement in the source.
    pub fn parse_policies(&mut self) -> Result<Vec<PolicyAst>, PolicyError> {
        let mut out = Vec::new();
        while self.peek().token != Token::Eof {
            out.push(self.parse_policy()?);
        }
        Ok(out)
    }

    fn parse_policy(&mut self) -> Result<PolicyAst, PolicyError> {
        let effect = match self.take_word()?.as_str() {
            "permit" => Effect::Permit,
            "forbid" => Effect::Forbid,
            other => {
                return Err(self.err(format!(
                    "expected 'permit' or 'forbid', found '{other}'"
                )));
            }
        };

        self.expect_token(Token::LParen)?;
        let principal_type = self.parse_principal_or_resource_clause("principal")?;
        self.expect_token(Token::Comma)?;
        let actions = self.parse_action_clause()?;
        self.expect_token(Token::Comma)?;
        let resource_type = self.parse_principal_or_resource_clause("resource")?;
        self.expect_token(Token::RParen)?;

        let condition = if self.is_word("when") {
            self.advance();
            self.expect_token(Token::LBrace)?;
            let cond = self.parse_or_expr()?;
            self.expect_token(Token::RBrace)?;
            Some(cond)
        } else {
            None
        };

        self.expect_token(Token::Semicolon)?;

        Ok(PolicyAst {
            effect,
            target: Target {
                principal_type,
                actions,
                resource_type,
            },
            condition,
        })
    }

    fn parse_principal_or_resource_clause(
        &mut self,
        keyword: &str,
    ) -> Result<Option<String>, PolicyError> {
        self.expect_word(keyword)?;
        if self.is_word("is") {
            self.advance();
            let ty = self.take_word()?;
            Ok(Some(ty))
        } else {
            Ok(None)
        }
    }

    fn parse_action_clause(&mut self) -> Result<ActionSet, PolicyError> {
        self.expect_word("action")?;
        if self.is_word("in") {
            self.advance();
            self.expect_token(Token::LBracket)?;
            let mut set = BTreeSet::new();
            if self.peek().token != Token::RBracket {
                loop {
                    let s = self.parse_string_literal()?;
                    set.insert(s);
                    if self.peek().token == Token::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect_token(Token::RBracket)?;
            Ok(ActionSet::Set(set))
        } else {
            Ok(ActionSet::Any)
        }
    }

    fn parse_string_literal(&mut self) -> Result<String, PolicyError> {
        match self.advance().token {
            Token::Str(s) => Ok(s),
            other => Err(PolicyError::compile(
                self.peek().line,
                self.peek().col,
                format!("expected string literal, found {other:?}"),
            )),
        }
    }

    fn parse_or_expr(&mut self) -> Result<Expr, PolicyError> {
        let mut lhs = self.parse_and_expr()?;
        while self.peek().token == Token::OrOr {
            self.advance();
            let rhs = self.parse_and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, PolicyError> {
        let mut lhs = self.parse_unary()?;
        while self.peek().token == Token::AndAnd {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, PolicyError> {
        if self.peek().token == Token::Bang {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, PolicyError> {
        let lhs = self.parse_primary()?;
        let op = match &self.peek().token {
            Token::EqEq => Some(CmpOp::Eq),
            Token::NotEq => Some(CmpOp::Ne),
            Token::Lt => Some(CmpOp::Lt),
            Token::Lte => Some(CmpOp::Le),
            Token::Gt => Some(CmpOp::Gt),
            Token::Gte => Some(CmpOp::Ge),
            Token::Word(w) if w == "in" => Some(CmpOp::In),
            Token::Word(w) if w == "not" => Some(CmpOp::NotIn),
            Token::Word(w) if w == "contains" => Some(CmpOp::Contains),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(lhs);
        };
        if op == CmpOp::NotIn {
            self.advance();
            self.expect_word("in")?;
        } else {
            self.advance();
        }
        let rhs = self.parse_primary()?;
        Ok(Expr::Cmp(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_primary(&mut self) -> Result<Expr, PolicyError> {
        match self.peek().token.clone() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_or_expr()?;
                self.expect_token(Token::RParen)?;
                Ok(inner)
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            Token::Int(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)))
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if self.peek().token != Token::RBracket {
                    loop {
                        items.push(self.parse_string_literal()?);
                        if self.peek().token == Token::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect_token(Token::RBracket)?;
                Ok(Expr::Literal(Literal::List(items)))
            }
            Token::Word(w) => self.parse_word_primary(w),
            other => Err(self.err(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_word_primary(&mut self, w: String) -> Result<Expr, PolicyError> {
        match w.as_str() {
            "true" => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            "false" => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            "has" | "startswith" | "length" => self.parse_call(w),
            "principal" | "resource" | "context" => self.parse_attr_ref(w),
            other => Err(self.err(format!("unexpected identifier '{other}'"))),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, PolicyError> {
        self.advance();
        self.expect_token(Token::LParen)?;
        let mut args = Vec::new();
        if self.peek().token != Token::RParen {
            loop {
                args.push(self.parse_or_expr()?);
                if self.peek().token == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect_token(Token::RParen)?;
        let func = match name.as_str() {
            "has" => Func::Has,
            "startswith" => Func::StartsWith,
            "length" => Func::Length,
            _ => unreachable!(),
        };
        Ok(Expr::Call(func, args))
    }

    fn parse_attr_ref(&mut self, scope_word: String) -> Result<Expr, PolicyError> {
        let (line, col) = (self.peek().line, self.peek().col);
        self.advance();
        self.expect_token(Token::Dot)?;
        let first = self.take_word()?;

        if scope_word == "context" {
            return Ok(Expr::AttrRef {
                scope: AttrScope::Context,
                namespace: None,
                attr: first,
                line,
                col,
            });
        }

        self.expect_token(Token::Dot)?;
        let attr = self.take_word()?;
        let scope = if scope_word == "principal" {
            AttrScope::Principal
        } else {
            AttrScope::Resource
        };
        Ok(Expr::AttrRef {
            scope,
            namespace: Some(first),
            attr,
            line,
            col,
        })
    }
}

pub fn parse(tokens: &[Spanned]) -> Result<Vec<PolicyAst>, PolicyError> {
    Parser::new(tokens).parse_policies()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;

    fn parse_src(src: &str) -> Vec<PolicyAst> {
        let toks = lex(src).unwrap();
        parse(&toks).unwrap()
    }

    #[test]
    fn parses_bare_permit() {
        let policies = parse_src("permit(principal, action, resource);");
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].effect, Effect::Permit);
        assert_eq!(policies[0].target.actions, ActionSet::Any);
    }

    #[test]
    fn parses_target_with_types_and_action_set() {
        let policies = parse_src(
            r#"forbid(
                principal is character,
                action in ["read", "write"],
                resource is property
            );"#,
        );
        let t = &policies[0].target;
        assert_eq!(t.principal_type.as_deref(), Some("character"));
        assert_eq!(t.resource_type.as_deref(), Some("property"));
        match &t.actions {
            ActionSet::Set(set) => {
                assert!(set.contains("read"));
                assert!(set.contains("write"));
            }
            _ => panic!("expected action set"),
        }
    }

    #[test]
    fn parses_condition_with_attr_refs_and_ops() {
        let policies = parse_src(
            r#"permit(principal, action, resource) when {
                principal.character.role == "admin" && !(resource.object.locked == true)
            };"#,
        );
        assert!(policies[0].condition.is_some());
    }

    #[test]
    fn parses_in_and_not_in_and_contains_and_functions() {
        let policies = parse_src(
            r#"permit(principal, action, resource) when {
                principal.character.role in ["admin", "builder"]
                && resource.object.tag not in ["hidden"]
                && has(resource.object.flags, "locked")
                && startswith(resource.property.path, "public.")
                && length(resource.property.path) > 0
            };"#,
        );
        assert!(policies[0].condition.is_some());
    }

    #[test]
    fn parses_context_attr_ref() {
        let policies = parse_src(
            r#"permit(principal, action, resource) when { context.client_kind == "telnet" };"#,
        );
        match &policies[0].condition {
            Some(Expr::Cmp(lhs, CmpOp::Eq, _)) => match lhs.as_ref() {
                Expr::AttrRef { scope: AttrScope::Context, namespace, attr, .. } => {
                    assert!(namespace.is_none());
                    assert_eq!(attr, "client_kind");
                }
                other => panic!("unexpected lhs {other:?}"),
            },
            other => panic!("unexpected condition {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_effect_keyword() {
        let toks = lex("allow(principal, action, resource);").unwrap();
        assert!(parse(&toks).is_err());
    }

    #[test]
    fn rejects_missing_semicolon() {
        let toks = lex("permit(principal, action, resource)").unwrap();
        assert!(parse(&toks).is_err());
    }

    #[test]
    fn parses_multiple_statements() {
        let policies = parse_src(
            "permit(principal, action, resource); forbid(principal, action, resource);",
        );
        assert_eq!(policies.len(), 2);
    }
}
