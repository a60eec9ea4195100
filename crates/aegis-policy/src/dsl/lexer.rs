//! Hand-rolled lexer for the policy DSL.
//!
//! The grammar is small and closed, so a parser-combinator crate would be
//! more machinery than the problem needs — a straightforward hand-rolled
//! lexer and recursive-descent parser read and maintain just as easily.
//! Tokens carry a 1-based line and column so `CompileError` (see
//! `error.rs`) can point at the exact offending symbol.

use crate::error::PolicyError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Word(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Semicolon,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub col: u32,
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, PolicyError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;
    let mut col: u32 = 1;

    macro_rules! advance {
        () => {{
            if chars[pos] == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
            pos += 1;
        }};
    }

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            advance!();
            continue;
        }

        // Line comment
        if c == '/' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
            while pos < chars.len() && chars[pos] != '\n' {
                advance!();
            }
            continue;
        }

        let (tok_line, tok_col) = (line, col);

        if c == '"' {
            advance!();
            let mut s = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(PolicyError::compile(
                        tok_line,
                        tok_col,
                        "unterminated string literal",
                    ));
                }
                let ch = chars[pos];
                if ch == '"' {
                    advance!();
                    break;
                }
                if ch == '\\' {
                    advance!();
                    if pos >= chars.len() {
                        return Err(PolicyError::compile(
                            tok_line,
                            tok_col,
                            "unterminated escape sequence",
                        ));
                    }
                    let esc = chars[pos];
                    match esc {
                        '"' => s.push('"'),
                        '\\' => s.push('\\'),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        other => {
                            return Err(PolicyError::compile(
                                tok_line,
                                tok_col,
                                format!("unknown escape sequence '\\{other}'"),
                            ));
                        }
                    }
                    advance!();
                } else {
                    s.push(ch);
                    advance!();
                }
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                line: tok_line,
                col: tok_col,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let mut s = String::new();
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                s.push(chars[pos]);
                advance!();
            }
            let n: i64 = s
                .parse()
                .map_err(|_| PolicyError::compile(tok_line, tok_col, format!("invalid integer '{s}'")))?;
            tokens.push(Spanned {
                token: Token::Int(n),
                line: tok_line,
                col: tok_col,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut s = String::new();
            while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                s.push(chars[pos]);
                advance!();
            }
            tokens.push(Spanned {
                token: Token::Word(s),
                line: tok_line,
                col: tok_col,
            });
            continue;
        }

        macro_rules! two_char {
            ($second:expr, $two:expr, $one:expr) => {{
                advance!();
                if pos < chars.len() && chars[pos] == $second {
                    advance!();
                    $two
                } else {
                    $one
                }
            }};
        }

        let token = match c {
            '(' => {
                advance!();
                Token::LParen
            }
            ')' => {
                advance!();
                Token::RParen
            }
            '[' => {
                advance!();
                Token::LBracket
            }
            ']' => {
                advance!();
                Token::RBracket
            }
            '{' => {
                advance!();
                Token::LBrace
            }
            '}' => {
                advance!();
                Token::RBrace
            }
            ',' => {
                advance!();
                Token::Comma
            }
            '.' => {
                advance!();
                Token::Dot
            }
            ';' => {
                advance!();
                Token::Semicolon
            }
            '=' => two_char!('=', Token::EqEq, {
                return Err(PolicyError::compile(tok_line, tok_col, "unexpected '='; did you mean '=='?"));
            }),
            '!' => two_char!('=', Token::NotEq, Token::Bang),
            '<' => two_char!('=', Token::Lte, Token::Lt),
            '>' => two_char!('=', Token::Gte, Token::Gt),
            '&' => two_char!('&', Token::AndAnd, {
                return Err(PolicyError::compile(tok_line, tok_col, "unexpected '&'; did you mean '&&'?"));
            }),
            '|' => two_char!('|', Token::OrOr, {
                return Err(PolicyError::compile(tok_line, tok_col, "unexpected '|'; did you mean '||'?"));
            }),
            other => {
                return Err(PolicyError::compile(
                    tok_line,
                    tok_col,
                    format!("unexpected character '{other}'"),
                ));
            }
        };

        tokens.push(Spanned {
            token,
            line: tok_line,
            col: tok_col,
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
        col,
    });
    Ok(tokens)
}
