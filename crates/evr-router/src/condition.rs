// SPDX-License-Identifier: MIT

//! The transformer condition sublanguage (§4.3): `field op value`
//! combined with `and` / `or` / `not` and parentheses. No arbitrary
//! code — just enough to gate a transformer on its input data.
//!
//! Grammar (case-sensitive keywords `and`/`or`/`not`/`in`):
//!
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := unary ("and" unary)*
//! unary      := "not" unary | "(" or_expr ")" | comparison
//! comparison := field op value
//! field      := dotted identifier, e.g. `a.b.c`
//! op         := "==" | "!=" | ">=" | "<=" | ">" | "<" | "in" | "not" "in"
//! value      := string | number | "true" | "false" | "null" | "[" value,* "]"
//! ```

use serde_json::Value;
use std::fmt;

/// A compiled condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare { field: String, op: CompareOp, value: Value },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("unexpected end of condition")]
    UnexpectedEnd,
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("expected a field name")]
    ExpectedField,
    #[error("expected a comparison operator")]
    ExpectedOperator,
    #[error("expected ')'")]
    ExpectedCloseParen,
    #[error("expected ']'")]
    ExpectedCloseBracket,
    #[error("invalid number literal: {0}")]
    InvalidNumber(String),
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Op(CompareOp),
    And,
    Or,
    Not,
    In,
    Word(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

fn lex(src: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ge));
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Le));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(CompareOp::Gt));
                i += 1;
            }
            '<' => {
                tokens.push(Token::Op(CompareOp::Lt));
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ConditionError::UnexpectedEnd);
                }
                i += 1; // closing quote
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' || c == ':' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.' || chars[i] == ':')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "null" => Token::Null,
                    _ => Token::Word(word),
                });
            }
            other => return Err(ConditionError::UnexpectedToken(other.to_string())),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ConditionError::ExpectedCloseParen),
                }
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let field = match self.advance() {
            Some(Token::Word(w)) => w,
            _ => return Err(ConditionError::ExpectedField),
        };
        let op = match self.advance() {
            Some(Token::Op(op)) => op,
            Some(Token::In) => CompareOp::In,
            Some(Token::Not) => match self.advance() {
                Some(Token::In) => CompareOp::NotIn,
                _ => return Err(ConditionError::ExpectedOperator),
            },
            _ => return Err(ConditionError::ExpectedOperator),
        };
        let value = self.parse_value()?;
        Ok(Expr::Compare { field, op, value })
    }

    fn parse_value(&mut self) -> Result<Value, ConditionError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Num(n)) => Ok(serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            Some(Token::Bool(b)) => Ok(Value::Bool(b)),
            Some(Token::Null) => Ok(Value::Null),
            Some(Token::Word(w)) => Ok(Value::String(w)),
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Token::RBracket)) {
                    loop {
                        items.push(self.parse_value()?);
                        match self.peek() {
                            Some(Token::Comma) => {
                                self.advance();
                            }
                            _ => break,
                        }
                    }
                }
                match self.advance() {
                    Some(Token::RBracket) => Ok(Value::Array(items)),
                    _ => Err(ConditionError::ExpectedCloseBracket),
                }
            }
            _ => Err(ConditionError::UnexpectedEnd),
        }
    }
}

/// Parse a condition expression string into its compiled [`Expr`] form.
pub fn parse(src: &str) -> Result<Expr, ConditionError> {
    let tokens = lex(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ConditionError::UnexpectedToken(format!("{:?}", parser.tokens[parser.pos])));
    }
    Ok(expr)
}

/// Look up a dotted field path into `data`. An absent field yields
/// `None`, which callers treat as `null` for comparison purposes.
pub fn lookup_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |acc, segment| acc.get(segment))
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn compare(op: CompareOp, actual: &Value, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => actual == expected,
        CompareOp::Ne => actual != expected,
        CompareOp::Gt | CompareOp::Lt | CompareOp::Ge | CompareOp::Le => {
            match (as_f64(actual), as_f64(expected)) {
                (Some(a), Some(b)) => match op {
                    CompareOp::Gt => a > b,
                    CompareOp::Lt => a < b,
                    CompareOp::Ge => a >= b,
                    CompareOp::Le => a <= b,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
        CompareOp::In => match expected {
            Value::Array(items) => items.contains(actual),
            Value::String(s) => actual.as_str().is_some_and(|a| s.contains(a)),
            _ => false,
        },
        CompareOp::NotIn => !compare(CompareOp::In, actual, expected),
    }
}

/// Evaluate a compiled condition against `data`. Absent fields compare
/// as `null`.
pub fn eval(expr: &Expr, data: &Value) -> bool {
    match expr {
        Expr::Compare { field, op, value } => {
            let actual = lookup_path(data, field).cloned().unwrap_or(Value::Null);
            compare(*op, &actual, value)
        }
        Expr::And(a, b) => eval(a, data) && eval(b, data),
        Expr::Or(a, b) => eval(a, data) || eval(b, data),
        Expr::Not(a) => !eval(a, data),
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
