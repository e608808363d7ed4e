//! # Condition Parser
//!
//! Recursive-descent parser over the condition grammar:
//!
//! ```text
//! expr    := or
//! or      := and ('OR' and)*
//! and     := not ('AND' not)*
//! not     := 'NOT' not | atom
//! atom    := column op literal | column op column
//!          | column 'IS' ['NOT'] 'NULL' | '(' expr ')'
//! op      := '=' | '<>' | '<' | '<=' | '>' | '>=' | 'LIKE'
//! ```

use super::ast::{CompareOp, CondExpr, Operand};
use super::lexer::{tokenize, Token};
use crate::error::{ParseSnafu, Result};
use crate::types::Value;

/// Parses condition text into its cached AST form.
pub fn parse_condition(input: &str) -> Result<CondExpr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return ParseSnafu {
            message: "empty condition".to_string(),
        }
        .fail();
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        input,
    };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return ParseSnafu {
            message: format!("unexpected trailing input in condition '{}'", input),
        }
        .fail();
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    input: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn fail<T>(&self, what: &str) -> Result<T> {
        ParseSnafu {
            message: format!("{} in condition '{}'", what, self.input),
        }
        .fail()
    }

    fn parse_or(&mut self) -> Result<CondExpr> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = CondExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<CondExpr> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = CondExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<CondExpr> {
        if self.eat(&Token::Not) {
            let inner = self.parse_not()?;
            return Ok(CondExpr::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<CondExpr> {
        if self.eat(&Token::LParen) {
            let inner = self.parse_or()?;
            if !self.eat(&Token::RParen) {
                return self.fail("expected ')'");
            }
            return Ok(inner);
        }

        let column = match self.next() {
            Some(Token::Ident(name)) => name,
            _ => return self.fail("expected a column name"),
        };

        if self.eat(&Token::Is) {
            let negated = self.eat(&Token::Not);
            if !self.eat(&Token::Null) {
                return self.fail("expected NULL after IS");
            }
            return Ok(CondExpr::IsNull { column, negated });
        }

        let op = match self.next() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            Some(Token::Like) => CompareOp::Like,
            _ => return self.fail("expected a comparison operator"),
        };

        let right = match self.next() {
            Some(Token::Ident(name)) => Operand::Column(name),
            Some(Token::Literal(value)) => Operand::Literal(value),
            Some(Token::Null) => Operand::Literal(Value::Null),
            _ => return self.fail("expected a literal or column after operator"),
        };

        Ok(CondExpr::Compare {
            left: Operand::Column(column),
            op,
            right,
        })
    }
}
