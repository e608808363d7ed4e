//! # Row-Filter Conditions
//!
//! The condition grammar used by UPDATE/DELETE/SELECT and by CHECK
//! constraints:
//!
//! ```text
//! expr    := or
//! or      := and ('OR' and)*
//! and     := not ('AND' not)*
//! not     := 'NOT' not | atom
//! atom    := column op literal | column op column | '(' expr ')'
//! op      := '=' | '<>' | '<' | '<=' | '>' | '>=' | 'LIKE' | 'IS'
//! ```
//!
//! Conditions are parsed once, on command construction, and the parsed
//! `CondExpr` is what commands carry and evaluate.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{CompareOp, CondExpr, Operand, Truth};
pub use eval::{evaluate, RowView};
pub use parser::parse_condition;
