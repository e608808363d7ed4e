//! # Column Definition Grammar
//!
//! Parses the textual column specifications accepted by CREATE and ALTER:
//!
//! ```text
//! column_def  := IDENT TYPE constraint*
//! constraint  := 'NOT NULL' | 'PRIMARY KEY' | 'UNIQUE'
//!              | 'CHECK' '(' expr ')'
//!              | 'FOREIGN KEY REFERENCES' IDENT
//!              | 'DEFAULT' literal
//! ```
//!
//! Tokenization splits on whitespace but keeps parenthesized groups and
//! quoted literals intact, so `CHECK (age >= 18)` stays one unit.
//!
//! ALTER's modify and drop lists use the same tokenizer:
//!
//! ```text
//! modify_spec := IDENT TYPE            -- retype the column
//!              | IDENT constraint+     -- attach constraints
//! drop_spec   := IDENT                 -- drop the column
//!              | IDENT constraint_kind -- drop all constraints of a kind
//!              | IDENT IDENT           -- drop one constraint by name
//! ```

use super::literal::parse_literal;
use super::identifier;
use crate::constraints::{CheckRule, ConstraintKind, ConstraintRule};
use crate::error::{ParseSnafu, Result};
use crate::sql::parse_condition;
use crate::types::DataType;

/// A parsed column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ConstraintRule>,
}

/// A parsed ALTER modify entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ModifySpec {
    Retype {
        column: String,
        data_type: DataType,
    },
    Constrain {
        column: String,
        constraints: Vec<ConstraintRule>,
    },
}

/// A parsed ALTER drop entry.
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    Column { column: String },
    ConstraintKind { column: String, kind: ConstraintKind },
    ConstraintNamed { column: String, name: String },
}

/// Parses `IDENT TYPE constraint*`.
pub fn parse_column_def(text: &str) -> Result<ColumnSpec> {
    let tokens = split_tokens(text)?;
    if tokens.len() < 2 {
        return ParseSnafu {
            message: format!(
                "invalid column definition '{}': name and type are required",
                text.trim()
            ),
        }
        .fail();
    }
    let name = identifier(&tokens[0])?;
    let Some(data_type) = DataType::parse(&tokens[1]) else {
        return ParseSnafu {
            message: format!(
                "unknown data type '{}' in column definition '{}'",
                tokens[1],
                text.trim()
            ),
        }
        .fail();
    };
    let constraints = parse_constraint_specs(&tokens[2..], text)?;
    Ok(ColumnSpec {
        name,
        data_type,
        constraints,
    })
}

/// Parses an ALTER modify entry.
pub fn parse_modify_spec(text: &str) -> Result<ModifySpec> {
    let tokens = split_tokens(text)?;
    if tokens.len() < 2 {
        return ParseSnafu {
            message: format!(
                "invalid modify specification '{}': column and type or constraints required",
                text.trim()
            ),
        }
        .fail();
    }
    let column = identifier(&tokens[0])?;
    if tokens.len() == 2 {
        if let Some(data_type) = DataType::parse(&tokens[1]) {
            return Ok(ModifySpec::Retype { column, data_type });
        }
    }
    let constraints = parse_constraint_specs(&tokens[1..], text)?;
    Ok(ModifySpec::Constrain {
        column,
        constraints,
    })
}

/// Parses an ALTER drop entry.
pub fn parse_drop_spec(text: &str) -> Result<DropTarget> {
    let tokens = split_tokens(text)?;
    match tokens.len() {
        0 => ParseSnafu {
            message: "empty drop specification".to_string(),
        }
        .fail(),
        1 => Ok(DropTarget::Column {
            column: identifier(&tokens[0])?,
        }),
        _ => {
            let column = identifier(&tokens[0])?;
            if let Some(kind) = constraint_kind(&tokens[1..]) {
                return Ok(DropTarget::ConstraintKind { column, kind });
            }
            if tokens.len() == 2 {
                return Ok(DropTarget::ConstraintNamed {
                    column,
                    name: tokens[1].clone(),
                });
            }
            ParseSnafu {
                message: format!("invalid drop specification '{}'", text.trim()),
            }
            .fail()
        }
    }
}

fn constraint_kind(tokens: &[String]) -> Option<ConstraintKind> {
    let first = tokens.first()?.to_ascii_uppercase();
    let second = tokens.get(1).map(|t| t.to_ascii_uppercase());
    match (first.as_str(), second.as_deref(), tokens.len()) {
        ("NOT", Some("NULL"), 2) => Some(ConstraintKind::NotNull),
        ("PRIMARY", Some("KEY"), 2) => Some(ConstraintKind::PrimaryKey),
        ("FOREIGN", Some("KEY"), 2) => Some(ConstraintKind::ForeignKey),
        ("UNIQUE", None, 1) => Some(ConstraintKind::Unique),
        ("CHECK", None, 1) => Some(ConstraintKind::Check),
        ("DEFAULT", None, 1) => Some(ConstraintKind::Default),
        _ => None,
    }
}

fn parse_constraint_specs(tokens: &[String], source: &str) -> Result<Vec<ConstraintRule>> {
    let mut rules = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let upper = tokens[i].to_ascii_uppercase();
        match upper.as_str() {
            "NOT" => {
                expect_keyword(tokens, i + 1, "NULL", source)?;
                rules.push(ConstraintRule::NotNull);
                i += 2;
            }
            "PRIMARY" => {
                expect_keyword(tokens, i + 1, "KEY", source)?;
                rules.push(ConstraintRule::PrimaryKey);
                i += 2;
            }
            "UNIQUE" => {
                rules.push(ConstraintRule::Unique);
                i += 1;
            }
            "FOREIGN" => {
                expect_keyword(tokens, i + 1, "KEY", source)?;
                expect_keyword(tokens, i + 2, "REFERENCES", source)?;
                let Some(parent) = tokens.get(i + 3) else {
                    return ParseSnafu {
                        message: format!(
                            "FOREIGN KEY REFERENCES requires a table name in '{}'",
                            source.trim()
                        ),
                    }
                    .fail();
                };
                rules.push(ConstraintRule::ForeignKey {
                    parent_table: identifier(parent)?,
                });
                i += 4;
            }
            "DEFAULT" => {
                let Some(literal) = tokens.get(i + 1) else {
                    return ParseSnafu {
                        message: format!("DEFAULT requires a literal in '{}'", source.trim()),
                    }
                    .fail();
                };
                rules.push(ConstraintRule::Default(parse_literal(literal)?));
                i += 2;
            }
            _ if upper.starts_with("CHECK") => {
                let (body, consumed) = check_body(tokens, i, source)?;
                let expr = parse_condition(&body)?;
                rules.push(ConstraintRule::Check(CheckRule { text: body, expr }));
                i += consumed;
            }
            _ => {
                return ParseSnafu {
                    message: format!(
                        "unrecognized constraint '{}' in '{}'",
                        tokens[i],
                        source.trim()
                    ),
                }
                .fail();
            }
        }
    }

    Ok(rules)
}

fn expect_keyword(tokens: &[String], at: usize, keyword: &str, source: &str) -> Result<()> {
    match tokens.get(at) {
        Some(t) if t.eq_ignore_ascii_case(keyword) => Ok(()),
        _ => ParseSnafu {
            message: format!("expected '{}' in '{}'", keyword, source.trim()),
        }
        .fail(),
    }
}

/// Extracts the parenthesized body of a CHECK, whether it arrived as
/// `CHECK(expr)` in one token or `CHECK` + `(expr)` in two.
fn check_body(tokens: &[String], at: usize, source: &str) -> Result<(String, usize)> {
    let token = &tokens[at];
    let (group, consumed) = if token.len() > 5 {
        (token[5..].to_string(), 1)
    } else {
        match tokens.get(at + 1) {
            Some(next) => (next.clone(), 2),
            None => {
                return ParseSnafu {
                    message: format!("CHECK requires an expression in '{}'", source.trim()),
                }
                .fail();
            }
        }
    };
    let inner = group
        .strip_prefix('(')
        .and_then(|g| g.strip_suffix(')'))
        .map(str::trim);
    match inner {
        Some(body) if !body.is_empty() => Ok((body.to_string(), consumed)),
        _ => ParseSnafu {
            message: format!(
                "CHECK requires a parenthesized expression in '{}'",
                source.trim()
            ),
        }
        .fail(),
    }
}

/// Splits on whitespace while keeping parenthesized groups and quoted
/// literals attached to their token.
fn split_tokens(text: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                if depth == 0 {
                    return ParseSnafu {
                        message: format!("unbalanced ')' in '{}'", text.trim()),
                    }
                    .fail();
                }
                depth -= 1;
                current.push(ch);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if depth != 0 || quote.is_some() {
        return ParseSnafu {
            message: format!("unbalanced delimiter in '{}'", text.trim()),
        }
        .fail();
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn parses_plain_column() {
        let spec = parse_column_def("id INTEGER").unwrap();
        assert_eq!(spec.name, "id");
        assert_eq!(spec.data_type, DataType::Integer);
        assert!(spec.constraints.is_empty());
    }

    #[test]
    fn parses_all_constraint_forms() {
        let spec = parse_column_def(
            "age INTEGER NOT NULL UNIQUE CHECK (age >= 18) DEFAULT 21",
        )
        .unwrap();
        assert_eq!(spec.constraints.len(), 4);
        assert_eq!(spec.constraints[0], ConstraintRule::NotNull);
        assert_eq!(spec.constraints[1], ConstraintRule::Unique);
        assert!(matches!(spec.constraints[2], ConstraintRule::Check(_)));
        assert_eq!(spec.constraints[3], ConstraintRule::Default(Value::Int(21)));
    }

    #[test]
    fn check_attached_and_detached_parens() {
        let a = parse_column_def("age INTEGER CHECK(age >= 18)").unwrap();
        let b = parse_column_def("age INTEGER CHECK (age >= 18)").unwrap();
        assert_eq!(a.constraints, b.constraints);
    }

    #[test]
    fn parses_primary_and_foreign_keys() {
        let spec = parse_column_def("owner_id INTEGER FOREIGN KEY REFERENCES users").unwrap();
        assert_eq!(
            spec.constraints,
            vec![ConstraintRule::ForeignKey {
                parent_table: "users".to_string()
            }]
        );

        let spec = parse_column_def("id INTEGER PRIMARY KEY").unwrap();
        assert_eq!(spec.constraints, vec![ConstraintRule::PrimaryKey]);
    }

    #[test]
    fn default_keeps_quoted_strings_whole() {
        let spec = parse_column_def("status STRING DEFAULT 'in review'").unwrap();
        assert_eq!(
            spec.constraints,
            vec![ConstraintRule::Default(Value::Str("in review".into()))]
        );
    }

    #[test]
    fn rejects_missing_type() {
        assert!(parse_column_def("id").is_err());
        assert!(parse_column_def("id WIBBLE").is_err());
    }

    #[test]
    fn rejects_unknown_constraint() {
        assert!(parse_column_def("id INTEGER SPARKLY").is_err());
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(parse_column_def("age INTEGER CHECK (age >= 18").is_err());
    }

    #[test]
    fn modify_retype_and_constrain() {
        assert_eq!(
            parse_modify_spec("age REAL").unwrap(),
            ModifySpec::Retype {
                column: "age".into(),
                data_type: DataType::Real
            }
        );
        let spec = parse_modify_spec("age NOT NULL CHECK (age >= 0)").unwrap();
        match spec {
            ModifySpec::Constrain { column, constraints } => {
                assert_eq!(column, "age");
                assert_eq!(constraints.len(), 2);
            }
            other => panic!("expected Constrain, got {:?}", other),
        }
    }

    #[test]
    fn drop_specs() {
        assert_eq!(
            parse_drop_spec("age").unwrap(),
            DropTarget::Column {
                column: "age".into()
            }
        );
        assert_eq!(
            parse_drop_spec("age CHECK").unwrap(),
            DropTarget::ConstraintKind {
                column: "age".into(),
                kind: ConstraintKind::Check
            }
        );
        assert_eq!(
            parse_drop_spec("age NOT NULL").unwrap(),
            DropTarget::ConstraintKind {
                column: "age".into(),
                kind: ConstraintKind::NotNull
            }
        );
        assert_eq!(
            parse_drop_spec("age age_check_constraint").unwrap(),
            DropTarget::ConstraintNamed {
                column: "age".into(),
                name: "age_check_constraint".into()
            }
        );
    }
}
