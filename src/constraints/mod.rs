//! # Constraint System
//!
//! Named predicates attached to columns, and the machinery that evaluates
//! them against candidate values during INSERT and UPDATE.
//!
//! ## Supported Constraints
//!
//! | Constraint   | Predicate? | Description                              |
//! |--------------|------------|------------------------------------------|
//! | NOT NULL     | yes        | Rejects Null                             |
//! | PRIMARY KEY  | yes        | Implies NOT NULL and UNIQUE              |
//! | UNIQUE       | yes        | Rejects values already in the column; two Nulls violate |
//! | FOREIGN KEY  | yes        | Value must appear in the parent table's primary key |
//! | CHECK        | yes        | Condition evaluated over the candidate value |
//! | DEFAULT      | no         | Literal substituted for omitted insert columns |
//!
//! ## Validation Order
//!
//! 1. NOT NULL (and the NOT NULL half of PRIMARY KEY)
//! 2. Type admissibility
//! 3. UNIQUE / PRIMARY KEY (linear scan of the column body)
//! 4. FOREIGN KEY (lookup through the injected probe)
//! 5. CHECK (condition evaluator over a single-column row view)
//!
//! Cross-table lookups are injected as closures so the validator itself
//! never needs a handle to the whole database.
//!
//! ## Naming
//!
//! Every constraint carries a stable name; the default is
//! `<column>_<kind>_constraint` (e.g. `age_check_constraint`). Drop-by-name
//! removes one constraint, drop-by-kind removes every constraint of that
//! kind on the column.

use smallvec::SmallVec;

use crate::error::{ConstraintViolationSnafu, Result, TypeMismatchSnafu};
use crate::sql::{evaluate, CondExpr, RowView};
use crate::types::{DataType, Value};

/// Constraint kind, used for drop-by-kind selection and default naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    NotNull,
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
    Default,
}

impl ConstraintKind {
    /// The lowercase slug used in default constraint names.
    pub fn slug(self) -> &'static str {
        match self {
            ConstraintKind::NotNull => "not_null",
            ConstraintKind::PrimaryKey => "primary_key",
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign_key",
            ConstraintKind::Check => "check",
            ConstraintKind::Default => "default",
        }
    }
}

/// A CHECK constraint: original text plus its cached parsed form.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRule {
    pub text: String,
    pub expr: CondExpr,
}

/// The rule a constraint enforces.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintRule {
    NotNull,
    PrimaryKey,
    Unique,
    ForeignKey { parent_table: String },
    Check(CheckRule),
    Default(Value),
}

impl ConstraintRule {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            ConstraintRule::NotNull => ConstraintKind::NotNull,
            ConstraintRule::PrimaryKey => ConstraintKind::PrimaryKey,
            ConstraintRule::Unique => ConstraintKind::Unique,
            ConstraintRule::ForeignKey { .. } => ConstraintKind::ForeignKey,
            ConstraintRule::Check(_) => ConstraintKind::Check,
            ConstraintRule::Default(_) => ConstraintKind::Default,
        }
    }
}

/// A named, column-attached constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    name: String,
    rule: ConstraintRule,
}

impl Constraint {
    /// Creates a constraint with the default `<column>_<kind>_constraint` name.
    pub fn new(column: &str, rule: ConstraintRule) -> Self {
        let name = Self::default_name(column, rule.kind());
        Self { name, rule }
    }

    /// Creates a constraint with an explicit name.
    pub fn named(name: impl Into<String>, rule: ConstraintRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }

    pub fn default_name(column: &str, kind: ConstraintKind) -> String {
        format!("{}_{}_constraint", column, kind.slug())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule(&self) -> &ConstraintRule {
        &self.rule
    }

    pub fn kind(&self) -> ConstraintKind {
        self.rule.kind()
    }
}

/// Inline storage for the typical handful of constraints per column.
pub type ConstraintSet = SmallVec<[Constraint; 4]>;

/// Cross-table probe: does `parent_table`'s primary key contain `value`?
pub type FkProbe<'a> = &'a dyn Fn(&str, &Value) -> Result<bool>;

/// Validates one candidate value against a column's type and constraints.
///
/// `skip_row` excludes a row from the uniqueness scan so an UPDATE does not
/// collide with the cell it is rewriting.
pub struct ColumnValidator<'a> {
    column_name: &'a str,
    data_type: DataType,
    constraints: &'a [Constraint],
    body: &'a [Value],
}

impl<'a> ColumnValidator<'a> {
    pub fn new(
        column_name: &'a str,
        data_type: DataType,
        constraints: &'a [Constraint],
        body: &'a [Value],
    ) -> Self {
        Self {
            column_name,
            data_type,
            constraints,
            body,
        }
    }

    pub fn validate(
        &self,
        candidate: &Value,
        skip_row: Option<usize>,
        fk: FkProbe<'_>,
    ) -> Result<()> {
        self.check_not_null(candidate)?;
        self.check_type(candidate)?;
        self.check_unique(candidate, skip_row)?;
        self.check_foreign_keys(candidate, fk)?;
        self.check_expressions(candidate)?;
        Ok(())
    }

    fn check_not_null(&self, candidate: &Value) -> Result<()> {
        if !candidate.is_null() {
            return Ok(());
        }
        let rejecting = self.constraints.iter().find(|c| {
            matches!(
                c.rule(),
                ConstraintRule::NotNull | ConstraintRule::PrimaryKey
            )
        });
        match rejecting {
            Some(constraint) => ConstraintViolationSnafu {
                constraint: constraint.name(),
                column: self.column_name,
                message: "value must not be NULL",
            }
            .fail(),
            None => Ok(()),
        }
    }

    fn check_type(&self, candidate: &Value) -> Result<()> {
        if self.data_type.admits(candidate) {
            return Ok(());
        }
        TypeMismatchSnafu {
            column: self.column_name,
            expected: self.data_type,
            found: candidate.display_string(),
        }
        .fail()
    }

    fn check_unique(&self, candidate: &Value, skip_row: Option<usize>) -> Result<()> {
        let unique = self.constraints.iter().find(|c| {
            matches!(
                c.rule(),
                ConstraintRule::Unique | ConstraintRule::PrimaryKey
            )
        });
        let Some(constraint) = unique else {
            return Ok(());
        };
        // Set-membership equality: Null == Null, so a second Null violates.
        let duplicate = self
            .body
            .iter()
            .enumerate()
            .any(|(row, existing)| Some(row) != skip_row && existing == candidate);
        if duplicate {
            return ConstraintViolationSnafu {
                constraint: constraint.name(),
                column: self.column_name,
                message: format!("value {} already present", candidate.display_string()),
            }
            .fail();
        }
        Ok(())
    }

    fn check_foreign_keys(&self, candidate: &Value, fk: FkProbe<'_>) -> Result<()> {
        for constraint in self.constraints {
            let ConstraintRule::ForeignKey { parent_table } = constraint.rule() else {
                continue;
            };
            if candidate.is_null() {
                continue;
            }
            if !fk(parent_table, candidate)? {
                return ConstraintViolationSnafu {
                    constraint: constraint.name(),
                    column: self.column_name,
                    message: format!(
                        "value {} not present in primary key of table '{}'",
                        candidate.display_string(),
                        parent_table
                    ),
                }
                .fail();
            }
        }
        Ok(())
    }

    fn check_expressions(&self, candidate: &Value) -> Result<()> {
        for constraint in self.constraints {
            let ConstraintRule::Check(rule) = constraint.rule() else {
                continue;
            };
            if candidate.is_null() {
                continue;
            }
            let view = RowView::single(self.column_name, candidate);
            if !evaluate(&rule.expr, &view)?.is_true() {
                return ConstraintViolationSnafu {
                    constraint: constraint.name(),
                    column: self.column_name,
                    message: rule.text.clone(),
                }
                .fail();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::sql::parse_condition;

    fn no_fk(_: &str, _: &Value) -> Result<bool> {
        Ok(false)
    }

    fn check(text: &str) -> ConstraintRule {
        ConstraintRule::Check(CheckRule {
            text: text.to_string(),
            expr: parse_condition(text).unwrap(),
        })
    }

    #[test]
    fn default_names_follow_the_convention() {
        let c = Constraint::new("age", check("age >= 18"));
        assert_eq!(c.name(), "age_check_constraint");
        let c = Constraint::new("id", ConstraintRule::PrimaryKey);
        assert_eq!(c.name(), "id_primary_key_constraint");
    }

    #[test]
    fn not_null_rejects_null() {
        let constraints = [Constraint::new("name", ConstraintRule::NotNull)];
        let validator = ColumnValidator::new("name", DataType::String, &constraints, &[]);
        let err = validator.validate(&Value::Null, None, &no_fk).unwrap_err();
        match err {
            DbError::ConstraintViolation { constraint, .. } => {
                assert_eq!(constraint, "name_not_null_constraint");
            }
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }

    #[test]
    fn primary_key_implies_not_null_and_unique() {
        let constraints = [Constraint::new("id", ConstraintRule::PrimaryKey)];
        let body = [Value::Int(1)];
        let validator = ColumnValidator::new("id", DataType::Integer, &constraints, &body);

        assert!(validator.validate(&Value::Null, None, &no_fk).is_err());
        assert!(validator.validate(&Value::Int(1), None, &no_fk).is_err());
        assert!(validator.validate(&Value::Int(2), None, &no_fk).is_ok());
    }

    #[test]
    fn unique_rejects_second_null() {
        let constraints = [Constraint::new("email", ConstraintRule::Unique)];
        let body = [Value::Null];
        let validator = ColumnValidator::new("email", DataType::String, &constraints, &body);
        assert!(validator.validate(&Value::Null, None, &no_fk).is_err());
    }

    #[test]
    fn unique_skips_the_row_being_rewritten() {
        let constraints = [Constraint::new("email", ConstraintRule::Unique)];
        let body = [Value::Str("a@x".into()), Value::Str("b@x".into())];
        let validator = ColumnValidator::new("email", DataType::String, &constraints, &body);

        assert!(validator
            .validate(&Value::Str("a@x".into()), Some(0), &no_fk)
            .is_ok());
        assert!(validator
            .validate(&Value::Str("a@x".into()), Some(1), &no_fk)
            .is_err());
    }

    #[test]
    fn type_check_runs_before_unique() {
        let constraints = [Constraint::new("id", ConstraintRule::Unique)];
        let validator = ColumnValidator::new("id", DataType::Integer, &constraints, &[]);
        let err = validator
            .validate(&Value::Str("one".into()), None, &no_fk)
            .unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch { .. }));
    }

    #[test]
    fn check_constraint_rejects_failing_value() {
        let constraints = [Constraint::new("age", check("age >= 18"))];
        let validator = ColumnValidator::new("age", DataType::Integer, &constraints, &[]);

        assert!(validator.validate(&Value::Int(30), None, &no_fk).is_ok());
        let err = validator.validate(&Value::Int(15), None, &no_fk).unwrap_err();
        match err {
            DbError::ConstraintViolation { constraint, .. } => {
                assert_eq!(constraint, "age_check_constraint");
            }
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }

    #[test]
    fn check_passes_null_through() {
        let constraints = [Constraint::new("age", check("age >= 18"))];
        let validator = ColumnValidator::new("age", DataType::Integer, &constraints, &[]);
        assert!(validator.validate(&Value::Null, None, &no_fk).is_ok());
    }

    #[test]
    fn foreign_key_uses_the_probe() {
        let constraints = [Constraint::new(
            "user_id",
            ConstraintRule::ForeignKey {
                parent_table: "users".to_string(),
            },
        )];
        let validator = ColumnValidator::new("user_id", DataType::Integer, &constraints, &[]);

        let probe = |table: &str, value: &Value| -> Result<bool> {
            Ok(table == "users" && *value == Value::Int(1))
        };
        assert!(validator.validate(&Value::Int(1), None, &probe).is_ok());
        assert!(validator.validate(&Value::Int(9), None, &probe).is_err());
        // FK ignores Null; NOT NULL is a separate constraint.
        assert!(validator.validate(&Value::Null, None, &probe).is_ok());
    }
}
