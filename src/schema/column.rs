//! # Column Storage
//!
//! A `Column` pairs a declared type with its ordered, name-keyed constraint
//! set and the column's slice of row storage (`body`). Invariant: every
//! body entry is admissible for the declared type and satisfies every
//! constraint; `Table` keeps all bodies the same length.

use smallvec::SmallVec;

use crate::constraints::{
    ColumnValidator, Constraint, ConstraintKind, ConstraintRule, ConstraintSet,
};
use crate::error::{AlreadyExistsSnafu, Entity, NotFoundSnafu, Result};
use crate::types::{DataType, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data_type: DataType,
    constraints: ConstraintSet,
    body: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: SmallVec::new(),
            body: Vec::new(),
        }
    }

    /// Builder used by tests and persistence.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Builds a column from parsed constraint rules, applying default
    /// constraint names.
    pub fn from_rules(
        name: impl Into<String>,
        data_type: DataType,
        rules: Vec<ConstraintRule>,
    ) -> Result<Self> {
        let mut column = Column::new(name, data_type);
        for rule in rules {
            let constraint = Constraint::new(column.name(), rule);
            column.add_constraint(constraint)?;
        }
        Ok(column)
    }

    pub(crate) fn from_parts(
        name: String,
        data_type: DataType,
        constraints: ConstraintSet,
        body: Vec<Value>,
    ) -> Self {
        Self {
            name,
            data_type,
            constraints,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn body(&self) -> &[Value] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn value(&self, row: usize) -> Option<&Value> {
        self.body.get(row)
    }

    pub fn has_kind(&self, kind: ConstraintKind) -> bool {
        self.constraints.iter().any(|c| c.kind() == kind)
    }

    pub fn has_constraint_named(&self, name: &str) -> bool {
        self.constraints.iter().any(|c| c.name() == name)
    }

    /// The DEFAULT literal for omitted insert columns, if declared.
    pub fn default_value(&self) -> Option<&Value> {
        self.constraints.iter().find_map(|c| match c.rule() {
            ConstraintRule::Default(value) => Some(value),
            _ => None,
        })
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        if self.has_constraint_named(constraint.name()) {
            return AlreadyExistsSnafu {
                entity: Entity::Constraint,
                name: constraint.name(),
            }
            .fail();
        }
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn drop_constraint_named(&mut self, name: &str) -> Result<Constraint> {
        match self.constraints.iter().position(|c| c.name() == name) {
            Some(at) => Ok(self.constraints.remove(at)),
            None => NotFoundSnafu {
                entity: Entity::Constraint,
                name,
            }
            .fail(),
        }
    }

    /// Removes every constraint of `kind`, returning how many were dropped.
    pub fn drop_constraints_of_kind(&mut self, kind: ConstraintKind) -> usize {
        let before = self.constraints.len();
        self.constraints.retain(|c| c.kind() != kind);
        before - self.constraints.len()
    }

    pub fn validator(&self) -> ColumnValidator<'_> {
        ColumnValidator::new(&self.name, self.data_type, &self.constraints, &self.body)
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.body.push(value);
    }

    pub(crate) fn set(&mut self, row: usize, value: Value) {
        if let Some(slot) = self.body.get_mut(row) {
            *slot = value;
        }
    }

    /// Keeps only the rows whose flag in `keep` is true.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.body.retain(|_| *flags.next().unwrap_or(&true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_constraint_names_are_rejected() {
        let mut column = Column::new("age", DataType::Integer);
        column
            .add_constraint(Constraint::new("age", ConstraintRule::NotNull))
            .unwrap();
        let err = column
            .add_constraint(Constraint::new("age", ConstraintRule::NotNull))
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn drop_by_name_and_by_kind() {
        let mut column = Column::new("age", DataType::Integer)
            .with_constraint(Constraint::new("age", ConstraintRule::NotNull))
            .with_constraint(Constraint::new("age", ConstraintRule::Unique));

        column.drop_constraint_named("age_unique_constraint").unwrap();
        assert!(!column.has_kind(ConstraintKind::Unique));

        assert_eq!(column.drop_constraints_of_kind(ConstraintKind::NotNull), 1);
        assert!(column.constraints().is_empty());

        assert!(column.drop_constraint_named("ghost").is_err());
    }

    #[test]
    fn default_value_lookup() {
        let column = Column::new("flag", DataType::Boolean).with_constraint(Constraint::new(
            "flag",
            ConstraintRule::Default(Value::Bool(false)),
        ));
        assert_eq!(column.default_value(), Some(&Value::Bool(false)));
        assert!(Column::new("x", DataType::Integer).default_value().is_none());
    }

    #[test]
    fn retain_rows_compacts_the_body() {
        let mut column = Column::new("n", DataType::Integer);
        for i in 0..4 {
            column.push(Value::Int(i));
        }
        column.retain_rows(&[true, false, true, false]);
        assert_eq!(column.body(), &[Value::Int(0), Value::Int(2)]);
    }
}
