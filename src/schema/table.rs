//! # Table Storage and Primitives
//!
//! A `Table` is an insertion-ordered set of columns sharing one row count.
//! Rows are identified by position: inserts append, deletes compact,
//! updates rewrite in place.
//!
//! All mutating primitives are fail-fast: preconditions are checked and
//! every candidate value is validated before anything is written, so a
//! failure leaves the table untouched. Statement-level atomicity for
//! multi-row INSERT and UPDATE is handled one level up, in `Database`,
//! which runs them against a working copy.

use crate::constraints::{ColumnValidator, Constraint, ConstraintKind, ConstraintRule, FkProbe};
use crate::error::{
    AlreadyExistsSnafu, Entity, NotFoundSnafu, ParseSnafu, Result, TypeMismatchSnafu,
};
use crate::parsing::ColumnSpec;
use crate::response::Response;
use crate::sql::{evaluate, CondExpr, RowView};
use crate::types::{DataType, Value};

/// One `column = value` rewrite of an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

use super::column::Column;

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(columns: Vec<Column>, row_count: usize) -> Self {
        Self { columns, row_count }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name() == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// The column carrying a PRIMARY KEY constraint, if any.
    pub fn primary_key_column(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.has_kind(ConstraintKind::PrimaryKey))
    }

    /// Appends a column. An existing table gets the new column padded with
    /// Null up to the current row count.
    pub fn create_column(&mut self, spec: ColumnSpec) -> Result<()> {
        if self.contains_column(&spec.name) {
            return AlreadyExistsSnafu {
                entity: Entity::Column,
                name: spec.name,
            }
            .fail();
        }
        let mut column = Column::from_rules(spec.name, spec.data_type, spec.constraints)?;
        for _ in 0..self.row_count {
            column.push(Value::Null);
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<Column> {
        match self.column_index(name) {
            Some(at) => Ok(self.columns.remove(at)),
            None => NotFoundSnafu {
                entity: Entity::Column,
                name,
            }
            .fail(),
        }
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if self.contains_column(new) {
            return AlreadyExistsSnafu {
                entity: Entity::Column,
                name: new,
            }
            .fail();
        }
        match self.columns.iter_mut().find(|c| c.name() == old) {
            Some(column) => {
                column.set_name(new);
                Ok(())
            }
            None => NotFoundSnafu {
                entity: Entity::Column,
                name: old,
            }
            .fail(),
        }
    }

    pub fn drop_constraint_named(&mut self, column: &str, name: &str) -> Result<()> {
        let col = self.column_mut(column)?;
        col.drop_constraint_named(name)?;
        Ok(())
    }

    /// Drops every constraint of `kind` on `column`; absent kinds error.
    pub fn drop_constraints_of_kind(&mut self, column: &str, kind: ConstraintKind) -> Result<()> {
        let default_name = Constraint::default_name(column, kind);
        let col = self.column_mut(column)?;
        if col.drop_constraints_of_kind(kind) == 0 {
            return NotFoundSnafu {
                entity: Entity::Constraint,
                name: default_name,
            }
            .fail();
        }
        Ok(())
    }

    /// Changes a column's type, but only when every stored value is
    /// admissible for the new type. Never coerces.
    pub fn modify_type(&mut self, column: &str, new_type: DataType) -> Result<()> {
        let col = self.column_mut(column)?;
        for value in col.body() {
            if !new_type.admits(value) {
                return TypeMismatchSnafu {
                    column,
                    expected: new_type,
                    found: value.display_string(),
                }
                .fail();
            }
        }
        col.set_data_type(new_type);
        Ok(())
    }

    /// Attaches constraints to an existing column after validating the
    /// whole stored body against the combined constraint set.
    pub fn modify_constraints(
        &mut self,
        column: &str,
        rules: Vec<ConstraintRule>,
        fk: FkProbe<'_>,
    ) -> Result<()> {
        let at = match self.column_index(column) {
            Some(at) => at,
            None => {
                return NotFoundSnafu {
                    entity: Entity::Column,
                    name: column,
                }
                .fail()
            }
        };

        let mut additions = Vec::with_capacity(rules.len());
        {
            let col = &self.columns[at];
            for rule in rules {
                let constraint = Constraint::new(column, rule);
                if col.has_constraint_named(constraint.name()) {
                    return AlreadyExistsSnafu {
                        entity: Entity::Constraint,
                        name: constraint.name(),
                    }
                    .fail();
                }
                additions.push(constraint);
            }

            let trial: Vec<Constraint> = col
                .constraints()
                .iter()
                .cloned()
                .chain(additions.iter().cloned())
                .collect();
            let validator =
                ColumnValidator::new(col.name(), col.data_type(), &trial, col.body());
            for (row, value) in col.body().iter().enumerate() {
                validator.validate(value, Some(row), fk)?;
            }
        }

        let col = &mut self.columns[at];
        for constraint in additions {
            col.add_constraint(constraint)?;
        }
        Ok(())
    }

    /// Inserts one row. Columns omitted from `columns` receive their
    /// DEFAULT literal if declared, else Null. Validation covers every cell
    /// before anything is appended.
    pub fn insert(&mut self, columns: &[String], values: &[Value], fk: FkProbe<'_>) -> Result<()> {
        if columns.len() != values.len() {
            return ParseSnafu {
                message: format!(
                    "number of columns ({}) and values ({}) do not match",
                    columns.len(),
                    values.len()
                ),
            }
            .fail();
        }
        for name in columns {
            if !self.contains_column(name) {
                return NotFoundSnafu {
                    entity: Entity::Column,
                    name,
                }
                .fail();
            }
        }

        let mut row = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = match columns.iter().position(|c| c == column.name()) {
                Some(at) => values[at].clone(),
                None => column.default_value().cloned().unwrap_or(Value::Null),
            };
            row.push(value);
        }

        for (column, value) in self.columns.iter().zip(&row) {
            column.validator().validate(value, None, fk)?;
        }

        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
        self.row_count += 1;
        Ok(())
    }

    /// Rewrites the assigned cells of every row matching `cond`, validating
    /// each rewrite. An Integer value assigned to a Real column widens.
    ///
    /// Mutates in place row by row; callers needing statement atomicity run
    /// this on a working copy.
    pub fn update(
        &mut self,
        assignments: &[Assignment],
        cond: Option<&CondExpr>,
        fk: FkProbe<'_>,
    ) -> Result<usize> {
        let mut targets = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            match self.column_index(&assignment.column) {
                Some(at) => targets.push(at),
                None => {
                    return NotFoundSnafu {
                        entity: Entity::Column,
                        name: assignment.column.clone(),
                    }
                    .fail()
                }
            }
        }

        let mut touched = 0;
        for row in 0..self.row_count {
            if !self.matches(cond, row)? {
                continue;
            }
            let mut rewrites = Vec::with_capacity(assignments.len());
            for (assignment, &at) in assignments.iter().zip(&targets) {
                let column = &self.columns[at];
                let value = widen(column.data_type(), assignment.value.clone());
                column.validator().validate(&value, Some(row), fk)?;
                rewrites.push((at, value));
            }
            for (at, value) in rewrites {
                self.columns[at].set(row, value);
            }
            touched += 1;
        }
        Ok(touched)
    }

    /// Compacts away every row matching `cond`; `None` removes all rows.
    pub fn delete(&mut self, cond: Option<&CondExpr>) -> Result<usize> {
        let mut keep = Vec::with_capacity(self.row_count);
        for row in 0..self.row_count {
            keep.push(!self.matches(cond, row)?);
        }
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return Ok(0);
        }
        for column in &mut self.columns {
            column.retain_rows(&keep);
        }
        self.row_count -= removed;
        Ok(removed)
    }

    /// Materializes matching rows as a column-named response. `None` for
    /// `columns` selects every column in insertion order.
    pub fn select(
        &self,
        columns: Option<&[String]>,
        cond: Option<&CondExpr>,
    ) -> Result<Response> {
        let selected: Vec<usize> = match columns {
            Some(names) => {
                let mut indices = Vec::with_capacity(names.len());
                for name in names {
                    match self.column_index(name) {
                        Some(at) => indices.push(at),
                        None => {
                            return NotFoundSnafu {
                                entity: Entity::Column,
                                name,
                            }
                            .fail()
                        }
                    }
                }
                indices
            }
            None => (0..self.columns.len()).collect(),
        };

        let mut hits = Vec::new();
        for row in 0..self.row_count {
            if self.matches(cond, row)? {
                hits.push(row);
            }
        }

        let mut response = Response::new();
        for &at in &selected {
            let column = &self.columns[at];
            let values = hits
                .iter()
                .filter_map(|&row| column.value(row).cloned())
                .collect();
            response.push_column(column.name().to_string(), values);
        }
        Ok(response)
    }

    fn matches(&self, cond: Option<&CondExpr>, row: usize) -> Result<bool> {
        let Some(expr) = cond else {
            return Ok(true);
        };
        let mut view = RowView::new();
        for column in &self.columns {
            if let Some(value) = column.value(row) {
                view.insert(column.name(), value);
            }
        }
        Ok(evaluate(expr, &view)?.is_true())
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        match self.columns.iter_mut().find(|c| c.name() == name) {
            Some(column) => Ok(column),
            None => NotFoundSnafu {
                entity: Entity::Column,
                name,
            }
            .fail(),
        }
    }
}

fn widen(data_type: DataType, value: Value) -> Value {
    match (data_type, value) {
        (DataType::Real, Value::Int(i)) => Value::Real(i as f64),
        (_, v) => v,
    }
}
