//! # Database Aggregate
//!
//! A `Database` is a name-ordered collection of tables plus a lifecycle
//! state and the on-disk path of its whole-image file. Tables live in a
//! `BTreeMap` so enumeration and serialization are deterministic.
//!
//! ## Lifecycle State Machine
//!
//! ```text
//! ┌──────┐ create ┌─────────┐ first mutation ┌─────────┐
//! │ IDLE │ ─────► │ CREATED │ ─────────────► │ IN_WORK │
//! └──────┘        └─────────┘                └─────────┘
//!                      │                          │ reset
//!                      │ drop     ┌───────┐       ▼
//!                      └────────► │ RESET │   ┌────────┐
//!                                 └───────┘   │ CLOSED │
//!                                             └────────┘
//! ```
//!
//! Every mutating operation runs through a state gate: only CREATED and
//! IN_WORK admit mutation, and the first successful mutation moves
//! CREATED to IN_WORK. Anything else raises `invalid-state` naming the
//! current state.
//!
//! ## Foreign-Key Resolution
//!
//! DML runs against a working copy of the target table while foreign-key
//! probes resolve parent tables through the live map, so a failed
//! statement never leaves partial rows behind.

pub mod persistence;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::SNAPSHOT_FILE_EXT;
use crate::error::{
    AlreadyExistsSnafu, Entity, InvalidStateSnafu, NotFoundSnafu, Result,
};
use crate::parsing::{identifier, ColumnSpec, DropTarget, ModifySpec};
use crate::response::Response;
use crate::schema::{Assignment, Table};
use crate::sql::CondExpr;
use crate::types::Value;

/// Lifecycle state of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    Idle,
    Reset,
    Created,
    InWork,
    Closed,
}

impl std::fmt::Display for DatabaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DatabaseState::Idle => "IDLE",
            DatabaseState::Reset => "RESET",
            DatabaseState::Created => "CREATED",
            DatabaseState::InWork => "IN_WORK",
            DatabaseState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    name: String,
    file_path: PathBuf,
    tables: BTreeMap<String, Table>,
    state: DatabaseState,
}

impl Database {
    pub fn new(name: impl Into<String>, file_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            file_path,
            tables: BTreeMap::new(),
            state: DatabaseState::Created,
        }
    }

    pub(crate) fn from_parts(
        name: String,
        file_path: PathBuf,
        tables: BTreeMap<String, Table>,
        state: DatabaseState,
    ) -> Self {
        Self {
            name,
            file_path,
            tables,
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Sibling path the transaction manager snapshots to.
    pub fn snapshot_path(&self) -> PathBuf {
        self.file_path.with_extension(SNAPSHOT_FILE_EXT)
    }

    pub fn state(&self) -> DatabaseState {
        self.state
    }

    pub fn tables(&self) -> &BTreeMap<String, Table> {
        &self.tables
    }

    /// Transitions to CLOSED; only a fresh open revives the database.
    pub fn reset(&mut self) {
        self.state = DatabaseState::Closed;
    }

    fn gate(&self) -> Result<()> {
        match self.state {
            DatabaseState::Created | DatabaseState::InWork => Ok(()),
            state => InvalidStateSnafu { state }.fail(),
        }
    }

    fn touch(&mut self) {
        if self.state == DatabaseState::Created {
            self.state = DatabaseState::InWork;
        }
    }

    pub fn contains_table(&self, name: &str) -> Result<bool> {
        identifier(name)?;
        self.gate()?;
        Ok(self.tables.contains_key(name))
    }

    pub fn get_table(&self, name: &str) -> Result<&Table> {
        identifier(name)?;
        self.gate()?;
        match self.tables.get(name) {
            Some(table) => Ok(table),
            None => NotFoundSnafu {
                entity: Entity::Table,
                name,
            }
            .fail(),
        }
    }

    pub fn create_table(&mut self, name: &str, columns: &[ColumnSpec]) -> Result<()> {
        let name = identifier(name)?;
        self.gate()?;
        if self.tables.contains_key(&name) {
            return AlreadyExistsSnafu {
                entity: Entity::Table,
                name,
            }
            .fail();
        }
        let mut table = Table::new();
        for spec in columns {
            table.create_column(spec.clone())?;
        }
        debug!(table = %name, columns = columns.len(), "created table");
        self.tables.insert(name, table);
        self.touch();
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<Table> {
        identifier(name)?;
        self.gate()?;
        match self.tables.remove(name) {
            Some(table) => {
                debug!(table = %name, "dropped table");
                self.touch();
                Ok(table)
            }
            None => NotFoundSnafu {
                entity: Entity::Table,
                name,
            }
            .fail(),
        }
    }

    pub fn rename_table(&mut self, old: &str, new: &str) -> Result<()> {
        identifier(old)?;
        let new = identifier(new)?;
        self.gate()?;
        if self.tables.contains_key(&new) {
            return AlreadyExistsSnafu {
                entity: Entity::Table,
                name: new,
            }
            .fail();
        }
        match self.tables.remove(old) {
            Some(table) => {
                self.tables.insert(new, table);
                self.touch();
                Ok(())
            }
            None => NotFoundSnafu {
                entity: Entity::Table,
                name: old,
            }
            .fail(),
        }
    }

    /// Applies the three ALTER phases in order: add new columns, modify
    /// existing ones, drop columns or constraints. Any phase failure
    /// aborts the whole alter with no partial schema change.
    pub fn alter_table(
        &mut self,
        name: &str,
        new_columns: &[ColumnSpec],
        modified: &[ModifySpec],
        dropped: &[DropTarget],
    ) -> Result<()> {
        identifier(name)?;
        self.gate()?;
        let original = match self.tables.get(name) {
            Some(table) => table.clone(),
            None => {
                return NotFoundSnafu {
                    entity: Entity::Table,
                    name,
                }
                .fail()
            }
        };

        let work = {
            let probe = |parent: &str, value: &Value| self.pk_contains(parent, value);
            let mut work = original;
            for spec in new_columns {
                work.create_column(spec.clone())?;
            }
            for spec in modified {
                match spec {
                    ModifySpec::Retype { column, data_type } => {
                        work.modify_type(column, *data_type)?;
                    }
                    ModifySpec::Constrain {
                        column,
                        constraints,
                    } => {
                        work.modify_constraints(column, constraints.clone(), &probe)?;
                    }
                }
            }
            for target in dropped {
                match target {
                    DropTarget::Column { column } => {
                        work.drop_column(column)?;
                    }
                    DropTarget::ConstraintKind { column, kind } => {
                        work.drop_constraints_of_kind(column, *kind)?;
                    }
                    DropTarget::ConstraintNamed { column, name } => {
                        work.drop_constraint_named(column, name)?;
                    }
                }
            }
            work
        };

        debug!(table = %name, "altered table");
        self.tables.insert(name.to_string(), work);
        self.touch();
        Ok(())
    }

    /// Inserts `rows` into `name`. The whole statement is atomic: it runs
    /// against a working copy that only replaces the live table when every
    /// row validated.
    pub fn insert(&mut self, name: &str, columns: &[String], rows: &[Vec<Value>]) -> Result<()> {
        identifier(name)?;
        self.gate()?;
        let original = match self.tables.get(name) {
            Some(table) => table.clone(),
            None => {
                return NotFoundSnafu {
                    entity: Entity::Table,
                    name,
                }
                .fail()
            }
        };

        let work = {
            let probe = |parent: &str, value: &Value| self.pk_contains(parent, value);
            let mut work = original;
            for row in rows {
                work.insert(columns, row, &probe)?;
            }
            work
        };

        debug!(table = %name, rows = rows.len(), "inserted rows");
        self.tables.insert(name.to_string(), work);
        self.touch();
        Ok(())
    }

    /// Updates matching rows, atomically across the whole statement.
    pub fn update(
        &mut self,
        name: &str,
        assignments: &[Assignment],
        cond: Option<&CondExpr>,
    ) -> Result<usize> {
        identifier(name)?;
        self.gate()?;
        let original = match self.tables.get(name) {
            Some(table) => table.clone(),
            None => {
                return NotFoundSnafu {
                    entity: Entity::Table,
                    name,
                }
                .fail()
            }
        };

        let (work, touched) = {
            let probe = |parent: &str, value: &Value| self.pk_contains(parent, value);
            let mut work = original;
            let touched = work.update(assignments, cond, &probe)?;
            (work, touched)
        };

        debug!(table = %name, rows = touched, "updated rows");
        self.tables.insert(name.to_string(), work);
        self.touch();
        Ok(touched)
    }

    pub fn delete(&mut self, name: &str, cond: Option<&CondExpr>) -> Result<usize> {
        identifier(name)?;
        self.gate()?;
        let table = match self.tables.get_mut(name) {
            Some(table) => table,
            None => {
                return NotFoundSnafu {
                    entity: Entity::Table,
                    name,
                }
                .fail()
            }
        };
        let removed = table.delete(cond)?;
        debug!(table = %name, rows = removed, "deleted rows");
        self.touch();
        Ok(removed)
    }

    pub fn select(
        &self,
        name: &str,
        columns: Option<&[String]>,
        cond: Option<&CondExpr>,
    ) -> Result<Response> {
        self.get_table(name)?.select(columns, cond)
    }

    /// Replaces all tables with those of `other`, by value.
    pub fn restore(&mut self, other: Database) -> Result<()> {
        self.gate()?;
        self.tables = other.tables;
        Ok(())
    }

    /// Writes the whole-image serialization of this database to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.gate()?;
        persistence::save(self, path)
    }

    /// Whether `parent`'s primary-key column contains `value`.
    fn pk_contains(&self, parent: &str, value: &Value) -> Result<bool> {
        let table = match self.tables.get(parent) {
            Some(table) => table,
            None => {
                return NotFoundSnafu {
                    entity: Entity::Table,
                    name: parent,
                }
                .fail()
            }
        };
        let column = match table.primary_key_column() {
            Some(column) => column,
            None => {
                return NotFoundSnafu {
                    entity: Entity::Constraint,
                    name: format!("primary key of table '{}'", parent),
                }
                .fail()
            }
        };
        Ok(column.body().iter().any(|v| v == value))
    }

    // Raw table access for command undo: pre-images are restored verbatim,
    // outside the state gate.
    pub(crate) fn put_table(&mut self, name: String, table: Table) {
        self.tables.insert(name, table);
    }

    pub(crate) fn remove_table(&mut self, name: &str) {
        self.tables.remove(name);
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_file_path(&mut self, path: PathBuf) {
        self.file_path = path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{parse_column_def, parse_drop_spec, parse_modify_spec};
    use crate::sql::parse_condition;

    fn specs(defs: &[&str]) -> Vec<ColumnSpec> {
        defs.iter().map(|d| parse_column_def(d).unwrap()).collect()
    }

    fn test_db() -> Database {
        Database::new("test_db", PathBuf::from("test_db.qdb"))
    }

    #[test]
    fn state_gate_blocks_closed_database() {
        let mut db = test_db();
        db.reset();
        let err = db.create_table("t", &specs(&["id INTEGER"])).unwrap_err();
        assert!(err.to_string().contains("CLOSED"));
    }

    #[test]
    fn first_mutation_moves_created_to_in_work() {
        let mut db = test_db();
        assert_eq!(db.state(), DatabaseState::Created);
        db.create_table("t", &specs(&["id INTEGER"])).unwrap();
        assert_eq!(db.state(), DatabaseState::InWork);
    }

    #[test]
    fn tables_enumerate_in_name_order() {
        let mut db = test_db();
        db.create_table("zeta", &specs(&["id INTEGER"])).unwrap();
        db.create_table("alpha", &specs(&["id INTEGER"])).unwrap();
        let names: Vec<&str> = db.tables().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn duplicate_table_creation_fails() {
        let mut db = test_db();
        db.create_table("t", &specs(&["id INTEGER"])).unwrap();
        assert!(db.create_table("t", &specs(&["id INTEGER"])).is_err());
    }

    #[test]
    fn rename_table_moves_the_entry() {
        let mut db = test_db();
        db.create_table("old_name", &specs(&["id INTEGER"])).unwrap();
        db.rename_table("old_name", "new_name").unwrap();
        assert!(db.contains_table("new_name").unwrap());
        assert!(!db.contains_table("old_name").unwrap());
    }

    #[test]
    fn alter_is_all_or_nothing() {
        let mut db = test_db();
        db.create_table("t", &specs(&["id INTEGER"])).unwrap();

        // Add succeeds but drop names a missing column: nothing changes.
        let err = db.alter_table(
            "t",
            &specs(&["age INTEGER"]),
            &[],
            &[parse_drop_spec("ghost").unwrap()],
        );
        assert!(err.is_err());
        assert!(!db.get_table("t").unwrap().contains_column("age"));
    }

    #[test]
    fn alter_phases_apply_in_order() {
        let mut db = test_db();
        db.create_table("t", &specs(&["id INTEGER", "tmp STRING"])).unwrap();
        db.alter_table(
            "t",
            &specs(&["age INTEGER"]),
            &[parse_modify_spec("age REAL").unwrap()],
            &[parse_drop_spec("tmp").unwrap()],
        )
        .unwrap();

        let table = db.get_table("t").unwrap();
        assert!(table.contains_column("age"));
        assert!(!table.contains_column("tmp"));
        assert_eq!(
            table.get_column("age").unwrap().data_type(),
            crate::types::DataType::Real
        );
    }

    #[test]
    fn multi_row_insert_is_atomic() {
        let mut db = test_db();
        db.create_table("t", &specs(&["id INTEGER PRIMARY KEY"])).unwrap();

        let err = db.insert(
            "t",
            &["id".to_string()],
            &[
                vec![Value::Int(1)],
                vec![Value::Int(1)], // duplicate within the batch
            ],
        );
        assert!(err.is_err());
        assert_eq!(db.get_table("t").unwrap().row_count(), 0);
    }

    #[test]
    fn foreign_key_resolves_through_parent_primary_key() {
        let mut db = test_db();
        db.create_table("users", &specs(&["id INTEGER PRIMARY KEY"])).unwrap();
        db.create_table(
            "orders",
            &specs(&["id INTEGER", "user_id INTEGER FOREIGN KEY REFERENCES users"]),
        )
        .unwrap();

        db.insert("users", &["id".to_string()], &[vec![Value::Int(1)]])
            .unwrap();
        db.insert(
            "orders",
            &["id".to_string(), "user_id".to_string()],
            &[vec![Value::Int(10), Value::Int(1)]],
        )
        .unwrap();

        let err = db.insert(
            "orders",
            &["id".to_string(), "user_id".to_string()],
            &[vec![Value::Int(11), Value::Int(99)]],
        );
        assert!(err.is_err());
        assert_eq!(db.get_table("orders").unwrap().row_count(), 1);
    }

    #[test]
    fn failed_update_leaves_table_unchanged() {
        let mut db = test_db();
        db.create_table("t", &specs(&["id INTEGER PRIMARY KEY", "age INTEGER"]))
            .unwrap();
        db.insert(
            "t",
            &["id".to_string(), "age".to_string()],
            &[vec![Value::Int(1), Value::Int(20)], vec![Value::Int(2), Value::Int(30)]],
        )
        .unwrap();
        let before = db.get_table("t").unwrap().clone();

        // Second row collides with the first on the primary key.
        let cond = parse_condition("age > 0").unwrap();
        let err = db.update(
            "t",
            &[Assignment {
                column: "id".into(),
                value: Value::Int(7),
            }],
            Some(&cond),
        );
        assert!(err.is_err());
        assert_eq!(db.get_table("t").unwrap(), &before);
    }

    #[test]
    fn restore_replaces_tables_by_value() {
        let mut db = test_db();
        db.create_table("t", &specs(&["id INTEGER"])).unwrap();
        db.insert("t", &["id".to_string()], &[vec![Value::Int(1)]])
            .unwrap();

        let backup = db.clone();
        db.insert("t", &["id".to_string()], &[vec![Value::Int(2)]])
            .unwrap();
        assert_eq!(db.get_table("t").unwrap().row_count(), 2);

        db.restore(backup).unwrap();
        assert_eq!(db.get_table("t").unwrap().row_count(), 1);
    }

    #[test]
    fn invalid_table_names_are_rejected() {
        let mut db = test_db();
        assert!(db.create_table("", &specs(&["id INTEGER"])).is_err());
        assert!(db.create_table("bad name", &specs(&["id INTEGER"])).is_err());
    }
}
