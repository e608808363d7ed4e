//! End-to-end scenarios driven through the engine façade.

use std::path::Path;

use quilldb::{DbError, Engine, EngineConfig, OutputKind, Value};
use tempfile::tempdir;

fn engine_in(dir: &Path) -> Engine {
    Engine::with_config(EngineConfig {
        data_root: dir.to_path_buf(),
        output_path: dir.join("query_output.txt"),
    })
}

fn employees_engine(dir: &Path) -> Engine {
    let engine = engine_in(dir);
    engine.create_database("company", None).unwrap();
    engine
        .create_table(
            "employees",
            &[
                "id INTEGER PRIMARY KEY",
                "name STRING UNIQUE",
                "age INTEGER NOT NULL CHECK (age >= 18)",
            ],
        )
        .unwrap();
    engine
        .insert(
            "employees",
            &["id", "name", "age"],
            vec![
                vec![Value::Int(1), Value::Str("John".into()), Value::Int(30)],
                vec![Value::Int(2), Value::Str("Alice".into()), Value::Int(25)],
            ],
        )
        .unwrap();
    engine
}

#[test]
fn create_insert_select_returns_rows_in_insertion_order() {
    let dir = tempdir().unwrap();
    let engine = employees_engine(dir.path());

    engine.select("employees").unwrap();
    let rows = engine.last_select().unwrap();

    assert_eq!(rows.row_count(), 2);
    assert_eq!(rows.get("id", 0), Some(&Value::Int(1)));
    assert_eq!(rows.get("name", 0), Some(&Value::Str("John".into())));
    assert_eq!(rows.get("age", 0), Some(&Value::Int(30)));
    assert_eq!(rows.get("id", 1), Some(&Value::Int(2)));
    assert_eq!(rows.get("name", 1), Some(&Value::Str("Alice".into())));
}

#[test]
fn check_constraint_rejects_and_names_itself() {
    let dir = tempdir().unwrap();
    let engine = employees_engine(dir.path());

    let err = engine
        .insert(
            "employees",
            &["id", "name", "age"],
            vec![vec![Value::Int(3), Value::Str("Petra".into()), Value::Int(15)]],
        )
        .unwrap_err();

    match err {
        DbError::ConstraintViolation { constraint, column, .. } => {
            assert_eq!(constraint, "age_check_constraint");
            assert_eq!(column, "age");
        }
        other => panic!("expected a constraint violation, got {:?}", other),
    }

    engine.select("employees").unwrap();
    assert_eq!(engine.last_select().unwrap().row_count(), 2);
}

#[test]
fn dropping_the_check_constraint_admits_the_row() {
    let dir = tempdir().unwrap();
    let engine = employees_engine(dir.path());

    engine
        .alter_table("employees", None, None, Some(&["age age_check_constraint"]))
        .unwrap();
    engine
        .insert(
            "employees",
            &["id", "name", "age"],
            vec![vec![Value::Int(4), Value::Str("Tom".into()), Value::Int(15)]],
        )
        .unwrap();

    engine.select("employees").unwrap();
    assert_eq!(engine.last_select().unwrap().row_count(), 3);
}

#[test]
fn transaction_commit_applies_the_update_and_grows_history_by_one() {
    let dir = tempdir().unwrap();
    let engine = employees_engine(dir.path());
    let history_before = engine.history_len();

    engine.begin().unwrap();
    engine
        .update("employees", &["age = 18"], "id = 1")
        .unwrap();
    engine.commit().unwrap();

    engine.select_where("employees", &["age"], "id = 1").unwrap();
    assert_eq!(
        engine.last_select().unwrap().get("age", 0),
        Some(&Value::Int(18))
    );
    assert_eq!(engine.history_len(), history_before + 1);
}

#[test]
fn transaction_rollback_restores_the_pre_begin_state() {
    let dir = tempdir().unwrap();
    let engine = engine_in(dir.path());
    engine.create_database("rollback_db", None).unwrap();
    engine
        .create_table("test_table", &["id INTEGER", "name STRING"])
        .unwrap();
    engine
        .insert(
            "test_table",
            &["id", "name"],
            vec![
                vec![Value::Int(1), Value::Str("a".into())],
                vec![Value::Int(2), Value::Str("b".into())],
            ],
        )
        .unwrap();

    engine.begin().unwrap();
    engine
        .insert(
            "test_table",
            &["id", "name"],
            vec![vec![Value::Int(3), Value::Str("c".into())]],
        )
        .unwrap();
    engine
        .insert(
            "test_table",
            &["id", "name"],
            vec![vec![Value::Int(4), Value::Str("d".into())]],
        )
        .unwrap();
    engine.rollback().unwrap();

    engine.select("test_table").unwrap();
    let rows = engine.last_select().unwrap();
    assert_eq!(rows.row_count(), 2);
    assert_eq!(rows.get("id", 0), Some(&Value::Int(1)));
    assert_eq!(rows.get("id", 1), Some(&Value::Int(2)));

    // The snapshot is consumed by the rollback.
    let snapshot = dir
        .path()
        .join("rollback_db")
        .join("rollback_db.txsnap");
    assert!(!snapshot.exists());
}

#[test]
fn undo_chain_walks_history_back_to_empty() {
    let dir = tempdir().unwrap();
    let engine = engine_in(dir.path());
    engine.create_database("undo_db", None).unwrap();

    engine
        .create_table("users", &["id INTEGER", "name STRING"])
        .unwrap();
    engine
        .alter_table("users", Some(&["age INTEGER"]), None, None)
        .unwrap();
    engine.drop("users", false).unwrap();
    assert_eq!(engine.history_len(), 3);

    // Undo the drop: the table is back, with the added column.
    engine.undo().unwrap();
    assert_eq!(engine.history_len(), 2);
    engine.select("users").unwrap();
    let columns: Vec<String> = engine
        .last_select()
        .unwrap()
        .column_names()
        .map(str::to_string)
        .collect();
    assert_eq!(columns, vec!["id", "name", "age"]);

    // Undo the alter: the column is gone again.
    engine.undo().unwrap();
    assert_eq!(engine.history_len(), 1);
    engine.select("users").unwrap();
    assert_eq!(engine.last_select().unwrap().column_count(), 2);

    // Undo the create: no table at all.
    engine.undo().unwrap();
    assert_eq!(engine.history_len(), 0);
    assert!(engine.select("users").is_err());

    // Undo on an empty history is a no-op.
    engine.undo().unwrap();
    assert_eq!(engine.history_len(), 0);
}

#[test]
fn undo_reverses_dml_in_place() {
    let dir = tempdir().unwrap();
    let engine = employees_engine(dir.path());

    engine.update("employees", &["age = 40"], "id = 2").unwrap();
    engine.delete("employees", "id = 1").unwrap();

    engine.undo().unwrap(); // delete
    engine.undo().unwrap(); // update

    engine.select("employees").unwrap();
    let rows = engine.last_select().unwrap();
    assert_eq!(rows.row_count(), 2);
    assert_eq!(rows.get("age", 1), Some(&Value::Int(25)));
}

#[test]
fn select_with_conditions_and_projection() {
    let dir = tempdir().unwrap();
    let engine = employees_engine(dir.path());

    engine
        .select_where("employees", &["name"], "age > 20 AND name LIKE 'A%'")
        .unwrap();
    let rows = engine.last_select().unwrap();
    assert_eq!(rows.row_count(), 1);
    assert_eq!(rows.get("name", 0), Some(&Value::Str("Alice".into())));

    engine.select_columns("employees", &["age", "id"]).unwrap();
    let rows = engine.last_select().unwrap();
    let columns: Vec<String> = rows.column_names().map(str::to_string).collect();
    assert_eq!(columns, vec!["age", "id"]);
}

#[test]
fn print_writes_the_last_select_to_a_file() {
    let dir = tempdir().unwrap();
    let engine = employees_engine(dir.path());

    engine.select("employees").unwrap();
    let out = dir.path().join("out.txt");
    engine.print(OutputKind::File, Some(&out)).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("| id | name  | age |"));
    assert!(text.contains("John"));
    assert!(text.contains("Alice"));
}

#[test]
fn unknown_table_and_invalid_condition_errors() {
    let dir = tempdir().unwrap();
    let engine = employees_engine(dir.path());

    assert!(matches!(
        engine.select("ghost").unwrap_err(),
        DbError::NotFound { .. }
    ));
    assert!(matches!(
        engine.delete("employees", "invalid_condition").unwrap_err(),
        DbError::Parse { .. }
    ));
    assert!(matches!(
        engine.update("employees", &["age = 1"], "invalid_condition").unwrap_err(),
        DbError::Parse { .. }
    ));
}
