//! # Command Layer
//!
//! Every engine operation is a `Command`: a sum type whose variants carry
//! their arguments and, for the mutating ones, the pre-image captured at
//! execution time. The contract is
//!
//! - `execute(state) -> Result<bool>` — `true` means the command is
//!   *historical* and belongs on the undo stack;
//! - `undo(state) -> Result<()>` — restores the captured pre-image.
//!
//! DDL and DML capture the touched table by value before mutating (drop
//! of a whole database captures the database). BEGIN/COMMIT/ROLLBACK are
//! never historical — the transaction snapshot file carries their
//! reversibility — and neither are the non-mutating commands (help, show,
//! open, select).
//!
//! Conditions and column definitions arrive already parsed; undo never
//! re-parses text.

use std::fs;
use std::path::{Path, PathBuf};

use snafu::{ensure, ResultExt};
use tracing::debug;

use crate::database::{persistence, Database};
use crate::engine::EngineState;
use crate::error::{AlreadyExistsSnafu, Entity, IoSnafu, NotFoundSnafu, Result};
use crate::help;
use crate::parsing::{identifier, ColumnSpec, DropTarget, ModifySpec};
use crate::response::Response;
use crate::schema::{Assignment, Table};
use crate::sql::CondExpr;
use crate::types::Value;

/// Captured pre-state of one table; `None` means the table did not exist.
#[derive(Debug, Clone)]
pub struct PreImage {
    pub table: String,
    pub state: Option<Table>,
}

#[derive(Debug)]
pub enum Command {
    Open {
        name: String,
        path: Option<PathBuf>,
    },
    ShowDatabases {
        path: Option<PathBuf>,
    },
    ShowTables,
    Help {
        topic: Option<String>,
    },
    CreateDatabase {
        name: String,
        path: Option<PathBuf>,
    },
    CreateTable {
        table: String,
        columns: Vec<ColumnSpec>,
        pre: Option<PreImage>,
    },
    AlterTable {
        table: String,
        new_columns: Vec<ColumnSpec>,
        modified: Vec<ModifySpec>,
        dropped: Vec<DropTarget>,
        pre: Option<PreImage>,
    },
    RenameTable {
        old: String,
        new: String,
    },
    RenameDatabase {
        old: String,
        new: String,
    },
    DropTable {
        table: String,
        pre: Option<PreImage>,
    },
    DropDatabase {
        name: String,
        pre: Option<Box<Database>>,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        pre: Option<PreImage>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        condition: CondExpr,
        pre: Option<PreImage>,
    },
    Delete {
        table: String,
        condition: CondExpr,
        pre: Option<PreImage>,
    },
    Select {
        table: String,
        columns: Option<Vec<String>>,
        condition: Option<CondExpr>,
    },
    Begin,
    Commit,
    Rollback,
}

impl Command {
    /// Transaction-control commands are never deferred and never queued.
    pub fn is_tcl(&self) -> bool {
        matches!(self, Command::Begin | Command::Commit | Command::Rollback)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Open { .. } => "open",
            Command::ShowDatabases { .. } => "show_databases",
            Command::ShowTables => "show_tables",
            Command::Help { .. } => "help",
            Command::CreateDatabase { .. } => "create_database",
            Command::CreateTable { .. } => "create_table",
            Command::AlterTable { .. } => "alter_table",
            Command::RenameTable { .. } => "rename_table",
            Command::RenameDatabase { .. } => "rename_database",
            Command::DropTable { .. } => "drop_table",
            Command::DropDatabase { .. } => "drop_database",
            Command::Insert { .. } => "insert",
            Command::Update { .. } => "update",
            Command::Delete { .. } => "delete",
            Command::Select { .. } => "select",
            Command::Begin => "begin",
            Command::Commit => "commit",
            Command::Rollback => "rollback",
        }
    }

    /// Runs the command against the engine state. Returns true iff the
    /// command should be pushed onto the undo stack.
    pub fn execute(&mut self, state: &mut EngineState) -> Result<bool> {
        match self {
            Command::Open { name, path } => {
                let file = state.config.database_file(path.as_deref(), name);
                let db = persistence::load(&file)?;
                debug!(database = %db.name(), "opened database");
                state.database = Some(db);
                Ok(false)
            }

            Command::ShowDatabases { path } => {
                let root = path
                    .clone()
                    .unwrap_or_else(|| state.config.data_root.clone());
                state.last_select = Some(list_databases(&root)?);
                Ok(false)
            }

            Command::ShowTables => {
                let db = state.database()?;
                let mut response = Response::new();
                response.push_column(
                    "table".to_string(),
                    db.tables().keys().cloned().map(Value::Str).collect(),
                );
                state.last_select = Some(response);
                Ok(false)
            }

            Command::Help { topic } => {
                let text = help::render(topic.as_deref())?;
                println!("{}", text);
                Ok(false)
            }

            Command::CreateDatabase { name, path } => {
                let dir = state.config.database_dir(path.as_deref(), name);
                ensure!(
                    !dir.exists(),
                    AlreadyExistsSnafu {
                        entity: Entity::Database,
                        name: name.clone(),
                    }
                );
                let file = state.config.database_file(path.as_deref(), name);
                let db = Database::new(name.clone(), file.clone());
                db.save(&file)?;
                debug!(database = %name, path = %file.display(), "created database");
                state.database = Some(db);
                Ok(false)
            }

            Command::CreateTable {
                table,
                columns,
                pre,
            } => {
                let db = state.database_mut()?;
                *pre = Some(PreImage {
                    table: table.clone(),
                    state: db.tables().get(table).cloned(),
                });
                db.create_table(table, columns)?;
                Ok(true)
            }

            Command::AlterTable {
                table,
                new_columns,
                modified,
                dropped,
                pre,
            } => {
                let db = state.database_mut()?;
                *pre = Some(PreImage {
                    table: table.clone(),
                    state: db.tables().get(table).cloned(),
                });
                db.alter_table(table, new_columns, modified, dropped)?;
                Ok(true)
            }

            Command::RenameTable { old, new } => {
                state.database_mut()?.rename_table(old, new)?;
                Ok(true)
            }

            Command::RenameDatabase { old, new } => {
                state.rename_database(old, new)?;
                Ok(true)
            }

            Command::DropTable { table, pre } => {
                let db = state.database_mut()?;
                let dropped = db.drop_table(table)?;
                *pre = Some(PreImage {
                    table: table.clone(),
                    state: Some(dropped),
                });
                Ok(true)
            }

            Command::DropDatabase { name, pre } => {
                let db = state.database()?;
                ensure!(
                    db.name() == name.as_str(),
                    NotFoundSnafu {
                        entity: Entity::Database,
                        name: name.clone(),
                    }
                );
                *pre = Some(Box::new(db.clone()));
                let dir = db.file_path().parent().map(Path::to_path_buf);
                if let Some(dir) = dir {
                    if dir.exists() {
                        fs::remove_dir_all(&dir).context(IoSnafu {
                            message: format!("failed to remove {}", dir.display()),
                        })?;
                    }
                }
                debug!(database = %name, "dropped database");
                state.database = None;
                Ok(true)
            }

            Command::Insert {
                table,
                columns,
                rows,
                pre,
            } => {
                let db = state.database_mut()?;
                *pre = Some(PreImage {
                    table: table.clone(),
                    state: db.tables().get(table).cloned(),
                });
                db.insert(table, columns, rows)?;
                Ok(true)
            }

            Command::Update {
                table,
                assignments,
                condition,
                pre,
            } => {
                let db = state.database_mut()?;
                *pre = Some(PreImage {
                    table: table.clone(),
                    state: db.tables().get(table).cloned(),
                });
                db.update(table, assignments, Some(&*condition))?;
                Ok(true)
            }

            Command::Delete {
                table,
                condition,
                pre,
            } => {
                let db = state.database_mut()?;
                *pre = Some(PreImage {
                    table: table.clone(),
                    state: db.tables().get(table).cloned(),
                });
                db.delete(table, Some(&*condition))?;
                Ok(true)
            }

            Command::Select {
                table,
                columns,
                condition,
            } => {
                let db = state.database()?;
                let response = db.select(table, columns.as_deref(), condition.as_ref())?;
                state.last_select = Some(response);
                Ok(false)
            }

            Command::Begin => {
                state.begin_txn()?;
                Ok(false)
            }
            Command::Commit => {
                state.commit_txn()?;
                Ok(false)
            }
            Command::Rollback => {
                state.rollback_txn()?;
                Ok(false)
            }
        }
    }

    /// Restores the pre-image captured by `execute`. Only historical
    /// commands ever reach the undo stack; for the rest this is a no-op.
    pub fn undo(&mut self, state: &mut EngineState) -> Result<()> {
        match self {
            Command::CreateTable { pre, .. }
            | Command::AlterTable { pre, .. }
            | Command::DropTable { pre, .. }
            | Command::Insert { pre, .. }
            | Command::Update { pre, .. }
            | Command::Delete { pre, .. } => restore_pre_image(state, pre),

            Command::RenameTable { old, new } => {
                state.database_mut()?.rename_table(new, old)
            }

            Command::RenameDatabase { old, new } => state.rename_database(new, old),

            Command::DropDatabase { pre, .. } => {
                let Some(db) = pre.take() else {
                    return Ok(());
                };
                persistence::save(&db, db.file_path())?;
                debug!(database = %db.name(), "restored dropped database");
                state.database = Some(*db);
                Ok(())
            }

            Command::Open { .. }
            | Command::ShowDatabases { .. }
            | Command::ShowTables
            | Command::Help { .. }
            | Command::CreateDatabase { .. }
            | Command::Select { .. }
            | Command::Begin
            | Command::Commit
            | Command::Rollback => Ok(()),
        }
    }
}

fn restore_pre_image(state: &mut EngineState, pre: &mut Option<PreImage>) -> Result<()> {
    let Some(image) = pre.take() else {
        return Ok(());
    };
    let db = state.database_mut()?;
    match image.state {
        Some(table) => db.put_table(image.table, table),
        None => db.remove_table(&image.table),
    }
    Ok(())
}

fn list_databases(root: &Path) -> Result<Response> {
    let entries = fs::read_dir(root).context(IoSnafu {
        message: format!("failed to list databases under {}", root.display()),
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.context(IoSnafu {
            message: format!("failed to list databases under {}", root.display()),
        })?;
        if entry.path().is_dir() {
            if let Ok(name) = identifier(&entry.file_name().to_string_lossy()) {
                names.push(name);
            }
        }
    }
    names.sort();

    let mut response = Response::new();
    response.push_column("database".to_string(), names.into_iter().map(Value::Str).collect());
    Ok(response)
}
