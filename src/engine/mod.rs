//! # Engine Façade
//!
//! The `Engine` is the single entry point callers talk to. It owns the
//! open database, the transaction manager, the command history, and the
//! last select response, all behind one `parking_lot::Mutex`, so at any
//! moment at most one command is modifying any table.
//!
//! The façade implements no kernel logic itself: every method constructs
//! a `Command`, dispatches it, and records it on the history stack when
//! `execute` reports it as historical. While a transaction is active,
//! non-TCL commands are routed to the transaction manager's queue instead
//! of executing.
//!
//! ## Dispatch Rules
//!
//! ```text
//!                 ┌── txn active, non-TCL ──► enqueue (no execution)
//! method ► build ─┤
//!                 └── otherwise ───────────► execute
//!                                              │ true  ► push to history
//!                                              │ false ► done
//! ```
//!
//! `undo` pops the history stack and reverses the popped command; undo on
//! an empty stack is a no-op, not an error.

mod history;

pub use history::CommandHistory;

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::commands::Command;
use crate::config::{DB_FILE_EXT, DEFAULT_DATA_ROOT, DEFAULT_OUTPUT_FILE};
use crate::database::{persistence, Database, DatabaseState};
use crate::error::{
    AlreadyExistsSnafu, Entity, InvalidStateSnafu, IoSnafu, NotFoundSnafu, Result,
};
use crate::output::{print_response, OutputKind};
use crate::parsing::{
    identifier, parse_assignment, parse_column_def, parse_drop_spec, parse_modify_spec,
};
use crate::response::Response;
use crate::sql::parse_condition;
use crate::txn::TxnManager;
use crate::types::Value;

use snafu::{ensure, ResultExt};

/// Injected path configuration for an engine handle.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one subdirectory per database.
    pub data_root: PathBuf,
    /// Fallback path for `print(OutputKind::File, None)`.
    pub output_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }
}

impl EngineConfig {
    pub(crate) fn database_dir(&self, root: Option<&Path>, name: &str) -> PathBuf {
        root.unwrap_or(self.data_root.as_path()).join(name)
    }

    pub(crate) fn database_file(&self, root: Option<&Path>, name: &str) -> PathBuf {
        self.database_dir(root, name)
            .join(format!("{}.{}", name, DB_FILE_EXT))
    }
}

/// Everything the façade guards with its lock.
pub struct EngineState {
    pub(crate) config: EngineConfig,
    pub(crate) database: Option<Database>,
    pub(crate) txn: TxnManager,
    pub(crate) history: CommandHistory,
    pub(crate) last_select: Option<Response>,
}

impl EngineState {
    pub(crate) fn database(&self) -> Result<&Database> {
        match &self.database {
            Some(db) => Ok(db),
            None => InvalidStateSnafu {
                state: DatabaseState::Idle,
            }
            .fail(),
        }
    }

    pub(crate) fn database_mut(&mut self) -> Result<&mut Database> {
        match &mut self.database {
            Some(db) => Ok(db),
            None => InvalidStateSnafu {
                state: DatabaseState::Idle,
            }
            .fail(),
        }
    }

    fn run_and_record(&mut self, mut command: Command) -> Result<()> {
        debug!(command = command.name(), "executing command");
        if command.execute(self)? {
            self.history.push(command);
        }
        Ok(())
    }

    fn undo_last(&mut self) -> Result<()> {
        match self.history.pop() {
            None => Ok(()),
            Some(mut command) => {
                debug!(command = command.name(), "undoing command");
                command.undo(self)
            }
        }
    }

    pub(crate) fn begin_txn(&mut self) -> Result<()> {
        let db = match &self.database {
            Some(db) => db,
            None => {
                return InvalidStateSnafu {
                    state: DatabaseState::Idle,
                }
                .fail()
            }
        };
        self.txn.begin(db)
    }

    /// Drains the staged queue in FIFO order. The first failing command
    /// triggers an implicit rollback and resurfaces the original error;
    /// success persists the database image, removes the snapshot, and
    /// records the drained historical commands in execution order.
    pub(crate) fn commit_txn(&mut self) -> Result<()> {
        self.txn.require_active()?;
        let queue = self.txn.take_queue();
        debug!(commands = queue.len(), "committing transaction");

        let mut executed = Vec::new();
        for mut command in queue {
            match command.execute(self) {
                Ok(true) => executed.push(command),
                Ok(false) => {}
                Err(error) => {
                    warn!(
                        command = command.name(),
                        error = %error,
                        "command failed during commit, rolling back"
                    );
                    self.rollback_txn()?;
                    return Err(error);
                }
            }
        }

        if let Some(db) = &self.database {
            persistence::save(db, db.file_path())?;
        }
        self.txn.finish_commit()?;
        for command in executed {
            self.history.push(command);
        }
        Ok(())
    }

    pub(crate) fn rollback_txn(&mut self) -> Result<()> {
        self.txn.require_active()?;
        let snapshot = self.txn.load_snapshot()?;
        match &mut self.database {
            Some(db) => db.restore(snapshot)?,
            None => self.database = Some(snapshot),
        }
        self.txn.finish_rollback()
    }

    /// Renames the active database on disk and in memory.
    pub(crate) fn rename_database(&mut self, old: &str, new: &str) -> Result<()> {
        let new_name = identifier(new)?;
        let db = self.database_mut()?;
        ensure!(
            db.name() == old,
            NotFoundSnafu {
                entity: Entity::Database,
                name: old,
            }
        );

        let old_dir = match db.file_path().parent() {
            Some(dir) => dir.to_path_buf(),
            None => {
                return NotFoundSnafu {
                    entity: Entity::Database,
                    name: old,
                }
                .fail()
            }
        };
        let root = old_dir.parent().map(Path::to_path_buf).unwrap_or_default();
        let new_dir = root.join(&new_name);
        ensure!(
            !new_dir.exists(),
            AlreadyExistsSnafu {
                entity: Entity::Database,
                name: new_name.clone(),
            }
        );
        fs_rename(&old_dir, &new_dir)?;

        let old_file = new_dir.join(format!("{}.{}", old, DB_FILE_EXT));
        let new_file = new_dir.join(format!("{}.{}", new_name, DB_FILE_EXT));
        if old_file.exists() {
            fs_rename(&old_file, &new_file)?;
        }

        db.set_name(new_name);
        db.set_file_path(new_file);
        Ok(())
    }
}

fn fs_rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to).context(IoSnafu {
        message: format!("failed to rename {} to {}", from.display(), to.display()),
    })
}

/// The serialized engine handle. Obtain one from [`Engine::new`] or
/// [`Engine::with_config`]; a handle holds at most one open database.
pub struct Engine {
    state: Mutex<EngineState>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            state: Mutex::new(EngineState {
                config,
                database: None,
                txn: TxnManager::new(),
                history: CommandHistory::new(),
                last_select: None,
            }),
        }
    }

    /// Routes a command: queued while a transaction is active (TCL
    /// excepted), executed and recorded otherwise.
    fn dispatch(&self, command: Command) -> Result<()> {
        let mut state = self.state.lock();
        if state.txn.is_active() && !command.is_tcl() {
            debug!(command = command.name(), "queued in active transaction");
            return state.txn.enqueue(command);
        }
        state.run_and_record(command)
    }

    /// Opens an existing database from `<root>/<name>/<name>.qdb`.
    pub fn open(&self, name: &str, path: Option<&Path>) -> Result<()> {
        let name = identifier(name)?;
        self.dispatch(Command::Open {
            name,
            path: path.map(Path::to_path_buf),
        })
    }

    /// Lists the open database's tables into the last select response.
    pub fn show(&self) -> Result<()> {
        self.dispatch(Command::ShowTables)
    }

    /// Lists database directories under `path` (or the configured root).
    pub fn show_databases(&self, path: Option<&Path>) -> Result<()> {
        self.dispatch(Command::ShowDatabases {
            path: path.map(Path::to_path_buf),
        })
    }

    /// Prints the help catalog, or one entry.
    pub fn help(&self, topic: Option<&str>) -> Result<()> {
        self.dispatch(Command::Help {
            topic: topic.map(str::to_string),
        })
    }

    /// Creates a database directory and its initial whole-image file, and
    /// makes it the open database.
    pub fn create_database(&self, name: &str, path: Option<&Path>) -> Result<()> {
        let name = identifier(name)?;
        self.dispatch(Command::CreateDatabase {
            name,
            path: path.map(Path::to_path_buf),
        })
    }

    /// Creates a table from textual column definitions, e.g.
    /// `"id INTEGER PRIMARY KEY"`.
    pub fn create_table(&self, name: &str, column_defs: &[&str]) -> Result<()> {
        let columns = column_defs
            .iter()
            .map(|def| parse_column_def(def))
            .collect::<Result<Vec<_>>>()?;
        self.dispatch(Command::CreateTable {
            table: name.to_string(),
            columns,
            pre: None,
        })
    }

    /// Alters a table in up to three phases: add new columns, modify
    /// existing ones, drop columns or constraints. Each list is optional;
    /// phases apply in that order and any failure aborts the whole alter.
    pub fn alter_table(
        &self,
        name: &str,
        new_columns: Option<&[&str]>,
        modified: Option<&[&str]>,
        dropped: Option<&[&str]>,
    ) -> Result<()> {
        let new_columns = new_columns
            .unwrap_or(&[])
            .iter()
            .map(|def| parse_column_def(def))
            .collect::<Result<Vec<_>>>()?;
        let modified = modified
            .unwrap_or(&[])
            .iter()
            .map(|spec| parse_modify_spec(spec))
            .collect::<Result<Vec<_>>>()?;
        let dropped = dropped
            .unwrap_or(&[])
            .iter()
            .map(|spec| parse_drop_spec(spec))
            .collect::<Result<Vec<_>>>()?;
        self.dispatch(Command::AlterTable {
            table: name.to_string(),
            new_columns,
            modified,
            dropped,
            pre: None,
        })
    }

    /// Renames a table, or the open database when `is_database` is set.
    pub fn rename(&self, old: &str, new: &str, is_database: bool) -> Result<()> {
        if is_database {
            self.dispatch(Command::RenameDatabase {
                old: old.to_string(),
                new: new.to_string(),
            })
        } else {
            self.dispatch(Command::RenameTable {
                old: old.to_string(),
                new: new.to_string(),
            })
        }
    }

    /// Drops a table, or the open database when `is_database` is set.
    pub fn drop(&self, name: &str, is_database: bool) -> Result<()> {
        if is_database {
            self.dispatch(Command::DropDatabase {
                name: name.to_string(),
                pre: None,
            })
        } else {
            self.dispatch(Command::DropTable {
                table: name.to_string(),
                pre: None,
            })
        }
    }

    /// Inserts `rows` of values into the named `columns`. Omitted columns
    /// receive their DEFAULT, else Null.
    pub fn insert(&self, table: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Result<()> {
        self.dispatch(Command::Insert {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            pre: None,
        })
    }

    /// Applies `column = literal` assignments to every row matching
    /// `condition`.
    pub fn update(&self, table: &str, assignments: &[&str], condition: &str) -> Result<()> {
        let assignments = assignments
            .iter()
            .map(|a| parse_assignment(a))
            .collect::<Result<Vec<_>>>()?;
        let condition = parse_condition(condition)?;
        self.dispatch(Command::Update {
            table: table.to_string(),
            assignments,
            condition,
            pre: None,
        })
    }

    /// Deletes every row matching `condition`.
    pub fn delete(&self, table: &str, condition: &str) -> Result<()> {
        let condition = parse_condition(condition)?;
        self.dispatch(Command::Delete {
            table: table.to_string(),
            condition,
            pre: None,
        })
    }

    /// Selects all columns and rows.
    pub fn select(&self, table: &str) -> Result<()> {
        self.dispatch(Command::Select {
            table: table.to_string(),
            columns: None,
            condition: None,
        })
    }

    /// Selects named columns, all rows.
    pub fn select_columns(&self, table: &str, columns: &[&str]) -> Result<()> {
        self.dispatch(Command::Select {
            table: table.to_string(),
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
            condition: None,
        })
    }

    /// Selects named columns from rows matching `condition`.
    pub fn select_where(&self, table: &str, columns: &[&str], condition: &str) -> Result<()> {
        let condition = parse_condition(condition)?;
        self.dispatch(Command::Select {
            table: table.to_string(),
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
            condition: Some(condition),
        })
    }

    pub fn begin(&self) -> Result<()> {
        self.dispatch(Command::Begin)
    }

    pub fn commit(&self) -> Result<()> {
        self.dispatch(Command::Commit)
    }

    pub fn rollback(&self) -> Result<()> {
        self.dispatch(Command::Rollback)
    }

    /// Reverses the most recent historical command; no-op when the
    /// history is empty.
    pub fn undo(&self) -> Result<()> {
        self.state.lock().undo_last()
    }

    /// The materialized result of the most recent select.
    pub fn last_select(&self) -> Option<Response> {
        self.state.lock().last_select.clone()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn is_transaction_active(&self) -> bool {
        self.state.lock().txn.is_active()
    }

    /// Renders the last select response to the console or a file. Without
    /// a prior select this does nothing.
    pub fn print(&self, kind: OutputKind, path: Option<&Path>) -> Result<()> {
        let state = self.state.lock();
        match &state.last_select {
            None => Ok(()),
            Some(response) => print_response(response, kind, path, &state.config.output_path),
        }
    }
}
