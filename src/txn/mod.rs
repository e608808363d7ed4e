//! # Transaction Manager
//!
//! Snapshot-backed transaction control:
//!
//! ```text
//! BEGIN ────► write whole-image snapshot, clear queue, active = true
//! (DML/DDL) ► enqueue; nothing touches the database yet
//! COMMIT ───► drain queue in FIFO order against the live database;
//!             first failure triggers an implicit ROLLBACK and surfaces
//!             the original error; success persists the image and
//!             deletes the snapshot
//! ROLLBACK ─► reload the snapshot, restore the database, clear queue
//! ```
//!
//! The snapshot is file-backed: atomicity rests on pre-state that
//! survives in-memory mutation of the live database. Between `begin` and
//! `commit`/`rollback` the snapshot path belongs exclusively to this
//! manager.
//!
//! Draining itself is orchestrated by the engine, which owns both the
//! queue's commands and the database they execute against.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use snafu::{ensure, ResultExt};
use tracing::info;

use crate::commands::Command;
use crate::database::{persistence, Database};
use crate::error::{IoSnafu, Result, TxAlreadyActiveSnafu, TxMisuseSnafu, TxNotActiveSnafu};

#[derive(Debug, Default)]
pub struct TxnManager {
    active: bool,
    snapshot_path: Option<PathBuf>,
    queue: VecDeque<Command>,
}

impl TxnManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Starts a transaction by snapshotting `db` to its sibling snapshot
    /// path.
    pub fn begin(&mut self, db: &Database) -> Result<()> {
        ensure!(!self.active, TxAlreadyActiveSnafu);
        let path = db.snapshot_path();
        persistence::save(db, &path)?;
        info!(snapshot = %path.display(), "transaction started");
        self.snapshot_path = Some(path);
        self.queue.clear();
        self.active = true;
        Ok(())
    }

    /// Stages a non-TCL command for the commit drain.
    pub fn enqueue(&mut self, command: Command) -> Result<()> {
        ensure!(self.active, TxNotActiveSnafu);
        ensure!(
            !command.is_tcl(),
            TxMisuseSnafu {
                message: format!(
                    "TCL command '{}' cannot be queued inside a transaction",
                    command.name()
                ),
            }
        );
        self.queue.push_back(command);
        Ok(())
    }

    pub fn require_active(&self) -> Result<()> {
        ensure!(self.active, TxNotActiveSnafu);
        Ok(())
    }

    /// Hands the staged commands to the engine for draining.
    pub fn take_queue(&mut self) -> VecDeque<Command> {
        std::mem::take(&mut self.queue)
    }

    /// Reloads the database image written at BEGIN.
    pub fn load_snapshot(&self) -> Result<Database> {
        match &self.snapshot_path {
            Some(path) => persistence::load(path),
            None => TxNotActiveSnafu.fail(),
        }
    }

    /// Ends a committed transaction: the snapshot is no longer needed.
    pub fn finish_commit(&mut self) -> Result<()> {
        self.remove_snapshot()?;
        self.active = false;
        self.queue.clear();
        info!("transaction committed");
        Ok(())
    }

    /// Ends a rolled-back transaction.
    pub fn finish_rollback(&mut self) -> Result<()> {
        self.remove_snapshot()?;
        self.active = false;
        self.queue.clear();
        info!("transaction rolled back");
        Ok(())
    }

    fn remove_snapshot(&mut self) -> Result<()> {
        if let Some(path) = self.snapshot_path.take() {
            if path.exists() {
                fs::remove_file(&path).context(IoSnafu {
                    message: format!(
                        "failed to remove transaction snapshot {}",
                        path.display()
                    ),
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_column_def;
    use tempfile::tempdir;

    fn db_in(dir: &Path) -> Database {
        let mut db = Database::new("txtest", dir.join("txtest.qdb"));
        db.create_table("t", &[parse_column_def("id INTEGER").unwrap()])
            .unwrap();
        db
    }

    #[test]
    fn begin_writes_the_snapshot() {
        let dir = tempdir().unwrap();
        let db = db_in(dir.path());
        let mut txn = TxnManager::new();

        txn.begin(&db).unwrap();
        assert!(txn.is_active());
        assert!(db.snapshot_path().exists());
    }

    #[test]
    fn begin_twice_fails() {
        let dir = tempdir().unwrap();
        let db = db_in(dir.path());
        let mut txn = TxnManager::new();

        txn.begin(&db).unwrap();
        let err = txn.begin(&db).unwrap_err();
        assert!(err.to_string().contains("already in progress"));
    }

    #[test]
    fn enqueue_requires_active_and_rejects_tcl() {
        let dir = tempdir().unwrap();
        let db = db_in(dir.path());
        let mut txn = TxnManager::new();

        assert!(txn.enqueue(Command::Begin).is_err());

        txn.begin(&db).unwrap();
        let err = txn.enqueue(Command::Commit).unwrap_err();
        assert!(err.to_string().contains("cannot be queued"));

        txn.enqueue(Command::ShowTables).unwrap();
        assert_eq!(txn.queue_len(), 1);
    }

    #[test]
    fn snapshot_roundtrips_through_load() {
        let dir = tempdir().unwrap();
        let db = db_in(dir.path());
        let mut txn = TxnManager::new();

        txn.begin(&db).unwrap();
        let restored = txn.load_snapshot().unwrap();
        assert_eq!(restored.tables(), db.tables());
    }

    #[test]
    fn finish_commit_removes_the_snapshot() {
        let dir = tempdir().unwrap();
        let db = db_in(dir.path());
        let mut txn = TxnManager::new();

        txn.begin(&db).unwrap();
        let snapshot = db.snapshot_path();
        txn.finish_commit().unwrap();
        assert!(!txn.is_active());
        assert!(!snapshot.exists());
    }
}
