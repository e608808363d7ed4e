//! # QuillDB - Embedded Relational Database with Undo
//!
//! QuillDB is an embedded, single-process relational database. It stores a
//! collection of named tables of typed, constrained rows and exposes a
//! programmatic command surface for schema definition (DDL), data
//! manipulation (DML), and transaction control (TCL), with linear undo of
//! the last committed command.
//!
//! ## Quick Start
//!
//! ```ignore
//! use quilldb::{Engine, Value};
//!
//! let engine = Engine::new();
//! engine.create_database("inventory", None)?;
//! engine.create_table("parts", &["id INTEGER PRIMARY KEY", "label STRING NOT NULL"])?;
//! engine.insert("parts", &["id", "label"], vec![vec![Value::Int(1), Value::Str("bolt".into())]])?;
//! engine.select("parts")?;
//! let rows = engine.last_select().unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Engine façade (engine)       │
//! ├─────────────────────────────────────┤
//! │  Commands (execute/undo) │ History  │
//! ├──────────────────────────┼──────────┤
//! │  Transaction manager     │ Response │
//! ├─────────────────────────────────────┤
//! │  Database (state machine, tables)   │
//! ├─────────────────────────────────────┤
//! │ Tables │ Columns │ Constraints │ SQL │
//! ├─────────────────────────────────────┤
//! │  Snapshot persistence (whole-image) │
//! └─────────────────────────────────────┘
//! ```
//!
//! Every mutating command captures a pre-image of the tables it touches
//! before applying itself, so the engine can reverse it later. Transactions
//! are bracketed by an on-disk whole-image snapshot: `begin` writes it,
//! `commit` drains the staged command queue against the live database, and
//! `rollback` restores the snapshot.
//!
//! ## File Layout
//!
//! ```text
//! data/
//! └── inventory/
//!     ├── inventory.qdb      # whole-image database file
//!     └── inventory.txsnap   # transaction snapshot (begin..commit only)
//! ```
//!
//! ## Module Overview
//!
//! - [`types`]: scalar values and column data types
//! - [`constraints`]: named column constraints and validation
//! - [`schema`]: column and table storage primitives
//! - [`database`]: database aggregate, lifecycle state machine, persistence
//! - [`sql`]: row-filter condition grammar and three-valued evaluation
//! - [`commands`]: invertible command objects
//! - [`txn`]: snapshot-backed transaction manager
//! - [`engine`]: the serialized façade callers talk to

pub mod commands;
pub mod config;
pub mod constraints;
pub mod database;
pub mod engine;
pub mod error;
pub mod help;
pub mod output;
pub mod parsing;
pub mod response;
pub mod schema;
pub mod sql;
pub mod txn;
pub mod types;

pub use engine::{Engine, EngineConfig};
pub use error::{DbError, Result};
pub use output::OutputKind;
pub use response::Response;
pub use types::{DataType, Value};
