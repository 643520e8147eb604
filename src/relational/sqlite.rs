//! Embedded relational engine: a WAL-mode SQLite connection behind a mutex,
//! grounded on the teacher's `storage::connection::Storage`.

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;

use super::migrations::run_migrations;
use crate::error::Result;

/// An embedded (single-process) relational store backed by SQLite.
///
/// Cheap to clone: the connection is shared behind an `Arc<Mutex<_>>`, the
/// same pattern the teacher uses so handles can be passed into async tasks
/// without re-opening the database.
#[derive(Clone)]
pub struct SqliteStore {
    db_path: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if necessary) the database at `db_path`, running any
    /// pending migrations.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Self::create_connection(db_path)?;
        run_migrations(&conn)?;
        Ok(Self {
            db_path: db_path.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn create_connection(db_path: &str) -> Result<Connection> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            Connection::open_with_flags(db_path, flags)?
        };

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=30000;
            PRAGMA foreign_keys=ON;
            PRAGMA temp_store=MEMORY;
            "#,
        )?;

        Ok(conn)
    }

    /// Run `f` with the shared connection. Holds the mutex for the
    /// duration of `f`; callers should not nest calls on the same store.
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`
    /// (spec §4.1: "rolls back on any thrown/returned error").
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}
