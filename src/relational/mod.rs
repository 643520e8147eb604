//! Relational Adapter (spec §4.1): a backend-uniform CRUD + transaction API
//! over either an embedded engine (this crate ships SQLite) or a networked
//! one. `SqliteStore` (see `sqlite.rs`) is the concrete embedded backend:
//! its `with_connection`/`with_transaction` are the adapter's `query`/
//! `insert`/`update`/`delete` and the `transaction(fn)` helper from the
//! spec, used directly by `crate::store` with typed SQL for the hot paths,
//! the way the teacher's `storage::queries` sits on top of
//! `storage::connection::Storage`.

mod migrations;
mod sqlite;

pub use migrations::SCHEMA_VERSION;
pub use sqlite::SqliteStore;

use crate::error::{MemoryError, Result};

/// Classify a `rusqlite` error into the taxonomy's `conflict` vs `database`
/// buckets (spec §4.1: "must distinguish unique-violation (-> conflict)...
/// and generic database errors").
pub fn classify_sqlite_error(err: rusqlite::Error) -> MemoryError {
    use rusqlite::Error as SqlErr;
    use rusqlite::ErrorCode;

    if let SqlErr::SqliteFailure(ref sqlite_err, ref msg) = err {
        if sqlite_err.code == ErrorCode::ConstraintViolation {
            return MemoryError::Conflict(
                msg.clone().unwrap_or_else(|| "constraint violation".to_string()),
            );
        }
    }
    MemoryError::Database {
        message: err.to_string(),
    }
}

/// Networked relational engine seam (spec §4.1: "an embedded engine...and a
/// networked engine"). No concrete remote backend ships by default (the
/// spec's Non-goals exclude distributed replication); this type exists so
/// callers can depend on `RelationalAdapter` uniformly and a test double can
/// stand in for a remote engine when exercising the compensating-action
/// contract (§4.2, §5).
pub struct RemoteAdapter;

impl RemoteAdapter {
    pub fn unconfigured() -> Result<Self> {
        Err(MemoryError::Configuration(
            "remote relational adapter is not implemented; configure an embedded backend".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_constraint_violation_as_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let insert_twice = store.with_connection(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
                rusqlite::params!["u1", "dup@example.com", "A", now, now],
            )?;
            let err = conn
                .execute(
                    "INSERT INTO users (id, email, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
                    rusqlite::params!["u2", "dup@example.com", "B", now, now],
                )
                .unwrap_err();
            Ok(classify_sqlite_error(err))
        });
        assert!(matches!(insert_twice.unwrap(), MemoryError::Conflict(_)));
    }

    #[test]
    fn remote_adapter_is_unconfigured_by_default() {
        assert!(RemoteAdapter::unconfigured().is_err());
    }
}
