use redb::{CommitError, Database, StorageError, TableError, TransactionError};
use rusqlite::Connection;
use thiserror::Error;

use crate::backend::redb_store::{COMMENTS, POSTS};

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
}

/// Creates the accounts schema. Safe to run against an existing database.
pub fn setup_users_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    log::debug!("Creating 'users' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            uid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            display_name TEXT,
            photo_url TEXT,
            created_at TEXT NOT NULL,
            last_login_time TEXT
        )",
        [],
    )?;
    tx.commit()?;
    Ok(())
}

/// Creates one table per document collection.
pub fn setup_documents_db(db: &Database) -> Result<(), SetupError> {
    let write_txn = db.begin_write()?;
    {
        log::debug!("Creating 'posts' table in Redb");
        write_txn.open_table(POSTS)?;

        log::debug!("Creating 'comments' table in Redb");
        write_txn.open_table(COMMENTS)?;
    }
    write_txn.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::ReadableTable;

    #[test]
    fn users_schema_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_users_db(&mut conn).unwrap();
        setup_users_db(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn documents_db_has_both_collections() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("documents.redb")).unwrap();
        setup_documents_db(&db).unwrap();

        let read_txn = db.begin_read().unwrap();
        assert_eq!(read_txn.open_table(POSTS).unwrap().len().unwrap(), 0);
        assert_eq!(read_txn.open_table(COMMENTS).unwrap().len().unwrap(), 0);
    }
}
