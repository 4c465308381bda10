use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, ReadableTableMetadata,
    WriteTransaction,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

/// Statistics from a purge operation
#[derive(Debug, Default)]
pub struct PurgeStats {
    pub users: u64,
    pub files: u64,
    pub projects: u64,
    pub jobs: u64,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("memovault.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        // Initialize application tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(FILE_SLUGS)?;
            let _ = write_txn.open_table(OWNER_FILES)?;
            let _ = write_txn.open_table(PROJECTS)?;
            let _ = write_txn.open_table(PROJECT_SLUGS)?;
            let _ = write_txn.open_table(OWNER_PROJECTS)?;
            let _ = write_txn.open_table(PROJECT_FILES)?;
            let _ = write_txn.open_table(JOBS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    /// Purge all data - for testing only
    pub fn purge_all(&self) -> Result<PurgeStats, DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut stats = PurgeStats::default();

        {
            let users = write_txn.open_table(USERS)?;
            stats.users = users.len()?;
            let files = write_txn.open_table(FILES)?;
            stats.files = files.len()?;
            let projects = write_txn.open_table(PROJECTS)?;
            stats.projects = projects.len()?;
            let jobs = write_txn.open_table(JOBS)?;
            stats.jobs = jobs.len()?;
        }

        write_txn.delete_table(USERS)?;
        write_txn.delete_table(USER_EMAILS)?;
        write_txn.delete_table(FILES)?;
        write_txn.delete_table(FILE_SLUGS)?;
        write_txn.delete_table(OWNER_FILES)?;
        write_txn.delete_table(PROJECTS)?;
        write_txn.delete_table(PROJECT_SLUGS)?;
        write_txn.delete_table(OWNER_PROJECTS)?;
        write_txn.delete_table(PROJECT_FILES)?;
        write_txn.delete_table(JOBS)?;

        // Recreate empty tables so later transactions find them
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(FILE_SLUGS)?;
            let _ = write_txn.open_table(OWNER_FILES)?;
            let _ = write_txn.open_table(PROJECTS)?;
            let _ = write_txn.open_table(PROJECT_SLUGS)?;
            let _ = write_txn.open_table(OWNER_PROJECTS)?;
            let _ = write_txn.open_table(PROJECT_FILES)?;
            let _ = write_txn.open_table(JOBS)?;
        }

        write_txn.commit()?;
        Ok(stats)
    }
}
