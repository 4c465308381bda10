use thiserror::Error;

use super::db::DatabaseError;

/// Errors surfaced by registry operations, split along how callers recover:
/// bad input, missing/unowned rows, state-machine violations, and storage
/// failures that are not locally recoverable.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid {entity} status transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },
    #[error("{0}")]
    InvalidState(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<rmp_serde::encode::Error> for RegistryError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        RegistryError::Database(e.into())
    }
}

impl From<rmp_serde::decode::Error> for RegistryError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RegistryError::Database(e.into())
    }
}

impl From<redb::CommitError> for RegistryError {
    fn from(e: redb::CommitError) -> Self {
        RegistryError::Database(e.into())
    }
}

impl From<redb::StorageError> for RegistryError {
    fn from(e: redb::StorageError) -> Self {
        RegistryError::Database(e.into())
    }
}

impl From<redb::TableError> for RegistryError {
    fn from(e: redb::TableError) -> Self {
        RegistryError::Database(e.into())
    }
}

impl From<redb::TransactionError> for RegistryError {
    fn from(e: redb::TransactionError) -> Self {
        RegistryError::Database(e.into())
    }
}
