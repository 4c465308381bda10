//! memovault - multi-tenant backend for a research memory product
//!
//! This crate provides project and file lifecycle management with:
//! - Swappable object storage backends (local filesystem, GCS)
//! - redb embedded database for metadata (ACID, MVCC, crash-safe)
//! - Status state machines for files and projects, with soft deletion
//! - Many-to-many project/file attachments and batched bulk mutations
//! - Fire-and-forget dispatch of processing jobs (parse/embed/stats)
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod object_store;
pub mod slug;
pub mod storage;
pub mod tasks;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub dispatcher: Arc<dyn tasks::Dispatcher>,
    pub object_store: Arc<dyn object_store::ObjectStore>,
}
