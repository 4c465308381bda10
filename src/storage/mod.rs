mod attachments;
pub mod db;
mod error;
mod files;
mod jobs;
pub mod models;
mod projects;
mod tables;
mod users;

pub use db::{Database, DatabaseError, PurgeStats};
pub use error::RegistryError;
pub use files::MAX_BULK_FILE_IDS;
pub use projects::{build_project_batch, ProjectOrder, ProjectQuery};
pub use tables::*;
