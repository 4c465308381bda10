use std::collections::HashMap;

use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::error::RegistryError;
use super::models::{FileRecord, FileStatus};
use super::tables::*;

/// Upper bound on ids accepted by one bulk status update.
pub const MAX_BULK_FILE_IDS: usize = 1000;

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a file record and update the slug and owner indexes
    pub fn put_file(&self, file: &FileRecord) -> Result<(), RegistryError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(!file.slug.is_empty(), "file slug must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut slug_table = write_txn.open_table(FILE_SLUGS)?;
            if let Some(existing) = slug_table.get(file.slug.as_str())? {
                if existing.value() != file.id.as_str() {
                    return Err(RegistryError::Validation(format!(
                        "slug '{}' is already in use",
                        file.slug
                    )));
                }
            }
            slug_table.insert(file.slug.as_str(), file.id.as_str())?;

            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;

            // Maintain owner index
            let mut owner_table = write_txn.open_table(OWNER_FILES)?;
            let mut file_ids: Vec<String> = owner_table
                .get(file.owner_id.as_str())?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();

            if !file_ids.contains(&file.id) {
                file_ids.push(file.id.clone());
                let index_data = rmp_serde::to_vec_named(&file_ids)?;
                owner_table.insert(file.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its UUID
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get a file by its slug (resolves slug -> uuid -> file)
    pub fn get_file_by_slug(&self, slug: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let slug_table = read_txn.open_table(FILE_SLUGS)?;

        let id = match slug_table.get(slug)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let files_table = read_txn.open_table(FILES)?;
        match files_table.get(id.as_str())? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get all files for an owner
    pub fn files_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// List an owner's files with an optional status filter
    pub fn list_files(
        &self,
        owner_id: &str,
        status: Option<FileStatus>,
    ) -> Result<Vec<FileRecord>, DatabaseError> {
        let all = self.files_by_owner(owner_id)?;

        match status {
            Some(s) => Ok(all.into_iter().filter(|f| f.file_status == s).collect()),
            None => Ok(all),
        }
    }

    /// Partial metadata update: display name, metadata map, and tags. The
    /// slug is fixed at creation and does not follow name changes.
    pub fn update_file_metadata(
        &self,
        id: &str,
        name: Option<&str>,
        metadata: Option<&HashMap<String, serde_json::Value>>,
        tags: Option<&[String]>,
    ) -> Result<FileRecord, RegistryError> {
        if let Some(name) = name {
            if name.len() > 255 {
                return Err(RegistryError::Validation(
                    "file name must be at most 255 characters".to_string(),
                ));
            }
        }

        let write_txn = self.begin_write()?;

        let mut file = {
            let table = write_txn.open_table(FILES)?;
            let record = match table.get(id)? {
                Some(data) => rmp_serde::from_slice::<FileRecord>(data.value())?,
                None => return Err(RegistryError::NotFound("file not found".to_string())),
            };
            record
        };

        if let Some(name) = name {
            file.file_name = name.to_string();
        }
        if let Some(metadata) = metadata {
            file.file_metadata = metadata.clone();
        }
        if let Some(tags) = tags {
            file.file_tags = tags.to_vec();
        }
        file.updated_at = Utc::now();

        {
            let serialized = rmp_serde::to_vec_named(&file)?;
            let mut table = write_txn.open_table(FILES)?;
            table.insert(id, serialized.as_slice())?;
        }
        write_txn.commit()?;
        Ok(file)
    }

    /// Move a file along its status machine. Illegal transitions leave the
    /// record untouched.
    pub fn set_file_status(
        &self,
        id: &str,
        next: FileStatus,
    ) -> Result<FileRecord, RegistryError> {
        let write_txn = self.begin_write()?;

        let mut file = {
            let table = write_txn.open_table(FILES)?;
            let record = match table.get(id)? {
                Some(data) => rmp_serde::from_slice::<FileRecord>(data.value())?,
                None => return Err(RegistryError::NotFound("file not found".to_string())),
            };
            record
        };

        if !file.file_status.can_transition_to(next) {
            return Err(RegistryError::InvalidTransition {
                entity: "file",
                from: file.file_status.as_str(),
                to: next.as_str(),
            });
        }

        file.file_status = next;
        file.updated_at = Utc::now();

        {
            let serialized = rmp_serde::to_vec_named(&file)?;
            let mut table = write_txn.open_table(FILES)?;
            table.insert(id, serialized.as_slice())?;
        }
        write_txn.commit()?;
        Ok(file)
    }

    /// Set one target status on a batch of the owner's files. The whole
    /// batch fails if any id does not resolve, and the write is a single
    /// transaction. This path does not consult the per-transition table.
    pub fn bulk_set_file_status(
        &self,
        owner_id: &str,
        ids: &[String],
        status: FileStatus,
    ) -> Result<u64, RegistryError> {
        if ids.len() > MAX_BULK_FILE_IDS {
            return Err(RegistryError::Validation(format!(
                "at most {MAX_BULK_FILE_IDS} file ids per batch"
            )));
        }

        // Read phase: every id must resolve to a file of this owner.
        let mut files = Vec::with_capacity(ids.len());
        {
            let read_txn = self.begin_read()?;
            let table = read_txn.open_table(FILES)?;
            for id in ids {
                if let Some(data) = table.get(id.as_str())? {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    if file.owner_id == owner_id {
                        files.push(file);
                    }
                }
            }
        }
        if files.len() != ids.len() {
            return Err(RegistryError::Validation(format!(
                "{} of {} file ids could not be resolved",
                ids.len() - files.len(),
                ids.len()
            )));
        }

        let now = Utc::now();
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            for file in &mut files {
                file.file_status = status;
                file.updated_at = now;
                let serialized = rmp_serde::to_vec_named(file)?;
                table.insert(file.id.as_str(), serialized.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(files.len() as u64)
    }

    /// Check if a slug is already in use
    pub fn file_slug_exists(&self, slug: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILE_SLUGS)?;
        Ok(table.get(slug)?.is_some())
    }
}
