use chrono::Utc;
use redb::ReadableTable;

use super::db::Database;
use super::error::RegistryError;
use super::models::{FileRecord, FileStatus};
use super::tables::*;

impl Database {
    // ========================================================================
    // Project <-> File attachments
    // ========================================================================

    /// Attach a file to a project. A file pending processing cannot be
    /// attached; any other file is forced back to draft first ("attaching
    /// resets processing status"), then the relation is added. The status
    /// reset and the relation insert are separate commits.
    pub fn attach_file(
        &self,
        project_id: &str,
        owner_id: &str,
        file_id: &str,
    ) -> Result<(), RegistryError> {
        self.get_project_owned(project_id, owner_id)?;
        let file = self
            .get_file(file_id)?
            .ok_or_else(|| RegistryError::NotFound("file not found".to_string()))?;

        if file.file_status == FileStatus::Pending {
            return Err(RegistryError::InvalidState(format!(
                "file '{file_id}' is pending processing and cannot be attached"
            )));
        }

        self.reset_files_to_draft(std::slice::from_ref(&file))?;
        self.add_relations(project_id, &[file.id.clone()])?;
        Ok(())
    }

    /// Remove a file from a project. The file's status is untouched.
    pub fn detach_file(
        &self,
        project_id: &str,
        owner_id: &str,
        file_id: &str,
    ) -> Result<(), RegistryError> {
        self.get_project_owned(project_id, owner_id)?;
        self.get_file(file_id)?
            .ok_or_else(|| RegistryError::NotFound("file not found".to_string()))?;

        self.remove_relations(project_id, &[file_id.to_string()])?;
        Ok(())
    }

    /// Attach a batch of files. The pending check covers the whole batch
    /// before anything is written: one pending file rejects the call with
    /// no side effects. Then one batched status write and one batched
    /// relation write.
    pub fn bulk_attach_files(
        &self,
        project_id: &str,
        owner_id: &str,
        file_ids: &[String],
    ) -> Result<u64, RegistryError> {
        self.get_project_owned(project_id, owner_id)?;

        let mut files = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            let file = self
                .get_file(file_id)?
                .ok_or_else(|| RegistryError::NotFound("file not found".to_string()))?;
            files.push(file);
        }

        let pending = files
            .iter()
            .filter(|f| f.file_status == FileStatus::Pending)
            .count();
        if pending > 0 {
            return Err(RegistryError::InvalidState(format!(
                "{pending} of {} files are pending processing and cannot be attached",
                files.len()
            )));
        }

        self.reset_files_to_draft(&files)?;
        self.add_relations(project_id, file_ids)?;
        Ok(file_ids.len() as u64)
    }

    /// Detach a batch of files. Ids with no relation (or no file at all)
    /// are silently ignored.
    pub fn bulk_detach_files(
        &self,
        project_id: &str,
        owner_id: &str,
        file_ids: &[String],
    ) -> Result<u64, RegistryError> {
        self.get_project_owned(project_id, owner_id)?;
        self.remove_relations(project_id, file_ids)
    }

    /// All files attached to a project
    pub fn project_files(
        &self,
        project_id: &str,
        owner_id: &str,
    ) -> Result<Vec<FileRecord>, RegistryError> {
        self.get_project_owned(project_id, owner_id)?;

        let read_txn = self.begin_read()?;
        let relation_table = read_txn.open_table(PROJECT_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match relation_table.get(project_id)? {
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

    /// One batched write forcing every listed file to draft.
    fn reset_files_to_draft(&self, files: &[FileRecord]) -> Result<(), RegistryError> {
        let now = Utc::now();
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            for file in files {
                let mut file = file.clone();
                file.file_status = FileStatus::Draft;
                file.updated_at = now;
                let serialized = rmp_serde::to_vec_named(&file)?;
                table.insert(file.id.as_str(), serialized.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// One batched write adding the listed relations, skipping duplicates.
    fn add_relations(&self, project_id: &str, file_ids: &[String]) -> Result<(), RegistryError> {
        let write_txn = self.begin_write()?;
        {
            let mut relation_table = write_txn.open_table(PROJECT_FILES)?;
            let mut attached: Vec<String> = relation_table
                .get(project_id)?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();

            for file_id in file_ids {
                if !attached.contains(file_id) {
                    attached.push(file_id.clone());
                }
            }

            let data = rmp_serde::to_vec_named(&attached)?;
            relation_table.insert(project_id, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// One batched write removing the listed relations. Returns how many
    /// were actually removed.
    fn remove_relations(
        &self,
        project_id: &str,
        file_ids: &[String],
    ) -> Result<u64, RegistryError> {
        let write_txn = self.begin_write()?;
        let removed;
        {
            let mut relation_table = write_txn.open_table(PROJECT_FILES)?;
            let mut attached: Vec<String> = relation_table
                .get(project_id)?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();

            let before = attached.len();
            attached.retain(|id| !file_ids.contains(id));
            removed = (before - attached.len()) as u64;

            if attached.is_empty() {
                relation_table.remove(project_id)?;
            } else {
                let data = rmp_serde::to_vec_named(&attached)?;
                relation_table.insert(project_id, data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }
}
