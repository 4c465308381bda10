use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::error::RegistryError;
use super::models::{JobRecord, JobStatus};
use super::tables::*;

impl Database {
    // ========================================================================
    // Job operations
    // ========================================================================

    /// Store a job record
    pub fn put_job(&self, job: &JobRecord) -> Result<(), DatabaseError> {
        debug_assert!(!job.id.is_empty(), "job id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(JOBS)?;
            let data = rmp_serde::to_vec_named(job)?;
            table.insert(job.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a job by its UUID
    pub fn get_job(&self, id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(JOBS)?;

        match table.get(id)? {
            Some(data) => {
                let job: JobRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// List jobs, optionally only those for one file, newest first
    pub fn list_jobs(&self, file_id: Option<&str>) -> Result<Vec<JobRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(JOBS)?;

        let mut jobs = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let job: JobRecord = rmp_serde::from_slice(value.value())?;
            if let Some(fid) = file_id {
                if job.file_id.as_deref() != Some(fid) {
                    continue;
                }
            }
            jobs.push(job);
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Worker-side transition: the job has been picked up.
    pub fn mark_job_running(&self, id: &str) -> Result<JobRecord, RegistryError> {
        self.update_job(id, |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        })
    }

    /// Worker-side transition: the job finished successfully.
    pub fn mark_job_done(&self, id: &str) -> Result<JobRecord, RegistryError> {
        self.update_job(id, |job| {
            job.status = JobStatus::Done;
            job.progress = 100.0;
            job.finished_at = Some(Utc::now());
        })
    }

    /// Worker-side transition: the job failed.
    pub fn mark_job_error(&self, id: &str, message: &str) -> Result<JobRecord, RegistryError> {
        let message = message.to_string();
        self.update_job(id, move |job| {
            job.status = JobStatus::Error;
            job.error_msg = message.clone();
            job.finished_at = Some(Utc::now());
        })
    }

    fn update_job(
        &self,
        id: &str,
        apply: impl Fn(&mut JobRecord),
    ) -> Result<JobRecord, RegistryError> {
        let write_txn = self.begin_write()?;

        let mut job = {
            let table = write_txn.open_table(JOBS)?;
            let record = match table.get(id)? {
                Some(data) => rmp_serde::from_slice::<JobRecord>(data.value())?,
                None => return Err(RegistryError::NotFound("job not found".to_string())),
            };
            record
        };

        apply(&mut job);

        {
            let serialized = rmp_serde::to_vec_named(&job)?;
            let mut table = write_txn.open_table(JOBS)?;
            table.insert(id, serialized.as_slice())?;
        }
        write_txn.commit()?;
        Ok(job)
    }
}
