use std::time::Duration;

use chrono::Utc;
use memovault::storage::models::{JobRecord, JobStatus, JobType};
use memovault::storage::{Database, RegistryError};
use memovault::tasks::{Dispatcher, Task, TaskRunner};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_job(id: &str, file_id: Option<&str>, job_type: JobType) -> JobRecord {
    JobRecord {
        id: id.to_string(),
        file_id: file_id.map(|f| f.to_string()),
        job_type,
        status: JobStatus::Pending,
        progress: 0.0,
        error_msg: String::new(),
        created_at: Utc::now(),
        started_at: None,
        finished_at: None,
    }
}

// ============================================================================
// Job records
// ============================================================================

#[test]
fn test_put_and_get_job() {
    let (_dir, db) = test_db();
    db.put_job(&sample_job("job-1", Some("file-1"), JobType::Parse))
        .unwrap();

    let job = db.get_job("job-1").unwrap().expect("job should exist");
    assert_eq!(job.job_type, JobType::Parse);
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.file_id.as_deref(), Some("file-1"));
    assert_eq!(job.progress, 0.0);
}

#[test]
fn test_list_jobs_filters_by_file() {
    let (_dir, db) = test_db();
    db.put_job(&sample_job("job-a", Some("file-1"), JobType::Parse))
        .unwrap();
    db.put_job(&sample_job("job-b", Some("file-2"), JobType::Embed))
        .unwrap();
    db.put_job(&sample_job("job-c", None, JobType::Stats)).unwrap();

    assert_eq!(db.list_jobs(None).unwrap().len(), 3);

    let for_file = db.list_jobs(Some("file-1")).unwrap();
    assert_eq!(for_file.len(), 1);
    assert_eq!(for_file[0].id, "job-a");
}

#[test]
fn test_job_lifecycle_marks() {
    let (_dir, db) = test_db();
    db.put_job(&sample_job("job-1", None, JobType::Embed)).unwrap();

    let job = db.mark_job_running("job-1").unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_none());

    let job = db.mark_job_done("job-1").unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.progress, 100.0);
    assert!(job.finished_at.is_some());
}

#[test]
fn test_job_error_mark() {
    let (_dir, db) = test_db();
    db.put_job(&sample_job("job-1", None, JobType::Parse)).unwrap();
    db.mark_job_running("job-1").unwrap();

    let job = db.mark_job_error("job-1", "parser exploded").unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error_msg, "parser exploded");
    assert!(job.finished_at.is_some());
}

#[test]
fn test_mark_missing_job_is_not_found() {
    let (_dir, db) = test_db();
    let result = db.mark_job_running("nonexistent");
    assert!(matches!(result.unwrap_err(), RegistryError::NotFound(_)));
}

// ============================================================================
// Dispatcher
// ============================================================================

#[tokio::test]
async fn test_enqueue_parse_creates_job_and_worker_finishes_it() {
    let (_dir, db) = test_db();
    let runner = TaskRunner::new(db.clone());

    let job_id = runner
        .enqueue(Task::ParseFile {
            file_id: "file-1".to_string(),
        })
        .await
        .unwrap();

    let job = db.get_job(&job_id).unwrap().expect("job should be recorded");
    assert_eq!(job.job_type, JobType::Parse);
    assert_eq!(job.file_id.as_deref(), Some("file-1"));

    // The stub worker drives pending -> running -> done out-of-band
    let mut status = job.status;
    for _ in 0..100 {
        if status == JobStatus::Done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        status = db.get_job(&job_id).unwrap().unwrap().status;
    }
    assert_eq!(status, JobStatus::Done);

    let finished = db.get_job(&job_id).unwrap().unwrap();
    assert_eq!(finished.progress, 100.0);
    assert!(finished.finished_at.is_some());
}

#[tokio::test]
async fn test_enqueue_chat_records_no_job() {
    let (_dir, db) = test_db();
    let runner = TaskRunner::new(db.clone());

    let task_id = runner
        .enqueue(Task::Chat {
            session_id: "session-1".to_string(),
            message: "hello".to_string(),
        })
        .await
        .unwrap();

    assert!(!task_id.is_empty());
    assert!(db.list_jobs(None).unwrap().is_empty());
}
