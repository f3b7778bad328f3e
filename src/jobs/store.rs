//! SQLite-backed job store.
//!
//! One table per job family: `ai_reports` rows hold document-analysis jobs
//! (result serialized as a JSON string in `key_findings`), and
//! `tumor_board_cases` rows hold board cases with the view blob in
//! `ai_tumor_board_json`. The store is the single serialization boundary:
//! everything above it works on typed values, result payloads cross as
//! opaque JSON strings.
//!
//! The `patients` and `reports` tables are inputs populated by the
//! surrounding CRUD layer; the store only reads them (test seeding aside).

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::types::{Job, JobKind, JobStatus};
use super::JobError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ai_reports (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    status TEXT NOT NULL,
    progress_percent INTEGER NOT NULL DEFAULT 0,
    progress_message TEXT,
    error TEXT,
    generated_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    estimated_seconds INTEGER,
    report_count INTEGER NOT NULL DEFAULT 0,
    key_findings TEXT
);
CREATE INDEX IF NOT EXISTS idx_ai_reports_patient ON ai_reports(patient_id, generated_at);

CREATE TABLE IF NOT EXISTS tumor_board_cases (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    status TEXT NOT NULL,
    progress_percent INTEGER NOT NULL DEFAULT 0,
    progress_message TEXT,
    error TEXT,
    generated_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    estimated_seconds INTEGER,
    report_count INTEGER NOT NULL DEFAULT 0,
    ai_tumor_board_json TEXT
);
CREATE INDEX IF NOT EXISTS idx_tumor_board_patient ON tumor_board_cases(patient_id, generated_at);

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    patient_id TEXT,
    name TEXT NOT NULL,
    age TEXT,
    gender TEXT,
    cancer_type TEXT
);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    category TEXT
);
CREATE INDEX IF NOT EXISTS idx_reports_patient ON reports(patient_id);
"#;

/// A patient row from the external CRUD layer.
#[derive(Debug, Clone)]
pub struct PatientRecord {
    pub id: String,
    /// External patient code, when assigned.
    pub patient_id: Option<String>,
    pub name: String,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub cancer_type: Option<String>,
}

/// An uploaded report row from the external CRUD layer.
#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub id: String,
    pub patient_id: String,
    pub file_name: String,
    pub file_path: String,
    pub category: Option<String>,
}

fn table_for(kind: JobKind) -> (&'static str, &'static str) {
    match kind {
        JobKind::DocAnalysis => ("ai_reports", "key_findings"),
        JobKind::TumorBoard => ("tumor_board_cases", "ai_tumor_board_json"),
    }
}

fn row_to_job(row: &Row<'_>, kind: JobKind) -> rusqlite::Result<Job> {
    let status_raw: String = row.get("status")?;
    Ok(Job {
        id: row.get("id")?,
        patient_id: row.get("patient_id")?,
        kind,
        status: JobStatus::from_str(&status_raw).unwrap_or(JobStatus::Failed),
        progress_percent: row.get::<_, i64>("progress_percent")? as u8,
        progress_message: row.get("progress_message")?,
        error: row.get("error")?,
        generated_at: row.get("generated_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        estimated_seconds: row
            .get::<_, Option<i64>>("estimated_seconds")?
            .map(|s| s.max(0) as u64),
        result: row.get("result_payload")?,
        report_count: row.get::<_, i64>("report_count")? as u32,
    })
}

/// Persisted job store shared by handlers and the background executor.
pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JobError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, JobError> {
        self.conn.lock().map_err(|_| JobError::LockPoisoned)
    }

    // ── Job lifecycle ────────────────────────────────────

    /// Create a job directly in `queued` (the submit path).
    pub fn create_job(
        &self,
        kind: JobKind,
        patient_id: &str,
        report_count: u32,
        estimated_seconds: Option<u64>,
    ) -> Result<Job, JobError> {
        self.create_with_status(kind, patient_id, report_count, estimated_seconds, JobStatus::Queued)
    }

    /// Create a job in `draft` (board cases created before submission).
    pub fn create_draft(&self, kind: JobKind, patient_id: &str) -> Result<Job, JobError> {
        self.create_with_status(kind, patient_id, 0, None, JobStatus::Draft)
    }

    fn create_with_status(
        &self,
        kind: JobKind,
        patient_id: &str,
        report_count: u32,
        estimated_seconds: Option<u64>,
        status: JobStatus,
    ) -> Result<Job, JobError> {
        let (table, _) = table_for(kind);
        let job = Job {
            id: Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            kind,
            status,
            progress_percent: 0,
            progress_message: None,
            error: None,
            generated_at: Utc::now(),
            started_at: None,
            completed_at: None,
            estimated_seconds,
            result: None,
            report_count,
        };
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {table} (id, patient_id, status, progress_percent, generated_at, estimated_seconds, report_count)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)"
            ),
            params![
                job.id,
                job.patient_id,
                job.status.as_str(),
                job.generated_at,
                job.estimated_seconds.map(|s| s as i64),
                job.report_count as i64,
            ],
        )?;
        Ok(job)
    }

    pub fn get_job(&self, kind: JobKind, id: &str) -> Result<Option<Job>, JobError> {
        let (table, result_col) = table_for(kind);
        let conn = self.lock()?;
        let job = conn
            .query_row(
                &format!(
                    "SELECT id, patient_id, status, progress_percent, progress_message, error,
                            generated_at, started_at, completed_at, estimated_seconds, report_count,
                            {result_col} AS result_payload
                     FROM {table} WHERE id = ?1"
                ),
                params![id],
                |row| row_to_job(row, kind),
            )
            .optional()?;
        Ok(job)
    }

    pub fn latest_job_for_patient(
        &self,
        kind: JobKind,
        patient_id: &str,
    ) -> Result<Option<Job>, JobError> {
        self.latest_where(kind, patient_id, "status != 'deleted'")
    }

    /// Most recent completed job for a patient; the board runner's input.
    pub fn latest_completed_for_patient(
        &self,
        kind: JobKind,
        patient_id: &str,
    ) -> Result<Option<Job>, JobError> {
        self.latest_where(kind, patient_id, "status = 'completed'")
    }

    fn latest_where(
        &self,
        kind: JobKind,
        patient_id: &str,
        condition: &str,
    ) -> Result<Option<Job>, JobError> {
        let (table, result_col) = table_for(kind);
        let conn = self.lock()?;
        let job = conn
            .query_row(
                &format!(
                    "SELECT id, patient_id, status, progress_percent, progress_message, error,
                            generated_at, started_at, completed_at, estimated_seconds, report_count,
                            {result_col} AS result_payload
                     FROM {table} WHERE patient_id = ?1 AND {condition}
                     ORDER BY generated_at DESC LIMIT 1"
                ),
                params![patient_id],
                |row| row_to_job(row, kind),
            )
            .optional()?;
        Ok(job)
    }

    /// Apply a state-machine transition, maintaining the timestamp
    /// invariants: `started_at` set on entering `processing`,
    /// `completed_at` set on reaching any end of a processing span, both
    /// cleared (with progress) on retry.
    pub fn transition(&self, kind: JobKind, id: &str, to: JobStatus) -> Result<Job, JobError> {
        let job = self
            .get_job(kind, id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if !JobStatus::can_transition(job.status, to) {
            return Err(JobError::InvalidTransition {
                from: job.status,
                to,
            });
        }

        let (table, _) = table_for(kind);
        let now = Utc::now();
        let conn = self.lock()?;
        match to {
            JobStatus::Processing => {
                conn.execute(
                    &format!("UPDATE {table} SET status = ?1, started_at = ?2 WHERE id = ?3"),
                    params![to.as_str(), now, id],
                )?;
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                conn.execute(
                    &format!("UPDATE {table} SET status = ?1, completed_at = ?2 WHERE id = ?3"),
                    params![to.as_str(), now, id],
                )?;
            }
            JobStatus::Queued => {
                // Retry or submit: progress resets, prior span cleared.
                conn.execute(
                    &format!(
                        "UPDATE {table} SET status = ?1, progress_percent = 0, progress_message = NULL,
                                error = NULL, started_at = NULL, completed_at = NULL WHERE id = ?2"
                    ),
                    params![to.as_str(), id],
                )?;
            }
            JobStatus::Deleted => {
                conn.execute(
                    &format!(
                        "UPDATE {table} SET status = ?1, completed_at = COALESCE(completed_at, ?2) WHERE id = ?3"
                    ),
                    params![to.as_str(), now, id],
                )?;
            }
            JobStatus::Draft => {
                return Err(JobError::InvalidTransition {
                    from: job.status,
                    to,
                });
            }
        }
        drop(conn);
        self.get_job(kind, id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Record progress. Monotonic within a processing span: regressions and
    /// writes outside `processing` are ignored.
    pub fn set_progress(
        &self,
        kind: JobKind,
        id: &str,
        percent: u8,
        message: &str,
    ) -> Result<(), JobError> {
        let (table, _) = table_for(kind);
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "UPDATE {table} SET progress_percent = ?1, progress_message = ?2
                 WHERE id = ?3 AND status = 'processing' AND progress_percent <= ?1"
            ),
            params![percent.min(100) as i64, message, id],
        )?;
        Ok(())
    }

    /// Store the result payload and complete the job.
    pub fn complete_with_result(
        &self,
        kind: JobKind,
        id: &str,
        result_json: &str,
    ) -> Result<(), JobError> {
        let (table, result_col) = table_for(kind);
        {
            let conn = self.lock()?;
            conn.execute(
                &format!(
                    "UPDATE {table} SET {result_col} = ?1, progress_percent = 100 WHERE id = ?2"
                ),
                params![result_json, id],
            )?;
        }
        self.transition(kind, id, JobStatus::Completed)?;
        Ok(())
    }

    /// Record the error and fail the job.
    pub fn fail(&self, kind: JobKind, id: &str, error: &str) -> Result<(), JobError> {
        let (table, _) = table_for(kind);
        {
            let conn = self.lock()?;
            conn.execute(
                &format!("UPDATE {table} SET error = ?1 WHERE id = ?2"),
                params![error, id],
            )?;
        }
        self.transition(kind, id, JobStatus::Failed)?;
        Ok(())
    }

    /// Bulk-cancel every active job for a patient. Returns the number of
    /// jobs cancelled. Background tasks observe the new status between
    /// phases and stop.
    pub fn cancel_for_patient(&self, kind: JobKind, patient_id: &str) -> Result<usize, JobError> {
        let (table, _) = table_for(kind);
        let conn = self.lock()?;
        let cancelled = conn.execute(
            &format!(
                "UPDATE {table} SET status = 'cancelled', completed_at = ?1
                 WHERE patient_id = ?2 AND status IN ('queued', 'processing')"
            ),
            params![Utc::now(), patient_id],
        )?;
        Ok(cancelled)
    }

    /// Cooperative cancellation check used by executors between phases.
    pub fn is_cancelled(&self, kind: JobKind, id: &str) -> bool {
        matches!(
            self.get_job(kind, id),
            Ok(Some(job)) if job.status == JobStatus::Cancelled
        )
    }

    // ── Patient directory (read-only input tables) ───────

    /// Find a patient by primary id or external patient code.
    pub fn get_patient(&self, id_or_code: &str) -> Result<Option<PatientRecord>, JobError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT id, patient_id, name, age, gender, cancer_type
                 FROM patients WHERE id = ?1 OR patient_id = ?1",
                params![id_or_code],
                |row| {
                    Ok(PatientRecord {
                        id: row.get(0)?,
                        patient_id: row.get(1)?,
                        name: row.get(2)?,
                        age: row.get(3)?,
                        gender: row.get(4)?,
                        cancer_type: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn reports_for_patient(&self, patient_pk: &str) -> Result<Vec<ReportRecord>, JobError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, patient_id, file_name, file_path, category
             FROM reports WHERE patient_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![patient_pk], |row| {
            Ok(ReportRecord {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                file_name: row.get(2)?,
                file_path: row.get(3)?,
                category: row.get(4)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Seed a patient row (tests and local bootstrap).
    pub fn insert_patient(&self, record: &PatientRecord) -> Result<(), JobError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO patients (id, patient_id, name, age, gender, cancer_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.patient_id,
                record.name,
                record.age,
                record.gender,
                record.cancer_type
            ],
        )?;
        Ok(())
    }

    /// Seed a report row (tests and local bootstrap).
    pub fn insert_report(&self, record: &ReportRecord) -> Result<(), JobError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO reports (id, patient_id, file_name, file_path, category)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.patient_id,
                record.file_name,
                record.file_path,
                record.category
            ],
        )?;
        Ok(())
    }
}
