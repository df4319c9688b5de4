//! Semester results in a single `DuckDB` file.
//!
//! The file contains a `students` table keyed by (roll number, semester),
//! a `subjects` table keyed additionally by subject code, and a `_meta`
//! table for ingestion bookkeeping. Subjects keep the order in which they
//! were first merged through a `position` column.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use duckdb::Connection;
use duckdb::types::Type;
use marksheet_extract::store::{StoreError, StudentStore};
use marksheet_results_models::{
    MergeReport, Semester, StudentKey, StudentRecord, SubjectRecord, SubjectStatus,
};
use tokio::sync::Mutex;

use crate::DbError;

const LAST_INGESTED_AT: &str = "last_ingested_at";

/// A [`StudentStore`] backed by one `DuckDB` connection.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        let conn = Connection::open(path)?;
        create_schema(&conn)?;
        log::debug!("Opened results database at {}", path.display());

        Ok(Self::from_connection(conn))
    }

    /// Opens the database at [`crate::paths::results_db_path`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_default() -> Result<Self, DbError> {
        Self::open(&crate::paths::results_db_path())
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Number of (student, semester) records stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn student_count(&self) -> Result<u64, DbError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        u64::try_from(count).map_err(|e| DbError::Conversion {
            message: format!("negative student count {count}: {e}"),
        })
    }

    /// RFC 3339 timestamp of the last successful merge, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn last_ingested_at(&self) -> Result<Option<String>, DbError> {
        let conn = self.conn.lock().await;
        get_meta(&conn, LAST_INGESTED_AT)
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS students (
            identifier TEXT NOT NULL,
            semester TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (identifier, semester)
        );

        CREATE TABLE IF NOT EXISTS subjects (
            identifier TEXT NOT NULL,
            semester TEXT NOT NULL,
            subject_code TEXT NOT NULL,
            position BIGINT NOT NULL,
            subject_name TEXT NOT NULL,
            internal_marks BIGINT NOT NULL,
            grade TEXT NOT NULL,
            credits DOUBLE NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY (identifier, semester, subject_code)
        );

        CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    Ok(())
}

/// Reads a metadata value from the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, DbError> {
    let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
    let result = stmt.query_row([key], |row| row.get(0));
    match result {
        Ok(v) => Ok(Some(v)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Sets a metadata value in the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO _meta (key, value) VALUES (?, ?)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        duckdb::params![key, value],
    )?;
    Ok(())
}

fn student_exists(conn: &Connection, identifier: &str, semester: &str) -> Result<bool, DbError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE identifier = ? AND semester = ?",
        duckdb::params![identifier, semester],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn load_subjects(
    conn: &Connection,
    identifier: &str,
    semester: &str,
) -> Result<Vec<SubjectRecord>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT subject_code, subject_name, internal_marks, grade, credits, status
         FROM subjects
         WHERE identifier = ? AND semester = ?
         ORDER BY position",
    )?;

    let rows = stmt.query_map(duckdb::params![identifier, semester], |row| {
        let status: String = row.get(5)?;
        let status = SubjectStatus::from_str(&status)
            .map_err(|e| duckdb::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        Ok(SubjectRecord {
            subject_code: row.get(0)?,
            subject_name: row.get(1)?,
            internal_marks: row.get(2)?,
            grade: row.get(3)?,
            credits: row.get(4)?,
            status,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn load_student(conn: &Connection, key: &StudentKey) -> Result<Option<StudentRecord>, DbError> {
    let identifier = key.identifier.as_str();
    let semester = key.semester.as_str();

    if !student_exists(conn, identifier, semester)? {
        return Ok(None);
    }

    let mut record = StudentRecord::new(key.clone());
    for subject in load_subjects(conn, identifier, semester)? {
        record.push_subject(subject);
    }

    Ok(Some(record))
}

fn load_student_semesters(
    conn: &Connection,
    identifier: &str,
) -> Result<Vec<StudentRecord>, DbError> {
    let mut stmt =
        conn.prepare("SELECT semester FROM students WHERE identifier = ? ORDER BY semester")?;
    let semesters = stmt
        .query_map([identifier], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(semesters.len());
    for semester in semesters {
        let semester = Semester::parse(&semester).map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?;
        let key = StudentKey::new(identifier, semester);
        if let Some(record) = load_student(conn, &key)? {
            records.push(record);
        }
    }

    Ok(records)
}

/// Creates or extends one student's record inside a single transaction.
///
/// Subjects whose codes are already stored are left untouched; new ones
/// are appended after the stored ones.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails. The transaction is rolled
/// back and nothing is written in that case.
pub fn merge_student(conn: &mut Connection, record: &StudentRecord) -> Result<MergeReport, DbError> {
    let identifier = record.key.identifier.as_str();
    let semester = record.key.semester.as_str();
    let now = chrono::Utc::now().to_rfc3339();

    let tx = conn.transaction()?;

    let created = !student_exists(&tx, identifier, semester)?;
    if created {
        tx.execute(
            "INSERT INTO students (identifier, semester, created_at) VALUES (?, ?, ?)",
            duckdb::params![identifier, semester, now],
        )?;
    }

    let mut stored: BTreeSet<String> = {
        let mut stmt = tx
            .prepare("SELECT subject_code FROM subjects WHERE identifier = ? AND semester = ?")?;
        stmt.query_map(duckdb::params![identifier, semester], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<_, _>>()?
    };

    let mut position: i64 = tx.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM subjects WHERE identifier = ? AND semester = ?",
        duckdb::params![identifier, semester],
        |row| row.get(0),
    )?;

    let mut appended = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO subjects (
                identifier, semester, subject_code, position, subject_name,
                internal_marks, grade, credits, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;

        for subject in record.subjects() {
            if !stored.insert(subject.subject_code.clone()) {
                continue;
            }

            stmt.execute(duckdb::params![
                identifier,
                semester,
                subject.subject_code,
                position,
                subject.subject_name,
                subject.internal_marks,
                subject.grade,
                subject.credits,
                subject.status.as_ref(),
            ])?;
            position += 1;
            appended += 1;
        }
    }

    set_meta(&tx, LAST_INGESTED_AT, &now)?;
    tx.commit()?;

    Ok(MergeReport { created, appended })
}

#[async_trait]
impl StudentStore for DuckDbStore {
    async fn find_by_key(&self, key: &StudentKey) -> Result<Option<StudentRecord>, StoreError> {
        let conn = self.conn.lock().await;
        Ok(load_student(&conn, key)?)
    }

    async fn upsert_merge(&self, record: &StudentRecord) -> Result<MergeReport, StoreError> {
        let mut conn = self.conn.lock().await;
        Ok(merge_student(&mut conn, record)?)
    }

    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Vec<StudentRecord>, StoreError> {
        let conn = self.conn.lock().await;
        Ok(load_student_semesters(&conn, identifier)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(code: &str, grade: &str, status: SubjectStatus) -> SubjectRecord {
        SubjectRecord {
            subject_code: code.to_owned(),
            subject_name: format!("Subject {code}"),
            internal_marks: 21,
            grade: grade.to_owned(),
            credits: 3.5,
            status,
        }
    }

    fn record(roll: &str, semester: &str, subjects: &[SubjectRecord]) -> StudentRecord {
        let mut record = StudentRecord::new(StudentKey::new(roll, Semester::parse(semester).unwrap()));
        for s in subjects {
            record.push_subject(s.clone());
        }
        record
    }

    #[tokio::test]
    async fn round_trips_a_student_with_subject_order() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let written = record(
            "21HN1A0501",
            "2-1",
            &[
                subject("R203", "A", SubjectStatus::Pass),
                subject("R201", "F", SubjectStatus::Fail),
            ],
        );

        let report = store.upsert_merge(&written).await.unwrap();
        assert_eq!(report, MergeReport { created: true, appended: 2 });

        let read = store.find_by_key(&written.key).await.unwrap().unwrap();
        assert_eq!(read, written);
        assert!(store.last_ingested_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn merging_twice_changes_nothing() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let written = record("HN001", "1-1", &[subject("R101", "B", SubjectStatus::Pass)]);

        store.upsert_merge(&written).await.unwrap();
        let report = store.upsert_merge(&written).await.unwrap();

        assert_eq!(report, MergeReport { created: false, appended: 0 });
        assert_eq!(store.student_count().await.unwrap(), 1);
        let read = store.find_by_key(&written.key).await.unwrap().unwrap();
        assert_eq!(read.subject_codes(), vec!["R101"]);
    }

    #[tokio::test]
    async fn merge_appends_only_new_codes_and_keeps_stored_grades() {
        let store = DuckDbStore::open_in_memory().unwrap();
        store
            .upsert_merge(&record("HN001", "1-1", &[subject("R101", "B", SubjectStatus::Pass)]))
            .await
            .unwrap();

        let report = store
            .upsert_merge(&record(
                "HN001",
                "1-1",
                &[
                    subject("R101", "F", SubjectStatus::Fail),
                    subject("R102", "A", SubjectStatus::Pass),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(report, MergeReport { created: false, appended: 1 });

        let key = StudentKey::new("HN001", Semester::parse("1-1").unwrap());
        let read = store.find_by_key(&key).await.unwrap().unwrap();
        assert_eq!(read.subject_codes(), vec!["R101", "R102"]);
        assert_eq!(read.subjects()[0].grade, "B");
    }

    #[tokio::test]
    async fn lists_semesters_for_one_roll_number() {
        let store = DuckDbStore::open_in_memory().unwrap();
        for semester in ["2-1", "1-2", "1-1"] {
            store
                .upsert_merge(&record("HN001", semester, &[subject("R101", "A", SubjectStatus::Pass)]))
                .await
                .unwrap();
        }
        store
            .upsert_merge(&record("HN002", "1-1", &[subject("R101", "A", SubjectStatus::Pass)]))
            .await
            .unwrap();

        let records = store.find_by_identifier("HN001").await.unwrap();
        let semesters: Vec<&str> = records.iter().map(|r| r.key.semester.as_str()).collect();
        assert_eq!(semesters, vec!["1-1", "1-2", "2-1"]);
        assert!(store.find_by_identifier("HN404").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_key_is_none() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let key = StudentKey::new("HN001", Semester::parse("1-1").unwrap());
        assert!(store.find_by_key(&key).await.unwrap().is_none());
        assert!(store.last_ingested_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn data_survives_reopening_the_file() {
        let dir = std::env::temp_dir().join(format!("marksheet_db_{}", std::process::id()));
        let path = dir.join("results.duckdb");
        let written = record("HN001", "3-2", &[subject("R321", "C", SubjectStatus::Pass)]);

        {
            let store = DuckDbStore::open(&path).unwrap();
            store.upsert_merge(&written).await.unwrap();
        }

        let store = DuckDbStore::open(&path).unwrap();
        let read = store.find_by_key(&written.key).await;
        drop(store);
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(read.unwrap(), Some(written));
    }

    #[tokio::test]
    async fn failed_merge_leaves_no_partial_student() {
        let store = DuckDbStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .await
            .execute_batch(
                "DROP TABLE subjects;
                 CREATE TABLE subjects (
                    identifier TEXT NOT NULL,
                    semester TEXT NOT NULL,
                    subject_code TEXT NOT NULL CHECK (subject_code <> 'R102'),
                    position BIGINT NOT NULL,
                    subject_name TEXT NOT NULL,
                    internal_marks BIGINT NOT NULL,
                    grade TEXT NOT NULL,
                    credits DOUBLE NOT NULL,
                    status TEXT NOT NULL,
                    PRIMARY KEY (identifier, semester, subject_code)
                 );",
            )
            .unwrap();
        let written = record(
            "HN001",
            "1-1",
            &[
                subject("R101", "A", SubjectStatus::Pass),
                subject("R102", "B", SubjectStatus::Pass),
            ],
        );

        let result = store.upsert_merge(&written).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.find_by_key(&written.key).await.unwrap().is_none());
        assert_eq!(store.student_count().await.unwrap(), 0);
        assert!(store.last_ingested_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deserialized_record_with_repeated_codes_merges_once() {
        let json = r#"{
            "key": { "identifier": "HN001", "semester": "1-1" },
            "subjects": [
                { "subjectCode": "R101", "subjectName": "Maths", "internalMarks": 20,
                  "grade": "B", "credits": 3.0, "status": "Pass" },
                { "subjectCode": "R101", "subjectName": "Maths", "internalMarks": 2,
                  "grade": "F", "credits": 3.0, "status": "Fail" }
            ]
        }"#;
        let incoming: StudentRecord = serde_json::from_str(json).unwrap();
        let store = DuckDbStore::open_in_memory().unwrap();

        let report = store.upsert_merge(&incoming).await.unwrap();

        assert_eq!(report, MergeReport { created: true, appended: 1 });
        let read = store.find_by_key(&incoming.key).await.unwrap().unwrap();
        assert_eq!(read.subject_codes(), vec!["R101"]);
        assert_eq!(read.subjects()[0].grade, "B");
    }
}
