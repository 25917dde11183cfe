//! Storage gateway for recordings and analyses
//!
//! All persistence goes through [`Storage`]. Rows are append-only: there is
//! no update or delete path. Nothing here retries; failures surface as
//! [`StorageError`] and the caller decides what to do.

use chrono::{DateTime, Utc};
use sea_query::{Value, Values};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::Row;
use thiserror::Error;

use crate::models::{Analysis, NewAnalysis, NewRecording, Recording};
use crate::queries::{analyses, recordings};

/// Persistence failures
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store rejected a query or could not be reached
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database file or directory could not be prepared
    #[error("Failed to open database: {0}")]
    Open(String),

    /// Database was created by an incompatible schema version
    #[error("Unsupported database version: '{found}'. This application only supports version '{expected}'")]
    VersionMismatch { found: String, expected: String },

    /// A stored row could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A statement parameter has no SQLite binding here
    #[error("Unsupported query parameter: {0}")]
    Parameter(String),
}

/// Attach sea-query parameter values to `sql` in order
fn bind_values<'q>(
    sql: &'q str,
    values: &Values,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, StorageError> {
    let mut query = sqlx::query(sql);
    for value in values.0.iter() {
        query = match value {
            Value::BigInt(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::String(v) => query.bind(v.as_ref().map(|s| s.to_string())),
            other => return Err(StorageError::Parameter(format!("{:?}", other))),
        };
    }
    Ok(query)
}

fn timestamp_from_ms(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp out of range: {}", ms)))
}

/// Current time truncated to the millisecond precision the store keeps
fn now_ms() -> (i64, DateTime<Utc>) {
    let ms = Utc::now().timestamp_millis();
    let ts = DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now);
    (ms, ts)
}

fn recording_from_row(row: &SqliteRow) -> Result<Recording, StorageError> {
    Ok(Recording {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        audio_url: row.try_get("audio_url")?,
        duration_seconds: row.try_get("duration_seconds")?,
        recorded_at: timestamp_from_ms(row.try_get("recorded_at_ms")?)?,
    })
}

fn analysis_from_row(row: &SqliteRow) -> Result<Analysis, StorageError> {
    let id: i64 = row.try_get("id")?;
    let feedback_json: String = row.try_get("feedback")?;
    let feedback: Vec<String> = serde_json::from_str(&feedback_json).map_err(|e| {
        StorageError::Corrupt(format!("analysis {} has invalid feedback JSON: {}", id, e))
    })?;

    Ok(Analysis {
        id,
        recording_id: row.try_get("recording_id")?,
        clarity: row.try_get("clarity")?,
        pacing: row.try_get("pacing")?,
        emotional_tone: row.try_get("emotional_tone")?,
        feedback,
        analyzed_at: timestamp_from_ms(row.try_get("analyzed_at_ms")?)?,
    })
}

/// Handle to the relational store; cheap to clone
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a recording; `id` and `recorded_at` are assigned here
    pub async fn create_recording(&self, input: &NewRecording) -> Result<Recording, StorageError> {
        let (recorded_at_ms, recorded_at) = now_ms();
        let (sql, values) = recordings::insert(
            &input.title,
            &input.audio_url,
            input.duration_seconds,
            recorded_at_ms,
        );
        let id = bind_values(&sql, &values)?
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Recording {
            id,
            title: input.title.clone(),
            audio_url: input.audio_url.clone(),
            duration_seconds: input.duration_seconds,
            recorded_at,
        })
    }

    /// Look up a recording; a missing row is `Ok(None)`
    pub async fn get_recording(&self, id: i64) -> Result<Option<Recording>, StorageError> {
        sqlx::query(&recordings::select_by_id(id))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(recording_from_row)
            .transpose()
    }

    /// All recordings, ordered by id
    pub async fn get_all_recordings(&self) -> Result<Vec<Recording>, StorageError> {
        sqlx::query(&recordings::select_all())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(recording_from_row)
            .collect()
    }

    /// Insert an analysis; `id` and `analyzed_at` are assigned here
    pub async fn create_analysis(&self, input: &NewAnalysis) -> Result<Analysis, StorageError> {
        let (analyzed_at_ms, analyzed_at) = now_ms();
        let feedback_json = serde_json::to_string(&input.fields.feedback)
            .map_err(|e| StorageError::Corrupt(format!("feedback not serializable: {}", e)))?;
        let (sql, values) = analyses::insert(
            input.recording_id,
            input.fields.clarity,
            input.fields.pacing,
            &input.fields.emotional_tone,
            &feedback_json,
            analyzed_at_ms,
        );
        let id = bind_values(&sql, &values)?
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Analysis {
            id,
            recording_id: input.recording_id,
            clarity: input.fields.clarity,
            pacing: input.fields.pacing,
            emotional_tone: input.fields.emotional_tone.clone(),
            feedback: input.fields.feedback.clone(),
            analyzed_at,
        })
    }

    /// Look up an analysis; a missing row is `Ok(None)`
    pub async fn get_analysis(&self, id: i64) -> Result<Option<Analysis>, StorageError> {
        sqlx::query(&analyses::select_by_id(id))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(analysis_from_row)
            .transpose()
    }

    /// Most recent analysis for a recording, if any
    pub async fn get_analysis_by_recording_id(
        &self,
        recording_id: i64,
    ) -> Result<Option<Analysis>, StorageError> {
        sqlx::query(&analyses::select_latest_by_recording_id(recording_id))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(analysis_from_row)
            .transpose()
    }

    /// Number of stored analyses
    pub async fn count_analyses(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar(&analyses::count())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
