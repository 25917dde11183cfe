use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

use crate::constants::EXPECTED_DB_VERSION;
use crate::queries::{ddl, metadata};
use crate::storage::StorageError;

/// Open a file-based database pool for production use
/// Creates the file if needed, enables WAL mode and foreign keys
pub async fn open_database_connection(db_path: &Path) -> Result<SqlitePool, StorageError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Open(format!(
                    "Failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    log::info!("SQLite database: {}", db_path.display());
    Ok(pool)
}

/// Create tables and indexes if they do not exist, then record or verify the schema version
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(&ddl::create_metadata_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_recordings_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_analyses_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_analyses_recording_id_index())
        .execute(pool)
        .await?;

    let existing = sqlx::query(&metadata::select_by_key("version"))
        .fetch_optional(pool)
        .await?
        .map(|row| row.try_get::<String, _>(0))
        .transpose()?;

    match existing {
        None => {
            sqlx::query(&metadata::insert("version", EXPECTED_DB_VERSION))
                .execute(pool)
                .await?;
        }
        Some(version) if version != EXPECTED_DB_VERSION => {
            return Err(StorageError::VersionMismatch {
                found: version,
                expected: EXPECTED_DB_VERSION.to_string(),
            });
        }
        Some(_) => {}
    }

    Ok(())
}

/// Open a database at `db_path` and make sure its schema is ready
pub async fn open_and_init(db_path: &Path) -> Result<SqlitePool, StorageError> {
    let pool = open_database_connection(db_path).await?;
    init_database_schema(&pool).await?;
    Ok(pool)
}

/// Create a database in a fresh temporary directory for tests
/// The returned `TempDir` must be kept alive for as long as the pool is used
pub async fn create_test_connection_in_temporary_file(
) -> Result<(SqlitePool, tempfile::TempDir), StorageError> {
    let dir = tempfile::tempdir()
        .map_err(|e| StorageError::Open(format!("Failed to create temp dir: {}", e)))?;
    let pool = open_database_connection(&dir.path().join("test.sqlite")).await?;
    Ok((pool, dir))
}
