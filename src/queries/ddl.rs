use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, SqliteQueryBuilder, Table};

use crate::schema::{Analyses, Metadata, Recordings};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).string().primary_key())
        .col(ColumnDef::new(Metadata::Value).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS recordings (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     title TEXT NOT NULL,
///     audio_url TEXT NOT NULL,
///     duration_seconds INTEGER NOT NULL,
///     recorded_at_ms INTEGER NOT NULL
/// )
pub fn create_recordings_table() -> String {
    Table::create()
        .table(Recordings::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Recordings::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Recordings::Title).text().not_null())
        .col(ColumnDef::new(Recordings::AudioUrl).text().not_null())
        .col(
            ColumnDef::new(Recordings::DurationSeconds)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(Recordings::RecordedAtMs)
                .big_integer()
                .not_null(),
        )
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS analyses (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     recording_id INTEGER NOT NULL REFERENCES recordings(id),
///     clarity INTEGER NOT NULL,
///     pacing INTEGER NOT NULL,
///     emotional_tone TEXT NOT NULL,
///     feedback TEXT NOT NULL,
///     analyzed_at_ms INTEGER NOT NULL
/// )
///
/// `feedback` holds a JSON array of strings.
pub fn create_analyses_table() -> String {
    Table::create()
        .table(Analyses::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Analyses::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Analyses::RecordingId).integer().not_null())
        .col(ColumnDef::new(Analyses::Clarity).big_integer().not_null())
        .col(ColumnDef::new(Analyses::Pacing).big_integer().not_null())
        .col(ColumnDef::new(Analyses::EmotionalTone).text().not_null())
        .col(ColumnDef::new(Analyses::Feedback).text().not_null())
        .col(
            ColumnDef::new(Analyses::AnalyzedAtMs)
                .big_integer()
                .not_null(),
        )
        .foreign_key(
            ForeignKey::create()
                .from(Analyses::Table, Analyses::RecordingId)
                .to(Recordings::Table, Recordings::Id)
                .on_delete(ForeignKeyAction::Restrict),
        )
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_analyses_recording_id ON analyses(recording_id)
pub fn create_analyses_recording_id_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_analyses_recording_id")
        .table(Analyses::Table)
        .col(Analyses::RecordingId)
        .to_string(SqliteQueryBuilder)
}
