use sea_query::{Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder, Values};

use crate::schema::Analyses;

fn select_columns() -> SelectStatement {
    Query::select()
        .columns([
            Analyses::Id,
            Analyses::RecordingId,
            Analyses::Clarity,
            Analyses::Pacing,
            Analyses::EmotionalTone,
            Analyses::Feedback,
            Analyses::AnalyzedAtMs,
        ])
        .from(Analyses::Table)
        .to_owned()
}

/// INSERT INTO analyses (recording_id, clarity, pacing, emotional_tone, feedback, analyzed_at_ms)
/// VALUES (?, ?, ?, ?, ?, ?)
///
/// Values come back separately so text is bound, never inlined.
pub fn insert(
    recording_id: i64,
    clarity: i64,
    pacing: i64,
    emotional_tone: &str,
    feedback_json: &str,
    analyzed_at_ms: i64,
) -> (String, Values) {
    Query::insert()
        .into_table(Analyses::Table)
        .columns([
            Analyses::RecordingId,
            Analyses::Clarity,
            Analyses::Pacing,
            Analyses::EmotionalTone,
            Analyses::Feedback,
            Analyses::AnalyzedAtMs,
        ])
        .values_panic([
            recording_id.into(),
            clarity.into(),
            pacing.into(),
            emotional_tone.into(),
            feedback_json.into(),
            analyzed_at_ms.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT ... FROM analyses WHERE id = ?
pub fn select_by_id(id: i64) -> String {
    select_columns()
        .and_where(Expr::col(Analyses::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT ... FROM analyses WHERE recording_id = ? ORDER BY id DESC LIMIT 1
pub fn select_latest_by_recording_id(recording_id: i64) -> String {
    select_columns()
        .and_where(Expr::col(Analyses::RecordingId).eq(recording_id))
        .order_by(Analyses::Id, Order::Desc)
        .limit(1)
        .to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(id) FROM analyses
pub fn count() -> String {
    Query::select()
        .expr(Func::count(Expr::col(Analyses::Id)))
        .from(Analyses::Table)
        .to_string(SqliteQueryBuilder)
}
