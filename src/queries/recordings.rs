use sea_query::{Expr, Order, Query, SelectStatement, SqliteQueryBuilder, Values};

use crate::schema::Recordings;

fn select_columns() -> SelectStatement {
    Query::select()
        .columns([
            Recordings::Id,
            Recordings::Title,
            Recordings::AudioUrl,
            Recordings::DurationSeconds,
            Recordings::RecordedAtMs,
        ])
        .from(Recordings::Table)
        .to_owned()
}

/// INSERT INTO recordings (title, audio_url, duration_seconds, recorded_at_ms) VALUES (?, ?, ?, ?)
///
/// Values come back separately so text is bound, never inlined.
pub fn insert(
    title: &str,
    audio_url: &str,
    duration_seconds: i64,
    recorded_at_ms: i64,
) -> (String, Values) {
    Query::insert()
        .into_table(Recordings::Table)
        .columns([
            Recordings::Title,
            Recordings::AudioUrl,
            Recordings::DurationSeconds,
            Recordings::RecordedAtMs,
        ])
        .values_panic([
            title.into(),
            audio_url.into(),
            duration_seconds.into(),
            recorded_at_ms.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT id, title, audio_url, duration_seconds, recorded_at_ms FROM recordings WHERE id = ?
pub fn select_by_id(id: i64) -> String {
    select_columns()
        .and_where(Expr::col(Recordings::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT id, title, audio_url, duration_seconds, recorded_at_ms FROM recordings ORDER BY id
pub fn select_all() -> String {
    select_columns()
        .order_by(Recordings::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}
