use sea_query::{Expr, Query, SqliteQueryBuilder};

use crate::schema::Metadata;

/// SELECT value FROM metadata WHERE key = ?
pub fn select_by_key(key: &str) -> String {
    Query::select()
        .column(Metadata::Value)
        .from(Metadata::Table)
        .and_where(Expr::col(Metadata::Key).eq(key))
        .to_string(SqliteQueryBuilder)
}

/// INSERT INTO metadata (key, value) VALUES (?, ?)
pub fn insert(key: &str, value: &str) -> String {
    Query::insert()
        .into_table(Metadata::Table)
        .columns([Metadata::Key, Metadata::Value])
        .values_panic([key.into(), value.into()])
        .to_string(SqliteQueryBuilder)
}
