use sea_query::Iden;

/// Metadata table - key-value store for database configuration
#[derive(Iden)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Recordings table - one row per submitted speech clip
#[derive(Iden)]
pub enum Recordings {
    Table,
    Id,
    Title,
    AudioUrl,
    DurationSeconds,
    RecordedAtMs,
}

/// Analyses table - scored feedback derived from a recording
#[derive(Iden)]
pub enum Analyses {
    Table,
    Id,
    RecordingId,
    Clarity,
    Pacing,
    EmotionalTone,
    Feedback,
    AnalyzedAtMs,
}
