/// Expected database schema version
/// Databases created with a different version are refused at startup
pub const EXPECTED_DB_VERSION: &str = "1";

/// Default port for the HTTP API
pub const DEFAULT_API_PORT: u16 = 3000;

/// Default upper bound on a single analyzer run, in seconds
pub const DEFAULT_ANALYZER_TIMEOUT_SECS: u64 = 120;

/// Default number of analyzer subprocesses allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_ANALYSES: usize = 4;

/// Prefix for temporary audio files materialized from `data:` URLs
pub const TEMP_AUDIO_PREFIX: &str = "speech_";
