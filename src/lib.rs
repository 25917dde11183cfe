// Library interface for the server binary and integration tests

pub mod analyzer;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod queries;
pub mod schema;
pub mod serve;
pub mod storage;

// Re-export the expected database version for convenience
pub use constants::EXPECTED_DB_VERSION;
