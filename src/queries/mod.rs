pub mod analyses;
pub mod ddl;
pub mod metadata;
pub mod recordings;
