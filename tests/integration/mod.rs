//! Integration tests for Quill.
//!
//! MySQL-backed tests are skipped unless DATABASE_URL is set.

pub mod executor_test;
pub mod mysql_test;
pub mod pipeline_test;
