//! Integration tests for Quill.
//!
//! Pipeline and executor tests run against the mock LLM and mock database.
//! MySQL tests require a running server; set DATABASE_URL to run them.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
