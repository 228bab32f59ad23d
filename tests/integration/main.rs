//! Integration tests for the pipeline
//!
//! These tests use wiremock to stand in for the directory site and exercise
//! the fetch client, every discovery source and the full pipeline end-to-end.

mod common;
mod discovery_tests;
mod fetch_tests;
mod pipeline_tests;
