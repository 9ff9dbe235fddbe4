//! Integration tests for the updater
//!
//! These tests use wiremock to stand up a fake registry and run full
//! update cycles against temporary data directories.

mod cache_tests;
mod common;
mod run_tests;
