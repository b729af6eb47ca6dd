//! Integration tests for tenant-forge.
//!
//! Tests that need a running PostgreSQL database are gated on the
//! DATABASE_URL environment variable; everything else runs against
//! in-memory doubles.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
