//! Integration tests for tenant-forge.

pub mod fanout_test;
pub mod persistence_test;
pub mod postgres_test;
