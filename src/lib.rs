//! tenant-forge - run one SQL script against a fleet of PostgreSQL databases.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod descriptor;
pub mod error;
pub mod exec;
pub mod logging;
pub mod persistence;
