//! Database abstraction layer for tenant-forge.
//!
//! Provides a trait-based interface for script execution, allowing the
//! fan-out engine to run against real PostgreSQL targets in production and
//! in-memory doubles in tests.

mod mock;
mod postgres;

pub use mock::{FailingDatabaseClient, MockDatabaseClient, PanickingDatabaseClient};
pub use postgres::PostgresClient;

use crate::descriptor::{ConnectionDescriptor, DatabaseKind};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Tuning knobs for a single database handle.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// Budget for establishing the connection.
    pub connect_timeout: Duration,
    /// Budget for executing one script.
    pub statement_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_secs(30),
        }
    }
}

/// Creates a database client for the given descriptor.
///
/// This is the central factory function for database connections. The match
/// is exhaustive over `DatabaseKind`, so adding a kind without wiring a
/// client is a compile error rather than a silently ignored target.
pub async fn connect(
    descriptor: &ConnectionDescriptor,
    options: &ClientOptions,
) -> Result<Box<dyn DatabaseClient>> {
    match descriptor.kind {
        DatabaseKind::Postgres => {
            let client = PostgresClient::connect(descriptor, options).await?;
            Ok(Box::new(client))
        }
    }
}

/// Trait defining the interface for database clients.
///
/// A client owns exactly one target's handle for the duration of one
/// fan-out task and is never shared between tasks.
#[async_trait]
pub trait DatabaseClient: Send + Sync + std::fmt::Debug {
    /// Executes a SQL script (one or more `;`-separated statements) and
    /// returns the total number of rows affected.
    async fn execute_script(&self, sql: &str) -> Result<u64>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
