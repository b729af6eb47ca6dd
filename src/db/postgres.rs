//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient`
//! trait for PostgreSQL targets using sqlx.
//!
//! Each client wraps a single-connection pool created fresh for one fan-out
//! task. Connect failures are not retried here: for a fan-out, a bad
//! password or unreachable host must fail fast into that target's result
//! slot instead of delaying the aggregate.

use crate::db::{ClientOptions, DatabaseClient};
use crate::descriptor::ConnectionDescriptor;
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::debug;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PostgresClient {
    /// Establishes a connection for the given descriptor.
    ///
    /// The descriptor's `schema` (when present) is applied as the session
    /// `search_path` before any script runs.
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        options: &ClientOptions,
    ) -> Result<Self> {
        let conn_str = descriptor.to_connection_string()?;

        debug!(id = %descriptor.id, "connecting to {}", descriptor.display_string());

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(options.connect_timeout)
            .connect(&conn_str)
            .await
            .map_err(|e| map_connection_error(e, descriptor))?;

        let client = Self {
            pool,
            statement_timeout: options.statement_timeout,
        };

        if let Some(schema) = &descriptor.schema {
            client.set_search_path(schema).await?;
        }

        Ok(client)
    }

    /// Creates a new PostgresClient from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: ClientOptions::default().statement_timeout,
        }
    }

    /// Sets the session search_path. Sticks for the pool's lifetime because
    /// the pool holds a single connection.
    async fn set_search_path(&self, schema: &str) -> Result<()> {
        let quoted = format!("\"{}\"", schema.replace('"', "\"\""));
        sqlx::raw_sql(&format!("SET search_path TO {quoted}"))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                ForgeError::connection(format!("Failed to set schema '{schema}': {e}"))
            })?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute_script(&self, sql: &str) -> Result<u64> {
        let timeout_secs = self.statement_timeout.as_secs();

        // raw_sql executes multi-statement scripts via the simple query
        // protocol, which is what `;`-separated scripts need.
        let result = tokio::time::timeout(
            self.statement_timeout,
            sqlx::raw_sql(sql).execute(&self.pool),
        )
        .await
        .map_err(|_| {
            ForgeError::execution(format!("Script timed out after {timeout_secs} seconds"))
        })?
        .map_err(|e| ForgeError::execution(format_execution_error(e)))?;

        Ok(result.rows_affected())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, descriptor: &ConnectionDescriptor) -> ForgeError {
    let host = &descriptor.host;
    let port = descriptor.port;
    let user = descriptor.user.as_deref().unwrap_or("unknown");
    let database = &descriptor.database;

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ForgeError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        ForgeError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        ForgeError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        ForgeError::connection(
            "Server requires SSL. Add '?sslmode=require' to connection parameters.".to_string(),
        )
    } else if error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("pool timed out")
    {
        ForgeError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ForgeError::connection(error.to_string())
    }
}

/// Formats a script execution error, surfacing Postgres DETAIL/HINT fields
/// when available. The full driver text is kept, never truncated.
fn format_execution_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
        if let Some(table) = pg_error.table() {
            result.push_str("\n  TABLE: ");
            result.push_str(table);
        }
        if let Some(constraint) = pg_error.constraint() {
            result.push_str("\n  CONSTRAINT: ");
            result.push_str(constraint);
        }
    }

    result
}
