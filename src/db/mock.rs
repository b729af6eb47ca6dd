//! Mock database clients for testing.
//!
//! In-memory stand-ins for `PostgresClient` so fan-out behavior can be
//! tested without a server.

use super::DatabaseClient;
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock database client that records executed scripts.
///
/// An optional delay before completing makes it usable as the "artificially
/// slow target" in join-all tests.
#[derive(Debug)]
pub struct MockDatabaseClient {
    delay: Option<Duration>,
    rows_affected: u64,
    executed: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockDatabaseClient {
    /// Creates a mock client that succeeds instantly.
    pub fn new() -> Self {
        Self {
            delay: None,
            rows_affected: 1,
            executed: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a mock client that sleeps before completing each script.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Returns the scripts executed so far.
    pub fn executed_scripts(&self) -> Vec<String> {
        self.executed.lock().expect("executed lock").clone()
    }

    /// Returns a handle observing whether `close` was called.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_script(&self, sql: &str) -> Result<u64> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.executed
            .lock()
            .expect("executed lock")
            .push(sql.to_string());
        Ok(self.rows_affected)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A mock client whose every script execution fails.
#[derive(Debug)]
pub struct FailingDatabaseClient {
    message: String,
    closed: Arc<AtomicBool>,
}

impl FailingDatabaseClient {
    /// Creates a failing client with the given driver-style error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a handle observing whether `close` was called.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn execute_script(&self, _sql: &str) -> Result<u64> {
        Err(ForgeError::execution(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A mock client that panics on execution, for exercising the fan-out's
/// panic containment.
#[derive(Debug)]
pub struct PanickingDatabaseClient;

#[async_trait]
impl DatabaseClient for PanickingDatabaseClient {
    async fn execute_script(&self, _sql: &str) -> Result<u64> {
        panic!("mock client panic");
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_scripts() {
        let client = MockDatabaseClient::new();
        client.execute_script("SELECT 1;").await.unwrap();
        client.execute_script("SELECT 2;").await.unwrap();

        assert_eq!(client.executed_scripts(), vec!["SELECT 1;", "SELECT 2;"]);
    }

    #[tokio::test]
    async fn test_mock_close_flag() {
        let client = MockDatabaseClient::new();
        let closed = client.closed_flag();
        assert!(!closed.load(Ordering::SeqCst));

        client.close().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = FailingDatabaseClient::new("syntax error at or near \"SELEC\"");
        let err = client.execute_script("SELEC 1;").await.unwrap_err();
        assert!(err.to_string().contains("SELEC"));

        let closed = client.closed_flag();
        client.close().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }
}
