//! Connection resolution for fan-out targets.
//!
//! A resolver turns a `ConnectionDescriptor` into a live database handle.
//! Each acquire produces a fresh handle owned by exactly one task; there is
//! no cross-call pooling. A failed acquire is not retried at this layer —
//! a bad password or unreachable host is not transient, and blind retries
//! would delay feedback and mask misconfiguration. Retry policy, if any,
//! belongs to the caller.

use crate::db::{
    self, ClientOptions, DatabaseClient, FailingDatabaseClient, MockDatabaseClient,
    PanickingDatabaseClient,
};
use crate::descriptor::ConnectionDescriptor;
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Turns connection descriptors into live database handles.
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    /// Establishes a fresh handle for the descriptor.
    async fn acquire(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>>;
}

/// Production resolver backed by the sqlx Postgres client.
pub struct PgResolver {
    options: ClientOptions,
}

impl PgResolver {
    /// Creates a resolver with the given client options.
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ConnectionResolver for PgResolver {
    async fn acquire(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        db::connect(descriptor, &self.options).await
    }
}

/// Scripted per-target behavior for `MockResolver`.
#[derive(Debug, Clone)]
pub enum TargetBehavior {
    /// Acquire and execution succeed immediately.
    Succeed,
    /// Acquire succeeds; every script sleeps for the given duration first.
    SucceedSlow(Duration),
    /// Acquire fails with the given connection error message.
    RefuseConnection(String),
    /// Acquire succeeds; every script fails with the given message.
    FailExecution(String),
    /// Acquire succeeds; script execution panics.
    PanicOnExecute,
}

/// Test resolver with per-id scripted behavior and an acquire counter.
///
/// Ids without a scripted behavior succeed. The counter lets tests assert
/// that validation failures dispatch zero connection attempts; the retained
/// close flags let them assert every handed-out handle was released.
#[derive(Default)]
pub struct MockResolver {
    behaviors: HashMap<String, TargetBehavior>,
    acquires: Arc<AtomicUsize>,
    close_flags: Arc<Mutex<HashMap<String, Vec<Arc<AtomicBool>>>>>,
}

impl MockResolver {
    /// Creates a resolver where every target succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the behavior for one connection id.
    pub fn with_behavior(mut self, id: impl Into<String>, behavior: TargetBehavior) -> Self {
        self.behaviors.insert(id.into(), behavior);
        self
    }

    /// Returns how many acquires have been attempted.
    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    /// Returns a handle to the acquire counter for use after the resolver
    /// has been moved into an executor.
    pub fn acquire_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.acquires)
    }

    /// Returns a handle to the close flags of every client handed out,
    /// keyed by connection id, for use after the resolver has been moved
    /// into an executor.
    pub fn close_flags(&self) -> Arc<Mutex<HashMap<String, Vec<Arc<AtomicBool>>>>> {
        Arc::clone(&self.close_flags)
    }

    fn record_close_flag(&self, id: &str, flag: Arc<AtomicBool>) {
        self.close_flags
            .lock()
            .expect("close flags lock")
            .entry(id.to_string())
            .or_default()
            .push(flag);
    }
}

#[async_trait]
impl ConnectionResolver for MockResolver {
    async fn acquire(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        self.acquires.fetch_add(1, Ordering::SeqCst);

        match self.behaviors.get(&descriptor.id) {
            None | Some(TargetBehavior::Succeed) => {
                let client = MockDatabaseClient::new();
                self.record_close_flag(&descriptor.id, client.closed_flag());
                Ok(Box::new(client))
            }
            Some(TargetBehavior::SucceedSlow(delay)) => {
                let client = MockDatabaseClient::with_delay(*delay);
                self.record_close_flag(&descriptor.id, client.closed_flag());
                Ok(Box::new(client))
            }
            Some(TargetBehavior::RefuseConnection(message)) => {
                Err(ForgeError::connection(message.clone()))
            }
            Some(TargetBehavior::FailExecution(message)) => {
                let client = FailingDatabaseClient::new(message.clone());
                self.record_close_flag(&descriptor.id, client.closed_flag());
                Ok(Box::new(client))
            }
            Some(TargetBehavior::PanicOnExecute) => Ok(Box::new(PanickingDatabaseClient)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_resolver_counts_acquires() {
        let resolver = MockResolver::new();
        let descriptor = ConnectionDescriptor::new("a", "localhost", 5432, "db1");

        assert_eq!(resolver.acquire_count(), 0);
        resolver.acquire(&descriptor).await.unwrap();
        resolver.acquire(&descriptor).await.unwrap();
        assert_eq!(resolver.acquire_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_resolver_records_close_flags() {
        let resolver = MockResolver::new()
            .with_behavior("broken", TargetBehavior::FailExecution("boom".to_string()));
        let flags = resolver.close_flags();

        let ok = ConnectionDescriptor::new("ok", "localhost", 5432, "db1");
        let broken = ConnectionDescriptor::new("broken", "localhost", 5432, "db2");
        let client = resolver.acquire(&ok).await.unwrap();
        resolver.acquire(&broken).await.unwrap();

        {
            let flags = flags.lock().unwrap();
            assert_eq!(flags["ok"].len(), 1);
            assert_eq!(flags["broken"].len(), 1);
            assert!(!flags["ok"][0].load(Ordering::SeqCst));
        }

        client.close().await.unwrap();
        assert!(flags.lock().unwrap()["ok"][0].load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_mock_resolver_refuses_connection() {
        let resolver = MockResolver::new().with_behavior(
            "bad",
            TargetBehavior::RefuseConnection("connection refused".to_string()),
        );
        let descriptor = ConnectionDescriptor::new("bad", "10.0.0.99", 5432, "dbx");

        let err = resolver.acquire(&descriptor).await.unwrap_err();
        assert!(matches!(err, ForgeError::Connection(_)));
        assert_eq!(resolver.acquire_count(), 1);
    }
}
