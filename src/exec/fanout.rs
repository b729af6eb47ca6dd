//! Fan-out executor.
//!
//! Runs one SQL script against many independent connections concurrently and
//! produces a complete, per-target result set. The invariants:
//!
//! - exactly one `ExecutionResult` per input descriptor, keyed by its id;
//! - a failure on one target never cancels, blocks, or affects another;
//! - the call returns only after every target is terminal (join-all, not
//!   first-to-finish);
//! - only boundary validation aborts the call — everything downstream
//!   becomes data in the result set.

use crate::db::{ClientOptions, DatabaseClient};
use crate::descriptor::ConnectionDescriptor;
use crate::error::{ForgeError, Result};
use crate::exec::{ConnectionResolver, ExecutionResult, PgResolver};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Grace added on top of the connect and statement budgets before a target
/// is declared timed out, covering handle release and scheduling slack.
const TARGET_GRACE: Duration = Duration::from_secs(5);

/// Tuning for one fan-out call.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Budget for establishing each connection.
    pub connect_timeout: Duration,
    /// Budget for executing the script on each target.
    pub statement_timeout: Duration,
    /// Maximum targets running at once; `None` means bounded only by the
    /// number of targets in the call.
    pub max_concurrency: Option<usize>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        let client = ClientOptions::default();
        Self {
            connect_timeout: client.connect_timeout,
            statement_timeout: client.statement_timeout,
            max_concurrency: None,
        }
    }
}

impl ExecutorOptions {
    fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: self.connect_timeout,
            statement_timeout: self.statement_timeout,
        }
    }

    /// Overall budget for one target: connect, execute, release.
    fn target_budget(&self) -> Duration {
        self.connect_timeout + self.statement_timeout + TARGET_GRACE
    }
}

/// Runs one SQL script against many targets concurrently.
///
/// The executor holds no per-call state; one instance can serve any number
/// of sequential or concurrent calls.
pub struct FanoutExecutor {
    resolver: Arc<dyn ConnectionResolver>,
    options: ExecutorOptions,
}

impl FanoutExecutor {
    /// Creates an executor with an injected resolver.
    pub fn new(resolver: Arc<dyn ConnectionResolver>, options: ExecutorOptions) -> Self {
        Self { resolver, options }
    }

    /// Creates an executor backed by the production Postgres resolver.
    pub fn postgres(options: ExecutorOptions) -> Self {
        let resolver = PgResolver::new(options.client_options());
        Self::new(Arc::new(resolver), options)
    }

    /// Executes the script against every target and collects one result per
    /// target.
    ///
    /// Output order is not guaranteed to be meaningful; callers correlate by
    /// `connection_id`. An empty target list is a vacuous success; an empty
    /// or whitespace-only script is a validation error surfaced before any
    /// connection is attempted.
    pub async fn execute(
        &self,
        script: &str,
        targets: &[ConnectionDescriptor],
    ) -> Result<Vec<ExecutionResult>> {
        if script.trim().is_empty() {
            return Err(ForgeError::validation("SQL script is empty"));
        }
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        info!(targets = targets.len(), "dispatching script");

        let script: Arc<str> = Arc::from(script);
        let budget = self.options.target_budget();
        let semaphore = self
            .options
            .max_concurrency
            .map(|cap| Arc::new(Semaphore::new(cap.max(1))));

        let mut handles = Vec::with_capacity(targets.len());
        for descriptor in targets.iter().cloned() {
            let resolver = Arc::clone(&self.resolver);
            let script = Arc::clone(&script);
            let semaphore = semaphore.clone();
            let id = descriptor.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            // Semaphore is never closed while tasks run.
                            return ExecutionResult::failure(
                                descriptor.id.clone(),
                                "Internal error: concurrency limiter closed",
                                Duration::ZERO,
                            );
                        }
                    },
                    None => None,
                };
                run_target(resolver, script, descriptor, budget).await
            });
            handles.push((id, handle));
        }

        // Join-all: every task reaches a terminal state before the caller
        // sees anything. A panicked task still fills its slot.
        let (ids, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;

        let mut results = Vec::with_capacity(ids.len());
        for (id, outcome) in ids.into_iter().zip(joined) {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(connection = %id, "execution task did not complete: {e}");
                    results.push(ExecutionResult::failure(
                        id,
                        "Internal error: execution task panicked",
                        Duration::ZERO,
                    ));
                }
            }
        }

        let successful = results.iter().filter(|r| r.success).count();
        info!(
            total = results.len(),
            successful,
            failed = results.len() - successful,
            "fan-out complete"
        );

        Ok(results)
    }
}

/// Runs one target to a terminal state. Never returns an error: every
/// outcome, including timeout, is folded into the result.
async fn run_target(
    resolver: Arc<dyn ConnectionResolver>,
    script: Arc<str>,
    descriptor: ConnectionDescriptor,
    budget: Duration,
) -> ExecutionResult {
    let id = descriptor.id.clone();
    let start = Instant::now();

    let outcome = tokio::time::timeout(budget, execute_one(resolver, script, &descriptor)).await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(Ok(rows_affected)) => {
            debug!(connection = %id, rows_affected, ?elapsed, "target succeeded");
            ExecutionResult::success(id, rows_affected, elapsed)
        }
        Ok(Err(e)) => {
            warn!(connection = %id, ?elapsed, "target failed: {e}");
            ExecutionResult::failure(id, e.to_string(), elapsed)
        }
        Err(_) => {
            warn!(connection = %id, "target timed out after {:?}", budget);
            ExecutionResult::failure(
                id,
                format!("Target timed out after {} seconds", budget.as_secs()),
                elapsed,
            )
        }
    }
}

/// Acquire, execute, release. The handle is closed on both the success and
/// the error path; if the surrounding timeout fires, dropping this future
/// drops the handle, which closes the underlying connection.
async fn execute_one(
    resolver: Arc<dyn ConnectionResolver>,
    script: Arc<str>,
    descriptor: &ConnectionDescriptor,
) -> Result<u64> {
    let client: Box<dyn DatabaseClient> = resolver.acquire(descriptor).await?;
    let result = client.execute_script(&script).await;
    let _ = client.close().await;
    result
}
