//! The multi-target SQL execution engine.
//!
//! `FanoutExecutor` runs one script against many independent connections
//! concurrently; `ConnectionResolver` turns descriptors into live handles.
//! Per-target failures become data (`ExecutionResult`), never errors across
//! the fan-out boundary.

mod fanout;
mod resolver;

pub use fanout::{ExecutorOptions, FanoutExecutor};
pub use resolver::{ConnectionResolver, MockResolver, PgResolver, TargetBehavior};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed confirmation message for successful targets.
pub const SUCCESS_MESSAGE: &str = "Script executed successfully";

/// Outcome of running the script against one target.
///
/// Exactly one result is produced per input descriptor; `connection_id`
/// echoes the descriptor's id and is the caller's correlation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub connection_id: String,
    pub success: bool,
    /// Fixed confirmation text on success, the full error detail on failure.
    pub message: String,
    /// Rows affected by the script, when the target reported it.
    pub rows_affected: Option<u64>,
    /// Wall-clock time the target took to reach a terminal state.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// Creates a successful result for a target.
    pub fn success(connection_id: impl Into<String>, rows_affected: u64, elapsed: Duration) -> Self {
        Self {
            connection_id: connection_id.into(),
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            rows_affected: Some(rows_affected),
            elapsed,
        }
    }

    /// Creates a failed result carrying the error detail.
    pub fn failure(
        connection_id: impl Into<String>,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            success: false,
            message: message.into(),
            rows_affected: None,
            elapsed,
        }
    }
}

/// Serde support for Duration as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
