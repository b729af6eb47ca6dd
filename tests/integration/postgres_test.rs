//! Fan-out tests against a real PostgreSQL server.
//!
//! Skipped unless DATABASE_URL is set. The URL's database is used as the
//! reachable target; unreachable targets use a non-routable address.

use std::time::Duration;

use tenant_forge::descriptor::ConnectionDescriptor;
use tenant_forge::exec::{ExecutorOptions, FanoutExecutor};

/// Builds a descriptor for the database DATABASE_URL points at.
fn reachable_target(id: &str) -> Option<ConnectionDescriptor> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let parsed = url::Url::parse(&url).ok()?;

    let mut desc = ConnectionDescriptor::new(
        id,
        parsed.host_str()?,
        parsed.port().unwrap_or(5432),
        parsed.path().strip_prefix('/')?,
    );
    if !parsed.username().is_empty() {
        desc.user = Some(parsed.username().to_string());
    }
    desc.password = parsed.password().map(String::from);
    Some(desc)
}

fn fast_fail_options() -> ExecutorOptions {
    ExecutorOptions {
        connect_timeout: Duration::from_secs(3),
        statement_timeout: Duration::from_secs(10),
        max_concurrency: None,
    }
}

#[tokio::test]
async fn test_mixed_fleet_reports_each_target_truthfully() {
    let Some(good) = reachable_target("good") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    // TEST-NET-1 address, guaranteed unreachable.
    let bad = ConnectionDescriptor::new("bad", "192.0.2.1", 5432, "dbx");

    let executor = FanoutExecutor::postgres(fast_fail_options());
    let results = executor
        .execute("SELECT 1;", &[good, bad])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);

    let good_result = results.iter().find(|r| r.connection_id == "good").unwrap();
    let bad_result = results.iter().find(|r| r.connection_id == "bad").unwrap();

    assert!(good_result.success, "good target failed: {}", good_result.message);
    assert!(!bad_result.success);
    let message = bad_result.message.to_lowercase();
    assert!(
        message.contains("connect") || message.contains("timed out"),
        "unexpected failure message: {message}"
    );
}

#[tokio::test]
async fn test_read_only_script_is_idempotent_against_real_target() {
    let Some(target) = reachable_target("repeat") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let executor = FanoutExecutor::postgres(fast_fail_options());
    let targets = vec![target];

    let first = executor.execute("SELECT 1;", &targets).await.unwrap();
    let second = executor.execute("SELECT 1;", &targets).await.unwrap();

    assert!(first[0].success, "{}", first[0].message);
    assert!(second[0].success, "{}", second[0].message);
    assert_eq!(first[0].message, second[0].message);
}

#[tokio::test]
async fn test_comment_only_script_is_a_successful_noop() {
    let Some(target) = reachable_target("noop") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let executor = FanoutExecutor::postgres(fast_fail_options());
    let results = executor
        .execute("-- maintenance window placeholder\n", &[target])
        .await
        .unwrap();

    assert!(results[0].success, "{}", results[0].message);
}

#[tokio::test]
async fn test_bad_sql_reports_driver_error_detail() {
    let Some(target) = reachable_target("syntax") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let executor = FanoutExecutor::postgres(fast_fail_options());
    let results = executor
        .execute("SELECT * FROM nonexistent_table_xyz;", &[target])
        .await
        .unwrap();

    assert!(!results[0].success);
    assert!(
        results[0].message.contains("nonexistent_table_xyz")
            || results[0].message.contains("does not exist"),
        "unexpected message: {}",
        results[0].message
    );
}
