//! End-to-end fan-out tests: connection block in, result set out, no server
//! required.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tenant_forge::descriptor::parse_connections;
use tenant_forge::error::ForgeError;
use tenant_forge::exec::{
    ExecutorOptions, FanoutExecutor, MockResolver, TargetBehavior, SUCCESS_MESSAGE,
};

const FLEET_BLOCK: &str = "\
POSTGRES_HOST_A = host-a.internal\n\
POSTGRES_DB_A = tenant_a\n\
POSTGRES_USER_A = admin\n\
\n\
POSTGRES_HOST_B = host-b.internal\n\
POSTGRES_DB_B = tenant_b\n\
POSTGRES_USER_B = admin\n\
\n\
POSTGRES_HOST_C = host-c.internal\n\
POSTGRES_DB_C = tenant_c\n\
POSTGRES_USER_C = admin\n";

fn executor(resolver: MockResolver) -> FanoutExecutor {
    FanoutExecutor::new(Arc::new(resolver), ExecutorOptions::default())
}

#[tokio::test]
async fn test_block_to_results_happy_path() {
    let targets = parse_connections(FLEET_BLOCK).unwrap();
    assert_eq!(targets.len(), 3);

    let exec = executor(MockResolver::new());
    let results = exec
        .execute("UPDATE settings SET value = 'on';", &targets)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(result.success, "{} failed: {}", result.connection_id, result.message);
        assert_eq!(result.message, SUCCESS_MESSAGE);
    }
}

#[tokio::test]
async fn test_one_unreachable_tenant_reports_others_truthfully() {
    let targets = parse_connections(FLEET_BLOCK).unwrap();

    let exec = executor(MockResolver::new().with_behavior(
        "tenant_b",
        TargetBehavior::RefuseConnection(
            "Cannot connect to host-b.internal:5432. Check that the server is running."
                .to_string(),
        ),
    ));
    let results = exec.execute("SELECT 1;", &targets).await.unwrap();

    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].connection_id, "tenant_b");
    assert!(failed[0].message.contains("connect"));
}

#[tokio::test]
async fn test_result_ids_match_input_ids_exactly() {
    let targets = parse_connections(FLEET_BLOCK).unwrap();

    let exec = executor(
        MockResolver::new()
            .with_behavior("tenant_a", TargetBehavior::FailExecution("boom".to_string()))
            .with_behavior("tenant_c", TargetBehavior::PanicOnExecute),
    );
    let results = exec.execute("SELECT 1;", &targets).await.unwrap();

    let mut input_ids: Vec<_> = targets.iter().map(|t| t.id.as_str()).collect();
    let mut output_ids: Vec<_> = results.iter().map(|r| r.connection_id.as_str()).collect();
    input_ids.sort();
    output_ids.sort();
    assert_eq!(input_ids, output_ids);
}

#[tokio::test]
async fn test_whitespace_script_never_touches_the_fleet() {
    let targets = parse_connections(FLEET_BLOCK).unwrap();

    let resolver = MockResolver::new();
    let acquires = resolver.acquire_counter();
    let exec = executor(resolver);

    let err = exec.execute("  \n  ", &targets).await.unwrap_err();
    assert!(matches!(err, ForgeError::Validation(_)));
    assert_eq!(acquires.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_call_duration_covers_slowest_target() {
    let targets = parse_connections(FLEET_BLOCK).unwrap();
    let delay = Duration::from_millis(120);

    let exec = executor(
        MockResolver::new().with_behavior("tenant_c", TargetBehavior::SucceedSlow(delay)),
    );

    let start = Instant::now();
    let results = exec.execute("SELECT 1;", &targets).await.unwrap();
    let total = start.elapsed();

    assert_eq!(results.len(), targets.len());
    assert!(total >= delay, "returned in {total:?}, before the slow target");
}
