//! Project store integration tests against a real on-disk state database.

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tenant_forge::descriptor::parse_connections;
use tenant_forge::persistence::{projects, StateDb};

const BLOCK: &str = "\
POSTGRES_HOST_A = localhost\n\
POSTGRES_DB_A = tenant_a\n";

#[tokio::test]
async fn test_project_round_trip_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let db = StateDb::open(&path).await.unwrap();
        projects::create_project(db.pool(), "fleet", "all tenants", &["prod".to_string()])
            .await
            .unwrap();
        projects::save_project(db.pool(), "fleet", Some(BLOCK), Some("SELECT 1;"))
            .await
            .unwrap();
        db.close().await;
    }

    let db = StateDb::open(&path).await.unwrap();
    let project = projects::get_project(db.pool(), "fleet")
        .await
        .unwrap()
        .expect("project survives reopen");

    assert_eq!(project.description, "all tenants");
    assert_eq!(project.tags, vec!["prod"]);
    assert_eq!(project.script.as_deref(), Some("SELECT 1;"));

    // The stored block parses back into usable targets.
    let targets = parse_connections(project.connections.as_deref().unwrap()).unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].id, "tenant_a");

    db.close().await;
}

#[tokio::test]
async fn test_projects_are_isolated_by_name() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");
    let db = StateDb::open(&path).await.unwrap();

    projects::create_project(db.pool(), "alpha", "", &[]).await.unwrap();
    projects::create_project(db.pool(), "beta", "", &[]).await.unwrap();
    projects::save_project(db.pool(), "alpha", Some(BLOCK), None)
        .await
        .unwrap();

    let beta = projects::get_project(db.pool(), "beta").await.unwrap().unwrap();
    assert_eq!(beta.connections, None);

    projects::delete_project(db.pool(), "alpha").await.unwrap();
    let remaining = projects::list_projects(db.pool()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "beta");

    db.close().await;
}
