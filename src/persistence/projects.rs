//! Project persistence.
//!
//! CRUD operations for projects: named bundles of a connection block, a SQL
//! script, tags, and a description.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

/// Raw database row for a project.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub tags: String,
    pub connections: Option<String>,
    pub script: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A saved project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Connection block text in the env format, when saved.
    pub connections: Option<String>,
    /// SQL script text, when saved.
    pub script: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        let tags: Vec<String> = serde_json::from_str(&row.tags).unwrap_or_default();

        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            tags,
            connections: row.connections,
            script: row.script,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PROJECT_COLUMNS: &str =
    "id, name, description, tags, connections, script, created_at, updated_at";

/// Creates a new project. Fails if the name is already taken.
pub async fn create_project(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    tags: &[String],
) -> Result<Project> {
    if name.trim().is_empty() {
        return Err(ForgeError::validation("Project name must not be empty"));
    }

    let tags_json = serde_json::to_string(tags)
        .map_err(|e| ForgeError::persistence(format!("Failed to serialize tags: {e}")))?;

    sqlx::query("INSERT INTO projects (name, description, tags) VALUES (?, ?, ?)")
        .bind(name)
        .bind(description)
        .bind(&tags_json)
        .execute(pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                ForgeError::validation(format!("Project '{name}' already exists"))
            } else {
                ForgeError::persistence(format!("Failed to create project: {e}"))
            }
        })?;

    get_project(pool, name)
        .await?
        .ok_or_else(|| ForgeError::internal("Project missing immediately after insert"))
}

/// Lists all projects, newest first.
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows: Vec<ProjectRow> = sqlx::query_as(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY updated_at DESC, name"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| ForgeError::persistence(format!("Failed to list projects: {e}")))?;

    Ok(rows.into_iter().map(Project::from).collect())
}

/// Gets a project by name.
pub async fn get_project(pool: &SqlitePool, name: &str) -> Result<Option<Project>> {
    let row: Option<ProjectRow> = sqlx::query_as(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE name = ?"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(|e| ForgeError::persistence(format!("Failed to get project: {e}")))?;

    Ok(row.map(Project::from))
}

/// Saves the connection block and script for an existing project.
pub async fn save_project(
    pool: &SqlitePool,
    name: &str,
    connections: Option<&str>,
    script: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE projects
        SET connections = COALESCE(?, connections),
            script = COALESCE(?, script),
            updated_at = datetime('now')
        WHERE name = ?
        "#,
    )
    .bind(connections)
    .bind(script)
    .bind(name)
    .execute(pool)
    .await
    .map_err(|e| ForgeError::persistence(format!("Failed to save project: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(ForgeError::validation(format!(
            "Project '{name}' not found"
        )));
    }

    Ok(())
}

/// Deletes a project by name.
pub async fn delete_project(pool: &SqlitePool, name: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM projects WHERE name = ?")
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| ForgeError::persistence(format!("Failed to delete project: {e}")))?;

    if result.rows_affected() == 0 {
        return Err(ForgeError::validation(format!(
            "Project '{name}' not found"
        )));
    }

    Ok(())
}
