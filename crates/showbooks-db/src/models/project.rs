//! Projects, the top-level cost containers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Active,
    Closed,
}

/// A project. Natural key: `project_number`, assigned externally and never
/// generated here.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub project_number: i32,
    pub name: String,
    pub status: ProjectStatus,
    pub tax_ledger: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Build a fresh active project row.
    #[must_use]
    pub fn new(project_number: i32, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_number,
            name: name.to_string(),
            status: ProjectStatus::Active,
            tax_ledger: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Placeholder name used when a batch references a project the store has
    /// never seen.
    #[must_use]
    pub fn placeholder_name(project_number: i32) -> String {
        format!("{project_number}_untitled")
    }

    pub async fn find_by_number(
        pool: &PgPool,
        project_number: i32,
    ) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>("SELECT * FROM project WHERE project_number = $1")
            .bind(project_number)
            .fetch_optional(pool)
            .await
    }

    pub async fn insert(pool: &PgPool, row: &Project) -> Result<Project, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r"
            INSERT INTO project (
                id, project_number, name, status, tax_ledger, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(row.id)
        .bind(row.project_number)
        .bind(&row.name)
        .bind(row.status)
        .bind(&row.tax_ledger)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_projects_are_active() {
        let project = Project::new(2417, "Night Shoot");
        assert_eq!(project.status, ProjectStatus::Active);
        assert_eq!(project.project_number, 2417);
    }

    #[test]
    fn placeholder_name_carries_the_number() {
        assert_eq!(Project::placeholder_name(2417), "2417_untitled");
    }
}
