// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::error::{DomainError, DomainResult, ValidationErrors};

use chrono::Utc;
use common::{CreateProjectPayload, Project, ProjectOption, ProjectWithCompany, UpdateProjectPayload};
use sqlx::SqlitePool;
use tracing::{debug, info};

const HAS_DEPENDENTS: &str = "cannot delete project with associated tasks";

/// Validates a candidate project state. Uniqueness of `name` is scoped to
/// the owning company: the same name under another company is fine.
async fn validate_project(
    pool: &SqlitePool,
    name: &str,
    company_id: i64,
    exclude_id: Option<i64>,
) -> DomainResult<()> {
    let mut errors = ValidationErrors::default();

    if name.trim().is_empty() {
        errors.add("name", "is required");
    }

    let company_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies WHERE id = ?")
        .bind(company_id)
        .fetch_one(pool)
        .await?;
    if company_exists == 0 {
        errors.add("company", "must exist");
    }

    if !name.trim().is_empty() && company_exists > 0 {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE company_id = ? AND name = ? AND id != COALESCE(?, -1)",
        )
        .bind(company_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        if taken > 0 {
            errors.add("name", "is already taken for this company");
        }
    }

    errors.into_result()
}

pub async fn find_project_in_db(pool: &SqlitePool, id: i64) -> DomainResult<Project> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "project",
            id,
        })
}

/// Inserts a new project into the database.
pub async fn create_project_in_db(
    pool: &SqlitePool,
    payload: CreateProjectPayload,
) -> DomainResult<Project> {
    validate_project(pool, &payload.name, payload.company_id, None).await?;

    let now = Utc::now();
    debug!(
        "Insert values: name={}, company_id={}",
        payload.name, payload.company_id
    );

    let id = sqlx::query(
        "INSERT INTO projects (name, company_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&payload.name)
    .bind(payload.company_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Project {
        id,
        name: payload.name,
        company_id: payload.company_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn update_project_in_db(
    pool: &SqlitePool,
    id: i64,
    payload: UpdateProjectPayload,
) -> DomainResult<Project> {
    let existing = find_project_in_db(pool, id).await?;

    let name = payload.name.unwrap_or(existing.name);
    let company_id = payload.company_id.unwrap_or(existing.company_id);
    validate_project(pool, &name, company_id, Some(id)).await?;

    let now = Utc::now();
    sqlx::query("UPDATE projects SET name = ?, company_id = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(company_id)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Project {
        id,
        name,
        company_id,
        created_at: existing.created_at,
        updated_at: now,
    })
}

/// Hard delete, refused while dependent tasks exist. The refusal is a
/// has-dependents condition, not a validation failure.
pub async fn delete_project_in_db(pool: &SqlitePool, id: i64) -> DomainResult<()> {
    find_project_in_db(pool, id).await?;

    let dependents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE project_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if dependents > 0 {
        debug!("Refusing to delete project {}: {} tasks", id, dependents);
        return Err(DomainError::HasDependents(HAS_DEPENDENTS));
    }

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    info!("Project {} deleted.", id);
    Ok(())
}

/// Projects joined with their company name, most recent first.
pub async fn get_projects_from_db(pool: &SqlitePool) -> DomainResult<Vec<ProjectWithCompany>> {
    let projects = sqlx::query_as::<_, ProjectWithCompany>(
        "SELECT p.id, p.name, p.company_id, c.name AS company_name, p.created_at
         FROM projects p
         JOIN companies c ON c.id = p.company_id
         ORDER BY p.created_at DESC, p.id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(projects)
}

/// The dependent-dropdown feed: `{id, name}` pairs for one company, ordered
/// by name. An unknown or absent company yields an empty list, never an
/// error.
pub async fn get_project_options_from_db(
    pool: &SqlitePool,
    company_id: Option<i64>,
) -> DomainResult<Vec<ProjectOption>> {
    let Some(company_id) = company_id else {
        return Ok(Vec::new());
    };

    let options = sqlx::query_as::<_, ProjectOption>(
        "SELECT id, name FROM projects WHERE company_id = ? ORDER BY name ASC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(options)
}
