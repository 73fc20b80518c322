// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;
use crate::error::DomainError;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use common::{CreateProjectPayload, Project, ProjectOption, ProjectWithCompany, UpdateProjectPayload};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

#[derive(Deserialize, Debug, Default)]
pub struct ProjectOptionsParams {
    pub company_id: Option<i64>,
}

/// Handler for listing projects with their company names.
pub async fn list_projects(
    State(pool): State<SqlitePool>,
) -> Result<Json<Vec<ProjectWithCompany>>, DomainError> {
    let projects = database::projects::get_projects_from_db(&pool).await?;
    info!("Successfully retrieved {} projects.", projects.len());
    Ok(Json(projects))
}

/// Handler feeding the dependent project dropdown. Always answers with a
/// list; an unknown or missing company id just yields an empty one.
pub async fn project_options(
    State(pool): State<SqlitePool>,
    Query(params): Query<ProjectOptionsParams>,
) -> Result<Json<Vec<ProjectOption>>, DomainError> {
    let options =
        database::projects::get_project_options_from_db(&pool, params.company_id).await?;
    Ok(Json(options))
}

/// Handler for creating a new project.
pub async fn create_project(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateProjectPayload>,
) -> Result<(StatusCode, Json<Project>), DomainError> {
    debug!(
        "Received request to create project {} for company {}",
        payload.name, payload.company_id
    );
    let project = database::projects::create_project_in_db(&pool, payload).await?;
    info!("Project created successfully with ID: {}", project.id);
    Ok((StatusCode::CREATED, Json(project)))
}

/// Handler for updating a project.
pub async fn update_project(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProjectPayload>,
) -> Result<Json<Project>, DomainError> {
    let project = database::projects::update_project_in_db(&pool, id, payload).await?;
    Ok(Json(project))
}

/// Handler for deleting a project; answers 409 while tasks depend on it.
pub async fn delete_project(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<StatusCode, DomainError> {
    debug!("Attempting to delete project with ID: {}", id);
    database::projects::delete_project_in_db(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
