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
use common::{CreateTaskPayload, Task, TaskDetail, TaskFilter, UpdateTaskPayload};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Handler for the filtered task listing.
pub async fn list_tasks(
    State(pool): State<SqlitePool>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>, DomainError> {
    let tasks = database::tasks::get_tasks_from_db(&pool, &filter).await?;
    info!("Successfully retrieved {} tasks.", tasks.len());
    Ok(Json(tasks))
}

/// Handler for one task with its items and computed figures.
pub async fn show_task(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<Json<TaskDetail>, DomainError> {
    let detail = database::tasks::get_task_detail_from_db(&pool, id).await?;
    Ok(Json(detail))
}

/// Handler for creating a new task.
pub async fn create_task(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<(StatusCode, Json<Task>), DomainError> {
    debug!("Received request to create task: {}", payload.name);
    let task = database::tasks::create_task_in_db(&pool, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Handler for updating a task (including explicit status transitions).
pub async fn update_task(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<Json<Task>, DomainError> {
    let task = database::tasks::update_task_in_db(&pool, id, payload).await?;
    Ok(Json(task))
}

/// Handler for deleting a task together with its items.
pub async fn delete_task(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<StatusCode, DomainError> {
    debug!("Attempting to delete task with ID: {}", id);
    database::tasks::delete_task_in_db(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
