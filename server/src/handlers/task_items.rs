// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;
use crate::error::DomainError;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use common::{CreateTaskItemPayload, TaskItem, UpdateTaskItemPayload};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Handler for listing a task's items, most recent first.
pub async fn list_task_items(
    State(pool): State<SqlitePool>,
    Path(task_id): Path<i64>,
) -> Result<Json<Vec<TaskItem>>, DomainError> {
    let items = database::task_items::get_task_items_from_db(&pool, task_id).await?;
    info!("Successfully retrieved {} task items.", items.len());
    Ok(Json(items))
}

/// Handler for recording a worked interval on a task. Answers 409 once the
/// task is delivered.
pub async fn create_task_item(
    State(pool): State<SqlitePool>,
    Path(task_id): Path<i64>,
    Json(payload): Json<CreateTaskItemPayload>,
) -> Result<(StatusCode, Json<TaskItem>), DomainError> {
    debug!("Received request to create item for task {}", task_id);
    let item = database::task_items::create_task_item_in_db(&pool, task_id, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Handler for updating an item.
pub async fn update_task_item(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskItemPayload>,
) -> Result<Json<TaskItem>, DomainError> {
    let item = database::task_items::update_task_item_in_db(&pool, id, payload).await?;
    Ok(Json(item))
}

/// Handler for deleting an item. Subject to the same delivered-task freeze
/// as creates and updates.
pub async fn delete_task_item(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<StatusCode, DomainError> {
    debug!("Attempting to delete task item with ID: {}", id);
    database::task_items::delete_task_item_in_db(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
