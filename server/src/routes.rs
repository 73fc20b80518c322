// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::handlers;
use axum::{
    routing::{get, patch, put},
    Router,
};
use sqlx::SqlitePool;

/// Creates and configures the application router.
pub fn create_router(pool: SqlitePool) -> Router {
    Router::new()
        // Companies: listing/create, edits, the soft-delete flips, and the
        // guarded hard delete
        .route(
            "/api/companies",
            get(handlers::companies::list_companies).post(handlers::companies::create_company),
        )
        .route(
            "/api/companies/{id}",
            put(handlers::companies::update_company).delete(handlers::companies::delete_company),
        )
        .route(
            "/api/companies/{id}/deactivate",
            patch(handlers::companies::deactivate_company),
        )
        .route(
            "/api/companies/{id}/activate",
            patch(handlers::companies::activate_company),
        )
        // Projects, including the dependent-dropdown options feed
        .route(
            "/api/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/api/projects/options",
            get(handlers::projects::project_options),
        )
        .route(
            "/api/projects/{id}",
            put(handlers::projects::update_project).delete(handlers::projects::delete_project),
        )
        // Tasks and their worked-time items
        .route(
            "/api/tasks",
            get(handlers::tasks::list_tasks).post(handlers::tasks::create_task),
        )
        .route(
            "/api/tasks/{id}",
            get(handlers::tasks::show_task)
                .put(handlers::tasks::update_task)
                .delete(handlers::tasks::delete_task),
        )
        .route(
            "/api/tasks/{id}/items",
            get(handlers::task_items::list_task_items)
                .post(handlers::task_items::create_task_item),
        )
        .route(
            "/api/task-items/{id}",
            put(handlers::task_items::update_task_item)
                .delete(handlers::task_items::delete_task_item),
        )
        // Adds the database pool to the application state
        .with_state(pool)
}
