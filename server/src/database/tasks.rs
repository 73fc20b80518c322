// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Task storage plus the consistency engine: the pair of derived-field
//! recomputes (`recalculate_validated_hours`, `recalculate_status`) that keep
//! a task in sync with its items. The recomputes write columns directly and
//! never pass through the validation gate or the date stamps; they are
//! `pub(crate)` so the only external mutation path is the validated one.

use crate::error::{DomainError, DomainResult, ValidationErrors};

use chrono::Utc;
use common::{
    parse_clock, ClockParseError, CreateTaskPayload, EstimatedHours, Task, TaskDetail, TaskFilter,
    TaskItem, TaskItemStatus, TaskStatus, UpdateTaskPayload,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

/// Tolerance when comparing the stored `validated_hours` against a fresh
/// sum; float summation noise must not trigger writes.
const HOURS_EPSILON: f64 = 1e-9;

/// Resolves the dual estimated-hours representation into decimal hours,
/// recording any problems on the `estimated_hours` field.
fn resolve_estimated_hours(input: &EstimatedHours, errors: &mut ValidationErrors) -> Option<f64> {
    match input {
        EstimatedHours::Decimal(value) => {
            if *value <= 0.0 {
                errors.add("estimated_hours", "must be greater than zero");
                None
            } else {
                Some(*value)
            }
        }
        EstimatedHours::Clock(text) => {
            if text.trim().is_empty() {
                errors.add("estimated_hours", "is required");
                return None;
            }
            match parse_clock(text) {
                Err(ClockParseError::Format) => {
                    errors.add(
                        "estimated_hours",
                        "must be in HH:MM format (e.g. 03:00, 02:30)",
                    );
                    None
                }
                Err(ClockParseError::Range) => {
                    errors.add(
                        "estimated_hours",
                        "must contain valid hours (00-23) and minutes (00-59)",
                    );
                    None
                }
                Ok(decimal) if decimal <= 0.0 => {
                    errors.add("estimated_hours", "must be greater than zero");
                    None
                }
                Ok(decimal) => Some(decimal),
            }
        }
    }
}

/// Validates name plus the reference pair: both company and project must
/// exist, and the project must belong to the same company as the task.
async fn validate_task_references(
    pool: &SqlitePool,
    name: &str,
    company_id: i64,
    project_id: i64,
    errors: &mut ValidationErrors,
) -> Result<(), sqlx::Error> {
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

    let project_company: Option<i64> =
        sqlx::query_scalar("SELECT company_id FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(pool)
            .await?;
    match project_company {
        None => errors.add("project", "must exist"),
        Some(owner) if company_exists > 0 && owner != company_id => {
            errors.add("project", "must belong to the same company");
        }
        Some(_) => {}
    }

    Ok(())
}

fn hydrate(mut task: Task) -> Task {
    task.sync_estimated_hours_hm();
    task
}

pub async fn find_task_in_db(pool: &SqlitePool, id: i64) -> DomainResult<Task> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(hydrate)
        .ok_or(DomainError::NotFound { entity: "task", id })
}

/// Inserts a new task. The status always starts out pending regardless of
/// the payload; transitions happen through updates.
pub async fn create_task_in_db(pool: &SqlitePool, payload: CreateTaskPayload) -> DomainResult<Task> {
    let mut errors = ValidationErrors::default();
    let estimated_hours = resolve_estimated_hours(&payload.estimated_hours, &mut errors);
    validate_task_references(
        pool,
        &payload.name,
        payload.company_id,
        payload.project_id,
        &mut errors,
    )
    .await?;
    errors.into_result()?;
    let estimated_hours = estimated_hours.expect("validated above");

    let now = Utc::now();
    debug!(
        "Insert values: name={}, company_id={}, project_id={}, estimated_hours={}",
        payload.name, payload.company_id, payload.project_id, estimated_hours
    );

    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        "INSERT INTO tasks (name, company_id, project_id, start_date, status, estimated_hours, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&payload.name)
    .bind(payload.company_id)
    .bind(payload.project_id)
    .bind(payload.start_date)
    .bind(TaskStatus::Pending)
    .bind(estimated_hours)
    .bind(&payload.notes)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    // Saving a task re-syncs its derived sum; with no items yet that pins
    // validated_hours at 0 rather than leaving it NULL.
    let validated_hours = recalculate_validated_hours(&mut tx, id).await?;
    tx.commit().await?;

    info!("Task created successfully with ID: {}", id);

    Ok(hydrate(Task {
        id,
        name: payload.name,
        company_id: payload.company_id,
        project_id: payload.project_id,
        start_date: payload.start_date,
        end_date: None,
        status: TaskStatus::Pending,
        delivery_date: None,
        estimated_hours,
        estimated_hours_hm: String::new(),
        validated_hours: Some(validated_hours),
        notes: payload.notes,
        created_at: now,
        updated_at: now,
    }))
}

/// Updates a task. An explicit status transition *to* completed stamps
/// `end_date`, *to* delivered stamps `delivery_date`; the stamps are one-way
/// and survive later transitions away.
pub async fn update_task_in_db(
    pool: &SqlitePool,
    id: i64,
    payload: UpdateTaskPayload,
) -> DomainResult<Task> {
    let existing = find_task_in_db(pool, id).await?;

    let name = payload.name.unwrap_or(existing.name);
    let company_id = payload.company_id.unwrap_or(existing.company_id);
    let project_id = payload.project_id.unwrap_or(existing.project_id);
    let start_date = payload.start_date.unwrap_or(existing.start_date);
    let status = payload.status.unwrap_or(existing.status);
    let notes = payload.notes.or(existing.notes);

    let mut errors = ValidationErrors::default();
    let estimated_hours = match &payload.estimated_hours {
        Some(input) => resolve_estimated_hours(input, &mut errors),
        None => Some(existing.estimated_hours),
    };
    validate_task_references(pool, &name, company_id, project_id, &mut errors).await?;
    errors.into_result()?;
    let estimated_hours = estimated_hours.expect("validated above");

    let today = Utc::now().date_naive();
    let mut end_date = existing.end_date;
    let mut delivery_date = existing.delivery_date;
    if status == TaskStatus::Completed && existing.status != TaskStatus::Completed {
        end_date = Some(today);
    }
    if status == TaskStatus::Delivered && existing.status != TaskStatus::Delivered {
        delivery_date = Some(today);
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE tasks SET name = ?, company_id = ?, project_id = ?, start_date = ?, end_date = ?,
                status = ?, delivery_date = ?, estimated_hours = ?, notes = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&name)
    .bind(company_id)
    .bind(project_id)
    .bind(start_date)
    .bind(end_date)
    .bind(status)
    .bind(delivery_date)
    .bind(estimated_hours)
    .bind(&notes)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let validated_hours = recalculate_validated_hours(&mut tx, id).await?;
    tx.commit().await?;

    info!("Task {} updated.", id);

    Ok(hydrate(Task {
        id,
        name,
        company_id,
        project_id,
        start_date,
        end_date,
        status,
        delivery_date,
        estimated_hours,
        estimated_hours_hm: String::new(),
        validated_hours: Some(validated_hours),
        notes,
        created_at: existing.created_at,
        updated_at: now,
    }))
}

/// Deletes a task together with its items. A delivered task that still has
/// items is frozen: the cascade would mutate frozen items, so the whole
/// deletion is refused.
pub async fn delete_task_in_db(pool: &SqlitePool, id: i64) -> DomainResult<()> {
    let task = find_task_in_db(pool, id).await?;

    let mut tx = pool.begin().await?;
    let item_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_items WHERE task_id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if task.status.is_delivered() && item_count > 0 {
        return Err(DomainError::TaskDelivered);
    }

    sqlx::query("DELETE FROM task_items WHERE task_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Task {} deleted with {} items.", id, item_count);
    Ok(())
}

/// Filtered task listing; the filters combine, most recent first.
pub async fn get_tasks_from_db(pool: &SqlitePool, filter: &TaskFilter) -> DomainResult<Vec<Task>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM tasks WHERE 1=1");
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(company_id) = filter.company_id {
        builder.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(project_id) = filter.project_id {
        builder.push(" AND project_id = ").push_bind(project_id);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    let tasks = builder
        .build_query_as::<Task>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(hydrate)
        .collect();
    Ok(tasks)
}

/// The task plus its items (most recent first) and the on-demand figures.
pub async fn get_task_detail_from_db(pool: &SqlitePool, id: i64) -> DomainResult<TaskDetail> {
    let task = find_task_in_db(pool, id).await?;

    let items = sqlx::query_as::<_, TaskItem>(
        "SELECT * FROM task_items WHERE task_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let total_hours = total_hours_in_db(pool, id).await?;
    let calculated_value = calculated_value_from_db(pool, &task, total_hours).await?;

    Ok(TaskDetail {
        task,
        items,
        total_hours,
        calculated_value,
    })
}

/// Sum of the items' worked hours; 0 with no items.
pub async fn total_hours_in_db(pool: &SqlitePool, task_id: i64) -> DomainResult<f64> {
    let total: f64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(hours_worked), 0.0) FROM task_items WHERE task_id = ?")
            .bind(task_id)
            .fetch_one(pool)
            .await?;
    Ok(total)
}

/// `hourly_rate x total hours`, computed on demand and never persisted.
/// Yields 0 when the company (and hence its rate) is unavailable.
async fn calculated_value_from_db(
    pool: &SqlitePool,
    task: &Task,
    total_hours: f64,
) -> Result<f64, sqlx::Error> {
    let rate: Option<f64> = sqlx::query_scalar("SELECT hourly_rate FROM companies WHERE id = ?")
        .bind(task.company_id)
        .fetch_optional(pool)
        .await?;
    Ok(rate.map(|rate| rate * total_hours).unwrap_or(0.0))
}

/// Re-derives `validated_hours` from the items and persists it when it
/// drifted. Direct column write: no validation pass, no `updated_at` touch.
/// Returns the fresh total.
pub(crate) async fn recalculate_validated_hours(
    conn: &mut SqliteConnection,
    task_id: i64,
) -> Result<f64, sqlx::Error> {
    let total: f64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(hours_worked), 0.0) FROM task_items WHERE task_id = ?")
            .bind(task_id)
            .fetch_one(&mut *conn)
            .await?;

    let stored: Option<f64> = sqlx::query_scalar("SELECT validated_hours FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_one(&mut *conn)
        .await?;

    let in_sync = stored.is_some_and(|stored| (stored - total).abs() <= HOURS_EPSILON);
    if !in_sync {
        sqlx::query("UPDATE tasks SET validated_hours = ? WHERE id = ?")
            .bind(total)
            .bind(task_id)
            .execute(&mut *conn)
            .await?;
        debug!("Task {} validated_hours set to {}", task_id, total);
    }

    Ok(total)
}

/// Re-derives the task status from the latest item.
///
/// Delivered tasks are terminal and never recomputed. Otherwise the item
/// with the most recent creation drives the status (completed item means a
/// completed task, anything else pending); identical timestamps break the
/// tie toward the highest id. With no items at all the status is left as
/// it is. Direct column write, same as the hours recompute: an automatic
/// transition to completed does not stamp `end_date`.
pub(crate) async fn recalculate_status(
    conn: &mut SqliteConnection,
    task_id: i64,
) -> Result<(), sqlx::Error> {
    let current: TaskStatus = sqlx::query_scalar("SELECT status FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_one(&mut *conn)
        .await?;
    if current.is_delivered() {
        return Ok(());
    }

    let latest: Option<TaskItemStatus> = sqlx::query_scalar(
        "SELECT status FROM task_items WHERE task_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(task_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(latest) = latest else {
        return Ok(());
    };

    let new_status = if latest == TaskItemStatus::Completed {
        TaskStatus::Completed
    } else {
        TaskStatus::Pending
    };
    if new_status != current {
        sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
            .bind(new_status)
            .bind(task_id)
            .execute(&mut *conn)
            .await?;
        debug!("Task {} status recomputed to {:?}", task_id, new_status);
    }

    Ok(())
}
