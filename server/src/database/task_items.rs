// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Task item storage. Every mutation checks the delivered-task freeze first,
//! then runs the write and the parent task's two derived-field recomputes in
//! a single transaction, so a crash can never leave the cached sum stale.

use crate::database::tasks::{recalculate_status, recalculate_validated_hours};
use crate::error::{DomainError, DomainResult, ValidationErrors};

use chrono::{NaiveTime, Utc};
use common::{
    hours_between, CreateTaskItemPayload, TaskItem, TaskItemStatus, TaskStatus,
    UpdateTaskItemPayload,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

/// The interval rule: an item must end strictly after it starts.
fn validate_interval(start_time: NaiveTime, end_time: NaiveTime) -> DomainResult<()> {
    let mut errors = ValidationErrors::default();
    if end_time <= start_time {
        errors.add("end_time", "must be after the start time");
    }
    errors.into_result()
}

/// The freeze rule: no item mutation once the parent task is delivered.
/// Checked as a precondition inside the mutation's transaction.
async fn ensure_task_not_delivered(
    conn: &mut SqliteConnection,
    task_id: i64,
) -> DomainResult<()> {
    let status: Option<TaskStatus> = sqlx::query_scalar("SELECT status FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(&mut *conn)
        .await?;
    match status {
        None => Err(DomainError::NotFound {
            entity: "task",
            id: task_id,
        }),
        Some(status) if status.is_delivered() => Err(DomainError::TaskDelivered),
        Some(_) => Ok(()),
    }
}

async fn find_item(conn: &mut SqliteConnection, id: i64) -> DomainResult<TaskItem> {
    sqlx::query_as::<_, TaskItem>("SELECT * FROM task_items WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "task item",
            id,
        })
}

/// Items of a task, most recently created first.
pub async fn get_task_items_from_db(pool: &SqlitePool, task_id: i64) -> DomainResult<Vec<TaskItem>> {
    let task_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_one(pool)
        .await?;
    if task_exists == 0 {
        return Err(DomainError::NotFound {
            entity: "task",
            id: task_id,
        });
    }

    let items = sqlx::query_as::<_, TaskItem>(
        "SELECT * FROM task_items WHERE task_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

/// Inserts a new item and brings the parent task's derived fields along.
pub async fn create_task_item_in_db(
    pool: &SqlitePool,
    task_id: i64,
    payload: CreateTaskItemPayload,
) -> DomainResult<TaskItem> {
    let mut tx = pool.begin().await?;
    ensure_task_not_delivered(&mut tx, task_id).await?;
    validate_interval(payload.start_time, payload.end_time)?;

    let status = payload.status.unwrap_or_default();
    let hours_worked = hours_between(payload.start_time, payload.end_time);
    let now = Utc::now();
    debug!(
        "Insert values: task_id={}, start_time={}, end_time={}, hours_worked={}, status={:?}",
        task_id, payload.start_time, payload.end_time, hours_worked, status
    );

    let id = sqlx::query(
        "INSERT INTO task_items (task_id, start_time, end_time, hours_worked, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(hours_worked)
    .bind(status)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    recalculate_status(&mut tx, task_id).await?;
    recalculate_validated_hours(&mut tx, task_id).await?;
    tx.commit().await?;

    info!("Task item created successfully with ID: {}", id);

    Ok(TaskItem {
        id,
        task_id,
        start_time: payload.start_time,
        end_time: payload.end_time,
        hours_worked,
        status,
        created_at: now,
        updated_at: now,
    })
}

/// Updates an item; `hours_worked` is re-derived from the final interval.
pub async fn update_task_item_in_db(
    pool: &SqlitePool,
    id: i64,
    payload: UpdateTaskItemPayload,
) -> DomainResult<TaskItem> {
    let mut tx = pool.begin().await?;
    let existing = find_item(&mut tx, id).await?;
    ensure_task_not_delivered(&mut tx, existing.task_id).await?;

    let start_time = payload.start_time.unwrap_or(existing.start_time);
    let end_time = payload.end_time.unwrap_or(existing.end_time);
    let status = payload.status.unwrap_or(existing.status);
    validate_interval(start_time, end_time)?;

    let hours_worked = hours_between(start_time, end_time);
    let now = Utc::now();
    sqlx::query(
        "UPDATE task_items SET start_time = ?, end_time = ?, hours_worked = ?, status = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(start_time)
    .bind(end_time)
    .bind(hours_worked)
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    recalculate_status(&mut tx, existing.task_id).await?;
    recalculate_validated_hours(&mut tx, existing.task_id).await?;
    tx.commit().await?;

    info!("Task item {} updated.", id);

    Ok(TaskItem {
        id,
        task_id: existing.task_id,
        start_time,
        end_time,
        hours_worked,
        status,
        created_at: existing.created_at,
        updated_at: now,
    })
}

/// Deletes an item. The freeze applies here exactly as it does to writes,
/// and the parent's derived fields are recomputed from the survivors.
pub async fn delete_task_item_in_db(pool: &SqlitePool, id: i64) -> DomainResult<()> {
    let mut tx = pool.begin().await?;
    let existing = find_item(&mut tx, id).await?;
    ensure_task_not_delivered(&mut tx, existing.task_id).await?;

    sqlx::query("DELETE FROM task_items WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    recalculate_status(&mut tx, existing.task_id).await?;
    recalculate_validated_hours(&mut tx, existing.task_id).await?;
    tx.commit().await?;

    info!("Task item {} deleted.", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tasks::{find_task_in_db, update_task_in_db};
    use crate::database::test_support::{seed_company, seed_project, seed_task, setup_test_db};
    use common::UpdateTaskPayload;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn create_payload(
        start: NaiveTime,
        end: NaiveTime,
        status: TaskItemStatus,
    ) -> CreateTaskItemPayload {
        CreateTaskItemPayload {
            start_time: start,
            end_time: end,
            status: Some(status),
        }
    }

    async fn seed_task_in(pool: &SqlitePool) -> common::Task {
        let company = seed_company(pool, "Acme", 100.0).await;
        let project = seed_project(pool, company.id, "Alpha").await;
        seed_task(pool, company.id, project.id).await
    }

    async fn deliver_task(pool: &SqlitePool, task_id: i64) {
        update_task_in_db(
            pool,
            task_id,
            UpdateTaskPayload {
                name: None,
                company_id: None,
                project_id: None,
                start_date: None,
                estimated_hours: None,
                status: Some(TaskStatus::Delivered),
                notes: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_hours_worked_is_derived() {
        let pool = setup_test_db().await;
        let task = seed_task_in(&pool).await;

        let item = create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(9, 0), t(10, 30), TaskItemStatus::Pending),
        )
        .await
        .unwrap();
        assert_eq!(item.hours_worked, 1.5);

        let item = create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(8, 0), t(12, 15), TaskItemStatus::Pending),
        )
        .await
        .unwrap();
        assert_eq!(item.hours_worked, 4.25);

        // 77 minutes rounds to 1.28.
        let item = create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(9, 0), t(10, 17), TaskItemStatus::Pending),
        )
        .await
        .unwrap();
        assert_eq!(item.hours_worked, 1.28);
    }

    #[tokio::test]
    async fn test_end_time_must_follow_start_time() {
        let pool = setup_test_db().await;
        let task = seed_task_in(&pool).await;

        for end in [t(9, 0), t(8, 30)] {
            let result = create_task_item_in_db(
                &pool,
                task.id,
                create_payload(t(9, 0), end, TaskItemStatus::Pending),
            )
            .await;
            let Err(DomainError::Validation(errors)) = result else {
                panic!("expected a validation error");
            };
            assert_eq!(errors.on("end_time"), ["must be after the start time"]);
        }

        assert!(get_task_items_from_db(&pool, task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validated_hours_follow_item_changes() {
        let pool = setup_test_db().await;
        let task = seed_task_in(&pool).await;

        let first = create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(9, 0), t(10, 30), TaskItemStatus::Pending),
        )
        .await
        .unwrap();
        create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(13, 0), t(15, 0), TaskItemStatus::Pending),
        )
        .await
        .unwrap();

        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.validated_hours, Some(3.5));

        // Shrinking an interval shrinks the cached sum.
        update_task_item_in_db(
            &pool,
            first.id,
            UpdateTaskItemPayload {
                start_time: None,
                end_time: Some(t(10, 0)),
                status: None,
            },
        )
        .await
        .unwrap();
        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.validated_hours, Some(3.0));

        // Destroying one leaves the survivor's hours.
        delete_task_item_in_db(&pool, first.id).await.unwrap();
        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.validated_hours, Some(2.0));
    }

    #[tokio::test]
    async fn test_status_follows_latest_item() {
        let pool = setup_test_db().await;
        let task = seed_task_in(&pool).await;

        create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(9, 0), t(10, 0), TaskItemStatus::Completed),
        )
        .await
        .unwrap();
        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.status, TaskStatus::Completed);

        // A newer pending item reverts the task; completed is not sticky.
        let newer = create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(10, 0), t(11, 0), TaskItemStatus::Pending),
        )
        .await
        .unwrap();
        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.status, TaskStatus::Pending);

        // Destroying the latest item hands the status back to the previous
        // one.
        delete_task_item_in_db(&pool, newer.id).await.unwrap();
        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_destroying_last_item_leaves_status() {
        let pool = setup_test_db().await;
        let task = seed_task_in(&pool).await;

        let only = create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(9, 0), t(10, 0), TaskItemStatus::Completed),
        )
        .await
        .unwrap();
        delete_task_item_in_db(&pool, only.id).await.unwrap();

        // No items left: the recompute leaves the status where it was.
        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.status, TaskStatus::Completed);
        assert_eq!(refreshed.validated_hours, Some(0.0));
    }

    #[tokio::test]
    async fn test_delivered_task_freezes_items() {
        let pool = setup_test_db().await;
        let task = seed_task_in(&pool).await;
        let item = create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(9, 0), t(10, 30), TaskItemStatus::Completed),
        )
        .await
        .unwrap();

        deliver_task(&pool, task.id).await;

        let create = create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(11, 0), t(12, 0), TaskItemStatus::Pending),
        )
        .await;
        assert!(matches!(create, Err(DomainError::TaskDelivered)));

        let update = update_task_item_in_db(
            &pool,
            item.id,
            UpdateTaskItemPayload {
                start_time: None,
                end_time: Some(t(11, 0)),
                status: None,
            },
        )
        .await;
        assert!(matches!(update, Err(DomainError::TaskDelivered)));

        let destroy = delete_task_item_in_db(&pool, item.id).await;
        assert!(matches!(destroy, Err(DomainError::TaskDelivered)));

        // Neither the task nor the item moved.
        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.status, TaskStatus::Delivered);
        assert_eq!(refreshed.validated_hours, Some(1.5));
        let items = get_task_items_from_db(&pool, task.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].end_time, t(10, 30));
    }

    #[tokio::test]
    async fn test_delivered_status_is_never_recomputed() {
        let pool = setup_test_db().await;
        let task = seed_task_in(&pool).await;
        create_task_item_in_db(
            &pool,
            task.id,
            create_payload(t(9, 0), t(10, 0), TaskItemStatus::Pending),
        )
        .await
        .unwrap();

        deliver_task(&pool, task.id).await;

        // Even a manual recompute pass leaves a delivered task alone.
        let mut conn = pool.acquire().await.unwrap();
        recalculate_status(&mut conn, task.id).await.unwrap();
        let refreshed = find_task_in_db(&pool, task.id).await.unwrap();
        assert_eq!(refreshed.status, TaskStatus::Delivered);
    }

    #[tokio::test]
    async fn test_unknown_parent_task_is_not_found() {
        let pool = setup_test_db().await;

        let result = create_task_item_in_db(
            &pool,
            999,
            create_payload(t(9, 0), t(10, 0), TaskItemStatus::Pending),
        )
        .await;
        assert!(matches!(
            result,
            Err(DomainError::NotFound { entity: "task", .. })
        ));
    }
}
