// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::error::{DomainError, DomainResult, ValidationErrors};

use chrono::Utc;
use common::{Company, CreateCompanyPayload, UpdateCompanyPayload};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Refusal message for hard deletes while dependents exist.
const HAS_DEPENDENTS: &str =
    "cannot delete company with associated time entries; use deactivate instead";

/// Validates a candidate company state. Name uniqueness is a case-sensitive
/// exact match; `exclude_id` skips the row being updated.
async fn validate_company(
    pool: &SqlitePool,
    name: &str,
    hourly_rate: f64,
    exclude_id: Option<i64>,
) -> DomainResult<()> {
    let mut errors = ValidationErrors::default();

    if name.trim().is_empty() {
        errors.add("name", "is required");
    } else {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM companies WHERE name = ? AND id != COALESCE(?, -1)",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        if taken > 0 {
            errors.add("name", "is already taken");
        }
    }

    if hourly_rate <= 0.0 {
        errors.add("hourly_rate", "must be greater than zero");
    }

    errors.into_result()
}

/// Fetches a company or reports not-found.
pub async fn find_company_in_db(pool: &SqlitePool, id: i64) -> DomainResult<Company> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound {
            entity: "company",
            id,
        })
}

/// Inserts a new company into the database.
pub async fn create_company_in_db(
    pool: &SqlitePool,
    payload: CreateCompanyPayload,
) -> DomainResult<Company> {
    validate_company(pool, &payload.name, payload.hourly_rate, None).await?;

    let now = Utc::now();
    debug!(
        "Insert values: name={}, hourly_rate={}",
        payload.name, payload.hourly_rate
    );

    let id = sqlx::query(
        "INSERT INTO companies (name, hourly_rate, active, created_at, updated_at) VALUES (?, ?, 1, ?, ?)",
    )
    .bind(&payload.name)
    .bind(payload.hourly_rate)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Company {
        id,
        name: payload.name,
        hourly_rate: payload.hourly_rate,
        active: true,
        created_at: now,
        updated_at: now,
    })
}

/// Updates a company's name and/or rate. `active` is never touched here.
pub async fn update_company_in_db(
    pool: &SqlitePool,
    id: i64,
    payload: UpdateCompanyPayload,
) -> DomainResult<Company> {
    let existing = find_company_in_db(pool, id).await?;

    let name = payload.name.unwrap_or(existing.name);
    let hourly_rate = payload.hourly_rate.unwrap_or(existing.hourly_rate);
    validate_company(pool, &name, hourly_rate, Some(id)).await?;

    let now = Utc::now();
    sqlx::query("UPDATE companies SET name = ?, hourly_rate = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(hourly_rate)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Company {
        id,
        name,
        hourly_rate,
        active: existing.active,
        created_at: existing.created_at,
        updated_at: now,
    })
}

/// Soft delete: flips `active` off. Idempotent and reversible.
pub async fn deactivate_company_in_db(pool: &SqlitePool, id: i64) -> DomainResult<()> {
    find_company_in_db(pool, id).await?;

    sqlx::query("UPDATE companies SET active = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    info!("Company {} deactivated.", id);
    Ok(())
}

/// Reverses a deactivation. Idempotent.
pub async fn activate_company_in_db(pool: &SqlitePool, id: i64) -> DomainResult<()> {
    find_company_in_db(pool, id).await?;

    sqlx::query("UPDATE companies SET active = 1, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    info!("Company {} activated.", id);
    Ok(())
}

/// Hard delete. Refused while any project or task still references the
/// company; deactivation is the supported path in that case.
pub async fn delete_company_in_db(pool: &SqlitePool, id: i64) -> DomainResult<()> {
    find_company_in_db(pool, id).await?;

    let dependents: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM projects WHERE company_id = ?1)
              + (SELECT COUNT(*) FROM tasks WHERE company_id = ?1)",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    if dependents > 0 {
        debug!("Refusing to delete company {}: {} dependents", id, dependents);
        return Err(DomainError::HasDependents(HAS_DEPENDENTS));
    }

    sqlx::query("DELETE FROM companies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    info!("Company {} deleted.", id);
    Ok(())
}

/// All companies, most recently created first (the admin index ordering).
pub async fn get_companies_from_db(pool: &SqlitePool) -> DomainResult<Vec<Company>> {
    let companies =
        sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY created_at DESC, id DESC")
            .fetch_all(pool)
            .await?;
    Ok(companies)
}

/// Active companies ordered by name (the select-box ordering).
pub async fn get_active_companies_from_db(pool: &SqlitePool) -> DomainResult<Vec<Company>> {
    let companies =
        sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE active = 1 ORDER BY name ASC")
            .fetch_all(pool)
            .await?;
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{seed_company, seed_project, setup_test_db};

    #[tokio::test]
    async fn test_create_and_find_company() {
        let pool = setup_test_db().await;

        let created = create_company_in_db(
            &pool,
            CreateCompanyPayload {
                name: "Acme".to_string(),
                hourly_rate: 100.0,
            },
        )
        .await
        .unwrap();

        assert!(created.id > 0);
        assert!(created.active);

        let found = find_company_in_db(&pool, created.id).await.unwrap();
        assert_eq!(found.name, "Acme");
        assert_eq!(found.hourly_rate, 100.0);
    }

    #[tokio::test]
    async fn test_create_company_validates_fields() {
        let pool = setup_test_db().await;

        let result = create_company_in_db(
            &pool,
            CreateCompanyPayload {
                name: "".to_string(),
                hourly_rate: 0.0,
            },
        )
        .await;

        let Err(DomainError::Validation(errors)) = result else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.on("name"), ["is required"]);
        assert_eq!(errors.on("hourly_rate"), ["must be greater than zero"]);
    }

    #[tokio::test]
    async fn test_company_name_must_be_unique() {
        let pool = setup_test_db().await;
        seed_company(&pool, "Acme", 100.0).await;

        let result = create_company_in_db(
            &pool,
            CreateCompanyPayload {
                name: "Acme".to_string(),
                hourly_rate: 50.0,
            },
        )
        .await;

        let Err(DomainError::Validation(errors)) = result else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.on("name"), ["is already taken"]);
    }

    #[tokio::test]
    async fn test_update_keeps_own_name_valid() {
        let pool = setup_test_db().await;
        let company = seed_company(&pool, "Acme", 100.0).await;

        // Updating only the rate must not trip the uniqueness check on the
        // company's own unchanged name.
        let updated = update_company_in_db(
            &pool,
            company.id,
            UpdateCompanyPayload {
                name: None,
                hourly_rate: Some(120.0),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Acme");
        assert_eq!(updated.hourly_rate, 120.0);
    }

    #[tokio::test]
    async fn test_deactivate_is_idempotent_and_reversible() {
        let pool = setup_test_db().await;
        let company = seed_company(&pool, "Acme", 100.0).await;

        deactivate_company_in_db(&pool, company.id).await.unwrap();
        deactivate_company_in_db(&pool, company.id).await.unwrap();
        let found = find_company_in_db(&pool, company.id).await.unwrap();
        assert!(!found.active);

        activate_company_in_db(&pool, company.id).await.unwrap();
        let found = find_company_in_db(&pool, company.id).await.unwrap();
        assert!(found.active);
    }

    #[tokio::test]
    async fn test_delete_refused_with_dependents() {
        let pool = setup_test_db().await;
        let company = seed_company(&pool, "Acme", 100.0).await;
        seed_project(&pool, company.id, "Alpha").await;

        let result = delete_company_in_db(&pool, company.id).await;
        assert!(matches!(result, Err(DomainError::HasDependents(_))));

        // The row is intact.
        let found = find_company_in_db(&pool, company.id).await.unwrap();
        assert!(found.active);
    }

    #[tokio::test]
    async fn test_delete_without_dependents_succeeds() {
        let pool = setup_test_db().await;
        let company = seed_company(&pool, "Acme", 100.0).await;

        delete_company_in_db(&pool, company.id).await.unwrap();

        let result = find_company_in_db(&pool, company.id).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_active_listing_orders_by_name() {
        let pool = setup_test_db().await;
        let beta = seed_company(&pool, "Beta", 10.0).await;
        seed_company(&pool, "Acme", 10.0).await;
        deactivate_company_in_db(&pool, beta.id).await.unwrap();
        seed_company(&pool, "Zeta", 10.0).await;

        let active = get_active_companies_from_db(&pool).await.unwrap();
        let names: Vec<_> = active.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Acme", "Zeta"]);

        // The full listing still contains the deactivated one, newest first.
        let all = get_companies_from_db(&pool).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "Zeta");
    }
}
