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
use common::{Company, CreateCompanyPayload, UpdateCompanyPayload};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

#[derive(Deserialize, Debug, Default)]
pub struct CompanyListParams {
    /// `?active=true` narrows to active companies, ordered by name.
    pub active: Option<bool>,
}

/// Handler for listing companies.
pub async fn list_companies(
    State(pool): State<SqlitePool>,
    Query(params): Query<CompanyListParams>,
) -> Result<Json<Vec<Company>>, DomainError> {
    let companies = if params.active.unwrap_or(false) {
        database::companies::get_active_companies_from_db(&pool).await?
    } else {
        database::companies::get_companies_from_db(&pool).await?
    };
    info!("Successfully retrieved {} companies.", companies.len());
    Ok(Json(companies))
}

/// Handler for creating a new company.
pub async fn create_company(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateCompanyPayload>,
) -> Result<(StatusCode, Json<Company>), DomainError> {
    debug!("Received request to create company: {}", payload.name);
    let company = database::companies::create_company_in_db(&pool, payload).await?;
    info!("Company created successfully with ID: {}", company.id);
    Ok((StatusCode::CREATED, Json(company)))
}

/// Handler for updating a company's name and/or rate.
pub async fn update_company(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCompanyPayload>,
) -> Result<Json<Company>, DomainError> {
    let company = database::companies::update_company_in_db(&pool, id, payload).await?;
    Ok(Json(company))
}

/// Handler for the soft delete.
pub async fn deactivate_company(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<StatusCode, DomainError> {
    database::companies::deactivate_company_in_db(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for reversing a soft delete.
pub async fn activate_company(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<StatusCode, DomainError> {
    database::companies::activate_company_in_db(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for the hard delete; answers 409 while dependents exist.
pub async fn delete_company(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<StatusCode, DomainError> {
    debug!("Attempting to delete company with ID: {}", id);
    database::companies::delete_company_in_db(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
