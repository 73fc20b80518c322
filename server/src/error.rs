// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field name used for errors that are not tied to a specific field.
pub const BASE: &str = "base";

/// Field-scoped validation messages, accumulated during a validation pass.
///
/// Keys are field names ("name", "end_time", ...) or [`BASE`] for general
/// errors. A `BTreeMap` keeps the serialized output stable.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for one field; empty when the field is clean.
    pub fn on(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Converts an accumulated pass into the usual `Result` shape.
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

/// Every failure mode of the core is one of these; nothing here is fatal.
/// A failed operation leaves prior state untouched and reports why.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Malformed, missing, or out-of-range fields, including cross-entity
    /// rule violations. Carries the per-field messages.
    #[error("validation failed")]
    Validation(ValidationErrors),

    /// Mutation of a task item under a delivered task.
    #[error("cannot modify items of a delivered task")]
    TaskDelivered,

    /// Removal of an entity that still has live dependents. Distinct from
    /// validation on purpose; callers branch on it differently.
    #[error("{0}")]
    HasDependents(&'static str),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Allows Axum to convert a `DomainError` into an HTTP `Response`.
///
/// Validation failures answer 400 with the field details; immutability and
/// dependent-restriction failures answer 409; storage failures are logged
/// and sanitized to a 500, except unique-constraint races which surface as
/// conflicts.
impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let (code, message, details) = match self {
            DomainError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "validation failed".to_string(),
                Some(errors),
            ),
            DomainError::TaskDelivered => {
                let mut details = ValidationErrors::default();
                details.add(BASE, "cannot modify items of a delivered task");
                (
                    StatusCode::CONFLICT,
                    "cannot modify items of a delivered task".to_string(),
                    Some(details),
                )
            }
            DomainError::HasDependents(message) => {
                (StatusCode::CONFLICT, message.to_string(), None)
            }
            DomainError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                format!("{} with id {} not found", entity, id),
                None,
            ),
            DomainError::Database(err) => {
                if is_unique_violation(&err) {
                    (
                        StatusCode::CONFLICT,
                        "duplicate value violates a uniqueness constraint".to_string(),
                        None,
                    )
                } else {
                    tracing::error!("Internal server error: {:?}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "An internal error occurred.".to_string(),
                        None,
                    )
                }
            }
        };

        tracing::debug!(
            "Responding with error: status_code={}, message={}",
            code.as_u16(),
            message
        );

        let body = match details {
            Some(details) => serde_json::json!({ "error": message, "details": details }),
            None => serde_json::json!({ "error": message }),
        };
        (code, Json(body)).into_response()
    }
}

/// Concurrent creates can slip past the validation-layer uniqueness checks;
/// the unique indexes backstop them and the race surfaces as a conflict.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_messages_per_field() {
        let mut errors = ValidationErrors::default();
        errors.add("name", "is required");
        errors.add("name", "is already taken");
        errors.add("hourly_rate", "must be greater than zero");

        assert_eq!(errors.on("name").len(), 2);
        assert_eq!(errors.on("hourly_rate"), ["must be greater than zero"]);
        assert!(errors.on("unknown").is_empty());
    }

    #[test]
    fn test_into_result_empty_is_ok() {
        assert!(ValidationErrors::default().into_result().is_ok());

        let mut errors = ValidationErrors::default();
        errors.add(BASE, "broken");
        assert!(matches!(
            errors.into_result(),
            Err(DomainError::Validation(_))
        ));
    }
}
