// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Task`].
///
/// Stored as lowercase text in the database. `Delivered` is terminal: once a
/// task reaches it, its items are frozen and automatic status recomputation
/// skips the task entirely.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    Delivered,
}

impl TaskStatus {
    pub fn is_delivered(self) -> bool {
        self == TaskStatus::Delivered
    }
}

/// Status of a single [`TaskItem`]. Stored as lowercase text.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaskItemStatus {
    #[default]
    Pending,
    Completed,
}

/// A billing entity with an hourly rate.
///
/// Companies are soft-deleted: `active` is flipped off instead of removing
/// the row whenever projects or tasks still reference it.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub hourly_rate: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structure used to receive company creation data from the API.
/// It's a good practice to separate database models (`Company`)
/// from API models (`CreateCompanyPayload`), as they may have different fields.
#[derive(Deserialize, Debug)]
pub struct CreateCompanyPayload {
    pub name: String,
    pub hourly_rate: f64,
}

/// Update payload for a company. `active` is deliberately not accepted here;
/// it is only reachable through the explicit deactivate/activate endpoints.
#[derive(Deserialize, Debug)]
pub struct UpdateCompanyPayload {
    pub name: Option<String>,
    pub hourly_rate: Option<f64>,
}

/// A named grouping of work under exactly one company.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub company_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project joined with its owning company's name, for listings.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct ProjectWithCompany {
    pub id: i64,
    pub name: String,
    pub company_id: i64,
    pub company_name: String,
    pub created_at: DateTime<Utc>,
}

/// The minimal `{id, name}` shape consumed by the dependent project dropdown.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProjectOption {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct CreateProjectPayload {
    pub name: String,
    pub company_id: i64,
}

#[derive(Deserialize, Debug)]
pub struct UpdateProjectPayload {
    pub name: Option<String>,
    pub company_id: Option<i64>,
}

/// A unit of billable work under one project+company pair.
///
/// `validated_hours` is derived (sum of the items' `hours_worked`) and kept
/// in sync by the server whenever an item changes. `estimated_hours_hm` is
/// the "HH:MM" rendering of `estimated_hours`, populated on every fetch; it
/// never lives in the database.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub company_id: i64,
    pub project_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub delivery_date: Option<NaiveDate>,
    pub estimated_hours: f64,
    #[sqlx(default)]
    #[serde(default)]
    pub estimated_hours_hm: String,
    pub validated_hours: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Refreshes the "HH:MM" view from the stored decimal.
    pub fn sync_estimated_hours_hm(&mut self) {
        self.estimated_hours_hm = format_clock(self.estimated_hours);
    }
}

/// A task together with its items and the on-demand computed figures.
#[derive(Serialize, Deserialize, Debug)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub items: Vec<TaskItem>,
    pub total_hours: f64,
    pub calculated_value: f64,
}

/// Estimated hours as accepted on the wire: either a plain decimal number of
/// hours or an "HH:MM" string (e.g. "02:30" for 2.5 hours).
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum EstimatedHours {
    Decimal(f64),
    Clock(String),
}

#[derive(Deserialize, Debug)]
pub struct CreateTaskPayload {
    pub name: String,
    pub company_id: i64,
    pub project_id: i64,
    pub start_date: NaiveDate,
    pub estimated_hours: EstimatedHours,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateTaskPayload {
    pub name: Option<String>,
    pub company_id: Option<i64>,
    pub project_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub estimated_hours: Option<EstimatedHours>,
    pub status: Option<TaskStatus>,
    pub notes: Option<String>,
}

/// Optional filters for the task listing, combinable.
#[derive(Deserialize, Debug, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub company_id: Option<i64>,
    pub project_id: Option<i64>,
}

/// A single recorded time interval contributing to a task's worked hours.
///
/// `hours_worked` is derived from the interval on every save and is never
/// accepted from the API.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct TaskItem {
    pub id: i64,
    pub task_id: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub hours_worked: f64,
    pub status: TaskItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct CreateTaskItemPayload {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    // Defaults to pending when omitted.
    pub status: Option<TaskItemStatus>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateTaskItemPayload {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: Option<TaskItemStatus>,
}

/// Why an "HH:MM" string failed to parse. The caller picks the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockParseError {
    /// Not of the form one-or-two digits, colon, exactly two digits.
    Format,
    /// Well-formed but hours > 23 or minutes > 59.
    Range,
}

/// Rounds to 2 decimal places, the precision every stored hour figure uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Wall-clock hours between two times of day, rounded to 2 decimals.
/// 09:00 -> 10:30 is 1.5; 09:00 -> 10:17 is 77 minutes, so 1.28.
pub fn hours_between(start: NaiveTime, end: NaiveTime) -> f64 {
    let seconds = (end - start).num_seconds() as f64;
    round2(seconds / 3600.0)
}

/// Parses an "HH:MM" string into decimal hours.
///
/// Accepts one or two hour digits and exactly two minute digits, with hours
/// in 00-23 and minutes in 00-59.
pub fn parse_clock(input: &str) -> Result<f64, ClockParseError> {
    let (h, m) = input.split_once(':').ok_or(ClockParseError::Format)?;
    let well_formed = !h.is_empty()
        && h.len() <= 2
        && m.len() == 2
        && h.chars().all(|c| c.is_ascii_digit())
        && m.chars().all(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(ClockParseError::Format);
    }

    let hours: u32 = h.parse().map_err(|_| ClockParseError::Format)?;
    let minutes: u32 = m.parse().map_err(|_| ClockParseError::Format)?;
    if hours > 23 || minutes > 59 {
        return Err(ClockParseError::Range);
    }

    Ok(f64::from(hours) + f64::from(minutes) / 60.0)
}

/// Renders decimal hours as a zero-padded "HH:MM" string.
pub fn format_clock(decimal: f64) -> String {
    let hours = decimal.trunc() as i64;
    let minutes = ((decimal - hours as f64) * 60.0).round() as i64;
    format!("{:02}:{:02}", hours, minutes)
}
