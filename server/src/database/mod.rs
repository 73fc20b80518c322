// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod companies;
pub mod projects;
pub mod task_items;
pub mod tasks;

use anyhow::{Context, Result};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use tracing::info;

/// One statement per entry; SQLite prepared statements take a single
/// statement at a time.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS companies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        hourly_rate REAL NOT NULL,
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        company_id INTEGER NOT NULL REFERENCES companies (id),
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        UNIQUE (company_id, name)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        company_id INTEGER NOT NULL REFERENCES companies (id),
        project_id INTEGER NOT NULL REFERENCES projects (id),
        start_date DATE NOT NULL,
        end_date DATE NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        delivery_date DATE NULL,
        estimated_hours REAL NOT NULL,
        validated_hours REAL NULL,
        notes TEXT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id INTEGER NOT NULL REFERENCES tasks (id),
        start_time TIME NOT NULL,
        end_time TIME NOT NULL,
        hours_worked REAL NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_companies_active ON companies (active);",
    "CREATE INDEX IF NOT EXISTS idx_projects_company_id ON projects (company_id);",
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks (status);",
    "CREATE INDEX IF NOT EXISTS idx_tasks_company_id ON tasks (company_id);",
    "CREATE INDEX IF NOT EXISTS idx_tasks_project_id ON tasks (project_id);",
    "CREATE INDEX IF NOT EXISTS idx_tasks_company_project ON tasks (company_id, project_id);",
    "CREATE INDEX IF NOT EXISTS idx_task_items_task_id ON task_items (task_id);",
    "CREATE INDEX IF NOT EXISTS idx_task_items_status ON task_items (status);",
    // Serves the latest-item lookup in the status recompute.
    "CREATE INDEX IF NOT EXISTS idx_task_items_task_created ON task_items (task_id, created_at);",
];

/// Establishes the database connection pool.
/// If the database does not exist, it creates it.
/// It also ensures all four tables have the correct schema.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    create_schema(&pool)
        .await
        .context("Failed to create schema")?;

    info!("Schema is ready.");

    Ok(pool)
}

/// Runs the DDL. Exposed so tests can build in-memory databases with the
/// exact schema the application uses.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Helper function to set up an in-memory SQLite database for testing.
    /// This creates a fresh, empty database for each test, ensuring they are
    /// isolated.
    pub async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory SQLite");
        create_schema(&pool)
            .await
            .expect("Failed to create schema in test DB");
        pool
    }

    /// Seeds one company and returns it.
    pub async fn seed_company(pool: &SqlitePool, name: &str, hourly_rate: f64) -> common::Company {
        companies::create_company_in_db(
            pool,
            common::CreateCompanyPayload {
                name: name.to_string(),
                hourly_rate,
            },
        )
        .await
        .expect("Failed to seed company")
    }

    /// Seeds one project under the given company and returns it.
    pub async fn seed_project(pool: &SqlitePool, company_id: i64, name: &str) -> common::Project {
        projects::create_project_in_db(
            pool,
            common::CreateProjectPayload {
                name: name.to_string(),
                company_id,
            },
        )
        .await
        .expect("Failed to seed project")
    }

    /// Seeds one pending task under the given company/project and returns it.
    pub async fn seed_task(pool: &SqlitePool, company_id: i64, project_id: i64) -> common::Task {
        tasks::create_task_in_db(
            pool,
            common::CreateTaskPayload {
                name: "Seeded task".to_string(),
                company_id,
                project_id,
                start_date: chrono::Utc::now().date_naive(),
                estimated_hours: common::EstimatedHours::Clock("03:00".to_string()),
                notes: None,
            },
        )
        .await
        .expect("Failed to seed task")
    }
}
