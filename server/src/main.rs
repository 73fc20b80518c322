// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use server::{database, routes};

use axum::http::HeaderName;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

// Define the default DB_URL here for the main application's use.
const MAIN_DB_URL: &str = "sqlite://database/sqlite.db";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting up the server...");

    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| MAIN_DB_URL.to_string());
    let db_pool = match database::establish_connection_pool(&db_url).await {
        Ok(pool) => {
            tracing::info!("Database connection was made successfully.");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect with the database: {:?}", e);
            std::process::exit(1);
        }
    };

    let app_routes = routes::create_router(db_pool);

    // Configure CORS here, applying it globally to the router
    let cors = CorsLayer::new()
        .allow_methods(Any) // Allow all HTTP methods
        // Explicit list of headers the admin frontend may send. Without
        // token auth, 'authorization' is not needed.
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
        ])
        .allow_origin(Any); // Allow all origins

    let app = app_routes.layer(cors); // Apply the CORS layer

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("The server listens on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
