// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geofence-Tracker API Server
//!
//! Stores per-user geofences and answers point containment queries.

use geofence_tracker::{config::Config, middleware::AuthUser, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        max_geofences_per_user = config.max_geofences_per_user,
        "Starting Geofence-Tracker API"
    );

    let state = Arc::new(AppState::new(config.clone()));

    // Optional seed data
    if let (Some(path), Some(owner)) = (&config.seed_file, &config.seed_owner) {
        tracing::info!(path = %path, owner = %owner, "Importing seed geofences");
        let report = state
            .geofence_service
            .import_file(&AuthUser::new(owner.as_str()), path)
            .await?;
        for skipped in &report.skipped {
            tracing::warn!(index = skipped.index, reason = %skipped.reason, "Skipped seed feature");
        }
        tracing::info!(count = report.imported.len(), "Seed geofences loaded");
    }

    // Build router
    let app = geofence_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("geofence_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
