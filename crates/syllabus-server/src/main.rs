// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Syllabus Server
//!
//! Serves batch creation and reads for the education schema and todos.

use anyhow::Result;
use tracing::{error, info, warn};

use syllabus_server::config::Config;
use syllabus_server::runtime::SyllabusRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syllabus_server=info,syllabus_core=info".into()),
        )
        .init();

    info!("Starting Syllabus Server");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        allow_guest_writes = config.allow_guest_writes,
        api_keys = config.api_keys.len(),
        trusted_issuers = config.trusted_issuers.len(),
        max_batch_size = config.max_batch_size,
        "Configuration loaded"
    );

    // Connect to the record store
    info!("Connecting to record store...");
    let store = syllabus_core::store::connect(&config.database_url).await?;
    if !store.health_check().await? {
        warn!(backend = store.backend(), "Record store health check failed");
    }
    info!(backend = store.backend(), "Record store ready");

    let runtime = SyllabusRuntime::builder()
        .store(store)
        .bind_addr(config.http_addr)
        .policy(config.identity_policy())
        .api_keys(config.api_keys.clone())
        .max_batch_size(config.max_batch_size)
        .build()?
        .start()
        .await?;

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    runtime.shutdown().await?;
    info!("Shutdown complete");

    Ok(())
}
