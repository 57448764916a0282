// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Skydash API server binary.
//!
//! Startup order: config, PostgreSQL pool, migrations, Redis, serve.
//! PostgreSQL is the source of truth; Redis holds only derived and
//! expiring state, so a cold Redis is a valid start condition.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use skydash_core::migrations;
use skydash_core::persistence::PostgresPersistence;

use skydash_server::config::Config;
use skydash_server::rank::RedisRankStore;
use skydash_server::server;
use skydash_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skydash_server=info".parse().unwrap()),
        )
        .init();

    info!("Starting Skydash API server");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(http_addr = %config.http_addr, "Configuration loaded");

    // Connect to database
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    info!("Database connection established");

    info!("Running database migrations...");
    migrations::run_postgres(&pool).await?;
    info!("Migrations completed");

    // Connect to the rank store
    info!("Connecting to Redis...");
    let rank = RedisRankStore::connect(&config.redis_url).await?;
    info!("Redis connection established");

    let persistence = Arc::new(PostgresPersistence::new(pool));
    let state = AppState::new(persistence, Arc::new(rank), &config.jwt_secret);

    server::run_server(config.http_addr, state).await
}
