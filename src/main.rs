// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Setmore Dashboard API Server
//!
//! Serves the Setmore proxy and the aggregated dashboard data, reloading
//! it in the background while a credential is available.

use setmore_dashboard::{
    config::Config,
    db::{JsonFileStore, KeyValueStore},
    services::{
        dashboard::AUTO_REFRESH_CHECK_INTERVAL, DashboardService, DataFetcher, SetmoreClient,
        TokenManager,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Setmore Dashboard API");

    // Credential store
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&config.credentials_path));
    tracing::info!(path = %config.credentials_path.display(), "Credential store opened");

    let client = SetmoreClient::from_config(&config);
    let tokens = TokenManager::new(client.clone(), store);
    let fetcher = DataFetcher::from_config(&config, client.clone(), tokens.clone());
    let dashboard = DashboardService::new(tokens.clone(), fetcher);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        client,
        dashboard: dashboard.clone(),
    });

    // Build router
    let app = setmore_dashboard::routes::create_router(state);

    // Start server before the first load: the default proxy URL points at us
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    tokio::spawn(initial_load(
        dashboard.clone(),
        config.bootstrap_refresh_token.clone(),
    ));
    tokio::spawn(dashboard.run_auto_refresh(
        config.data_refresh_interval,
        AUTO_REFRESH_CHECK_INTERVAL,
    ));

    axum::serve(listener, app).await?;
    Ok(())
}

/// Load data once at startup, applying a bootstrap refresh token if given.
async fn initial_load(dashboard: DashboardService, bootstrap_refresh_token: Option<String>) {
    let result = match bootstrap_refresh_token {
        Some(refresh_token) => {
            tracing::info!("Applying refresh token from environment");
            dashboard.setup_refresh_token(&refresh_token).await
        }
        None if dashboard.tokens().has_access_token().await => dashboard.load().await,
        None => {
            tracing::info!("No stored credential, waiting for a refresh token");
            return;
        }
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "Initial dashboard load failed");
    }
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("setmore_dashboard=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
