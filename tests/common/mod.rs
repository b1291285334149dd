// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::Router;
use chrono::{Duration, Utc};
use setmore_dashboard::config::Config;
use setmore_dashboard::db::{keys, KeyValueStore, MemoryStore};
use setmore_dashboard::routes::create_router;
use setmore_dashboard::services::{DashboardService, DataFetcher, SetmoreClient, TokenManager};
use setmore_dashboard::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Address nothing listens on, for tests that must not reach a server.
#[allow(dead_code)]
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

/// Serve `router` on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", addr)
}

/// Shared request counter for mock handlers.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

#[allow(dead_code)]
impl Hits {
    /// Record a hit and return how many came before it.
    pub fn record(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Store holding an access token expiring `expires_in` from now plus a
/// refresh token.
#[allow(dead_code)]
pub fn store_with_token(access_token: &str, expires_in: Duration) -> Arc<MemoryStore> {
    let expiry = (Utc::now() + expires_in).timestamp_millis().to_string();
    Arc::new(MemoryStore::with_entries([
        (keys::ACCESS_TOKEN, access_token),
        (keys::REFRESH_TOKEN, "refresh-1"),
        (keys::TOKEN_EXPIRY, expiry.as_str()),
    ]))
}

/// Token manager talking to `token_url` and `proxy_url`.
#[allow(dead_code)]
pub fn token_manager(token_url: &str, proxy_url: &str, store: Arc<MemoryStore>) -> TokenManager {
    let client = SetmoreClient::new(UNREACHABLE_URL, token_url, proxy_url);
    TokenManager::new(client, store as Arc<dyn KeyValueStore>)
}

/// Fetcher with a short backoff so retry tests stay fast.
#[allow(dead_code)]
pub fn fetcher(proxy_url: &str, tokens: TokenManager, retries: u32) -> DataFetcher {
    let client = SetmoreClient::new(UNREACHABLE_URL, UNREACHABLE_URL, proxy_url);
    DataFetcher::new(
        client,
        tokens,
        retries,
        std::time::Duration::from_millis(10),
    )
}

/// Create a test app whose upstreams are the given URLs.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(
    api_base: &str,
    token_url: &str,
    proxy_url: &str,
    store: Arc<MemoryStore>,
) -> (Router, Arc<AppState>) {
    let config = Config {
        setmore_api_base: api_base.to_string(),
        token_url: token_url.to_string(),
        proxy_url: proxy_url.to_string(),
        retry_backoff: std::time::Duration::from_millis(10),
        ..Config::default()
    };
    let client = SetmoreClient::from_config(&config);
    let tokens = TokenManager::new(client.clone(), store as Arc<dyn KeyValueStore>);
    let fetcher = DataFetcher::from_config(&config, client.clone(), tokens.clone());

    let state = Arc::new(AppState {
        config,
        client,
        dashboard: DashboardService::new(tokens, fetcher),
    });

    (create_router(state.clone()), state)
}
