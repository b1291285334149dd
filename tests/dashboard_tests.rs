// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard load lifecycle and `/api/dashboard` route tests.

mod common;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Duration;
use common::{create_test_app, spawn_server, store_with_token, Hits, UNREACHABLE_URL};
use serde_json::{json, Value};
use setmore_dashboard::services::LoadOutcome;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

/// Proxy serving a small shop; fails with 500 while `failing` is set.
async fn shop_proxy(failing: Arc<AtomicBool>, hits: Hits) -> String {
    let app = Router::new()
        .route(
            "/api/setmore",
            post(
                |State((failing, hits)): State<(Arc<AtomicBool>, Hits)>,
                 Json(body): Json<Value>| async move {
                    hits.record();
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    if failing.load(Ordering::SeqCst) {
                        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "down"})));
                    }
                    let payload = match body["endpoint"].as_str() {
                        Some("customers") => json!({"customer": [{"key": "c1", "first_name": "Ana"}]}),
                        Some("appointments") => json!({"appointments": [{
                            "key": "a1",
                            "customer_key": "c1",
                            "service_key": "s1",
                            "staff_key": "t1",
                            "start_time": "2024-06-10T10:00:00Z",
                            "booking_time": "2024-06-07T10:00:00Z"
                        }]}),
                        Some("services") => json!({"services": [{"key": "s1", "cost": 35}]}),
                        Some("staffs") => json!({"staffs": [{"key": "t1", "first_name": "Cy"}]}),
                        _ => json!({}),
                    };
                    (StatusCode::OK, Json(json!({"response": true, "data": payload})))
                },
            ),
        )
        .with_state((failing, hits));
    format!("{}/api/setmore", spawn_server(app).await)
}

async fn get_dashboard(app: Router) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_dashboard_not_found_before_first_load() {
    let (app, _state) = create_test_app(
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        store_with_token("token", Duration::hours(1)),
    );

    let (status, body) = get_dashboard(app).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_failed_load_keeps_previous_snapshot() {
    let failing = Arc::new(AtomicBool::new(false));
    let proxy_url = shop_proxy(failing.clone(), Hits::default()).await;
    let (app, state) = create_test_app(
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        &proxy_url,
        store_with_token("token", Duration::hours(1)),
    );

    let first = match state.dashboard.load().await.unwrap() {
        LoadOutcome::Loaded(snapshot) => snapshot,
        LoadOutcome::Skipped => panic!("first load was skipped"),
    };
    assert_eq!(first.stats.total, 1);
    assert_eq!(first.stats.revenue, 35.0);
    assert_eq!(first.stats.lead_times, vec![3]);
    assert_eq!(first.summary.total_customers, 1);

    failing.store(true, Ordering::SeqCst);
    let err = state.dashboard.load().await.unwrap_err();
    assert_eq!(err.fetch_status(), Some(500));

    let latest = state.dashboard.latest().await.unwrap();
    assert!(Arc::ptr_eq(&first, &latest));
    assert!(state
        .dashboard
        .last_error()
        .await
        .unwrap()
        .contains("HTTP 500"));

    let (status, body) = get_dashboard(app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_appointments"], 1);
    assert_eq!(body["stats"]["by_week"]["2024-06-10"], 1);
}

#[tokio::test]
async fn test_overlapping_load_is_skipped() {
    let hits = Hits::default();
    let proxy_url = shop_proxy(Arc::new(AtomicBool::new(false)), hits.clone()).await;
    let (_app, state) = create_test_app(
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        &proxy_url,
        store_with_token("token", Duration::hours(1)),
    );

    let (a, b) = tokio::join!(state.dashboard.load(), state.dashboard.load());
    assert!(matches!(a.unwrap(), LoadOutcome::Loaded(_)));
    assert!(matches!(b.unwrap(), LoadOutcome::Skipped));
    assert_eq!(hits.count(), 4);
    assert!(!state.dashboard.is_loading());
}

#[tokio::test]
async fn test_load_without_credential_fails() {
    let (_app, state) = create_test_app(
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        Arc::new(setmore_dashboard::db::MemoryStore::new()),
    );

    let err = state.dashboard.load().await.unwrap_err();
    assert!(err.requires_reauthentication());
    assert!(state.dashboard.latest().await.is_none());
    assert!(state
        .dashboard
        .is_stale(std::time::Duration::from_secs(60), chrono::Utc::now())
        .await);
}

#[tokio::test]
async fn test_reload_route_publishes_snapshot() {
    let proxy_url = shop_proxy(Arc::new(AtomicBool::new(false)), Hits::default()).await;
    let (app, state) = create_test_app(
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        &proxy_url,
        store_with_token("token", Duration::hours(1)),
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/dashboard/reload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "loaded");

    assert!(state.dashboard.latest().await.is_some());
    assert!(!state
        .dashboard
        .is_stale(std::time::Duration::from_secs(60), chrono::Utc::now())
        .await);
}
