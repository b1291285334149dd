// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `/api/setmore` proxy route tests.

mod common;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use common::{create_test_app, spawn_server, Hits, UNREACHABLE_URL};
use serde_json::{json, Value};
use setmore_dashboard::db::MemoryStore;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

fn offline_app() -> Router {
    create_test_app(
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        Arc::new(MemoryStore::new()),
    )
    .0
}

async fn post_json(app: Router, body: Value) -> (StatusCode, HeaderMap, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/setmore")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_endpoint() {
    let response = offline_app()
        .oneshot(
            Request::builder()
                .uri("/api/setmore")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );

    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "Setmore API proxy is running");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_request_validation() {
    let cases = [
        (json!({"endpoint": "services"}), "API key is required"),
        (json!({"apiKey": "", "endpoint": "services"}), "API key is required"),
        (json!({"apiKey": "key"}), "Endpoint is required"),
        (json!({"apiKey": "key", "endpoint": "staff"}), "Invalid endpoint"),
    ];

    for (request, expected) in cases {
        let (status, _, body) = post_json(offline_app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], expected);
    }
}

#[tokio::test]
async fn test_appointments_forwarded_with_window_and_bearer() {
    let hits = Hits::default();
    let upstream = Router::new()
        .route(
            "/api/v1/bookingapi/appointments",
            get(
                |State(hits): State<Hits>,
                 headers: HeaderMap,
                 Query(params): Query<HashMap<String, String>>| async move {
                    hits.record();
                    assert_eq!(headers[header::AUTHORIZATION], "Bearer secret-key");
                    assert_eq!(headers[header::USER_AGENT], "BarberShop-Dashboard/1.0");
                    assert_eq!(params["customerDetails"], "true");
                    assert_eq!(params["startDate"].len(), 10);
                    assert_eq!(params["endDate"].len(), 10);
                    axum::Json(json!({"response": true, "data": {"appointments": []}}))
                },
            ),
        )
        .with_state(hits.clone());
    let api_base = spawn_server(upstream).await;
    let (app, _) = create_test_app(
        &api_base,
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        Arc::new(MemoryStore::new()),
    );

    let (status, _, body) =
        post_json(app, json!({"apiKey": "secret-key", "endpoint": "appointments"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["appointments"], json!([]));
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn test_non_json_success_is_wrapped() {
    let upstream = Router::new().route(
        "/api/v1/bookingapi/staffs",
        get(|| async { "plain text" }),
    );
    let api_base = spawn_server(upstream).await;
    let (app, _) = create_test_app(
        &api_base,
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        Arc::new(MemoryStore::new()),
    );

    let (status, _, body) = post_json(app, json!({"apiKey": "k", "endpoint": "staffs"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"raw": "plain text"}));
}

#[tokio::test]
async fn test_upstream_error_passes_through() {
    let upstream = Router::new().route(
        "/api/v1/bookingapi/customer",
        get(|| async { (StatusCode::UNAUTHORIZED, "{\"msg\":\"token expired\"}") }),
    );
    let api_base = spawn_server(upstream).await;
    let (app, _) = create_test_app(
        &api_base,
        UNREACHABLE_URL,
        UNREACHABLE_URL,
        Arc::new(MemoryStore::new()),
    );

    let (status, _, body) = post_json(app, json!({"apiKey": "k", "endpoint": "customers"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("API Error: 401 Unauthorized"));
    assert_eq!(body["details"], "{\"msg\":\"token expired\"}");
}

#[tokio::test]
async fn test_unreachable_upstream_is_internal_error() {
    let (status, _, body) = post_json(
        offline_app(),
        json!({"apiKey": "k", "endpoint": "services"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_health_reports_credential() {
    let response = offline_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["has_credential"], false);
    assert_eq!(body["last_loaded_at"], Value::Null);
}
