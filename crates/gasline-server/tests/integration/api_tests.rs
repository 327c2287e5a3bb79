use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::common::{SOURCE_URL, exact, setup_test_app, setup_test_app_with_ttl, write_artifact};

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn gas_price_returns_latest_value() {
    let app = setup_test_app();
    write_artifact(&app.artifact_path, exact(3.47)).await;

    let (status, json) = get_json(app.router.clone(), "/api/gas_price").await;

    assert_eq!(status, StatusCode::OK);
    let point = &json["response"]["data"][0];
    assert_eq!(point["value"], 3.47);
    assert_eq!(point["units"], "USD/GAL");
    assert_eq!(point["confidence"], "exact");
    assert_eq!(point["period"], "2024-05-13");
    assert_eq!(point["source"], SOURCE_URL);
}

#[tokio::test]
async fn gas_price_without_artifact_is_503() {
    let app = setup_test_app();

    let (status, json) = get_json(app.router.clone(), "/api/gas_price").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "price_unavailable");
}

#[tokio::test]
async fn gas_price_with_null_value_is_503() {
    let app = setup_test_app();
    write_artifact(&app.artifact_path, None).await;

    let (status, json) = get_json(app.router.clone(), "/api/gas_price").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "price_unavailable");
}

#[tokio::test]
async fn gas_price_with_corrupt_artifact_is_503() {
    let app = setup_test_app();
    tokio::fs::write(&app.artifact_path, b"{ not json").await.unwrap();

    let (status, json) = get_json(app.router.clone(), "/api/gas_price").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "price_unavailable");
}

#[tokio::test]
async fn cached_artifact_is_served_until_ttl_expires() {
    let app = setup_test_app_with_ttl(Duration::from_secs(300));
    write_artifact(&app.artifact_path, exact(3.47)).await;

    let (_, first) = get_json(app.router.clone(), "/api/gas_price").await;
    write_artifact(&app.artifact_path, exact(3.59)).await;
    let (_, second) = get_json(app.router.clone(), "/api/gas_price").await;

    assert_eq!(first["response"]["data"][0]["value"], 3.47);
    assert_eq!(second["response"]["data"][0]["value"], 3.47);
}

#[tokio::test]
async fn uncached_artifact_is_reread() {
    let app = setup_test_app();
    write_artifact(&app.artifact_path, exact(3.47)).await;

    let (_, first) = get_json(app.router.clone(), "/api/gas_price").await;
    write_artifact(&app.artifact_path, exact(3.59)).await;
    let (_, second) = get_json(app.router.clone(), "/api/gas_price").await;

    assert_eq!(first["response"]["data"][0]["value"], 3.47);
    assert_eq!(second["response"]["data"][0]["value"], 3.59);
}

#[tokio::test]
async fn missing_artifact_is_not_cached() {
    let app = setup_test_app_with_ttl(Duration::from_secs(300));

    let (status, _) = get_json(app.router.clone(), "/api/gas_price").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    write_artifact(&app.artifact_path, exact(3.47)).await;
    let (status, json) = get_json(app.router.clone(), "/api/gas_price").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["response"]["data"][0]["value"], 3.47);
}

#[tokio::test]
async fn health_reports_artifact_state() {
    let app = setup_test_app();

    let (status, json) = get_json(app.router.clone(), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["artifact"], "missing");

    write_artifact(&app.artifact_path, None).await;
    let (status, json) = get_json(app.router.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["captured_at"], "2024-05-13T14:30:00.000Z");
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let app = setup_test_app();

    let (status, json) = get_json(app.router.clone(), "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/gas_price"].is_object());
    assert!(json["paths"]["/health"].is_object());
}
