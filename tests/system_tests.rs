mod common;

use axum::http::StatusCode;

use common::spawn_app;

#[tokio::test]
async fn test_health_probes_are_public() {
    let app = spawn_app("health").await;

    let (status, body) = app
        .request("GET", "/api/system/health/live", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "alive");

    let (status, body) = app
        .request("GET", "/api/system/health/ready", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ready"], true);
    assert_eq!(body["data"]["checks"]["database"], true);
}

#[tokio::test]
async fn test_metrics_require_token() {
    let app = spawn_app("metrics").await;

    let (status, _) = app.request("GET", "/api/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.super_admin_token().await;
    let (status, _) = app.request("GET", "/api/metrics", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = spawn_app("not_found").await;
    let (status, _) = app.request("GET", "/api/unknown", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
