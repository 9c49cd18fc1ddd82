mod common;

use axum::http::StatusCode;

use common::{PASSWORD, spawn_app, test_config, spawn_app_with};
use vbg_tracker::domain::Role;

#[tokio::test]
async fn test_only_super_admin_reads_audit_logs() {
    let app = spawn_app("audit_read").await;
    app.seed_user("adminDakar", Role::Admin, Some("Dakar")).await;
    let admin = app.login("adminDakar", PASSWORD).await;
    let root = app.super_admin_token().await;

    let (status, body) = app
        .request("GET", "/api/audit-logs", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = app
        .request(
            "GET",
            "/api/audit-logs?action=UNAUTHORIZED_ACCESS",
            Some(&root),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    let entry = &body["data"]["items"][0];
    assert_eq!(entry["actor_name"], "adminDakar");
    assert_eq!(entry["actor_role"], "admin");
    assert_eq!(entry["success"], false);
    assert_eq!(entry["details"]["method"], "GET");
    assert_eq!(entry["details"]["path"], "/api/audit-logs");
}

#[tokio::test]
async fn test_audit_log_paging_and_filters() {
    let app = spawn_app("audit_paging").await;
    for _ in 0..3 {
        app.login_raw("ghost", "wrong-password").await;
    }
    let root = app.super_admin_token().await;

    let (status, body) = app
        .request(
            "GET",
            "/api/audit-logs?action=LOGIN_FAILED&page=2&page_size=2",
            Some(&root),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .request("GET", "/api/audit-logs?page_size=500", Some(&root), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request("GET", "/api/audit-logs?action=NOPE", Some(&root), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_page_is_rejected() {
    let app = spawn_app("audit_page_range").await;
    let root = app.super_admin_token().await;

    let (status, body) = app
        .request(
            "GET",
            "/api/audit-logs?page=18446744073709551615&page_size=200",
            Some(&root),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    // Far past the last row but still a valid offset.
    let (status, body) = app
        .request("GET", "/api/audit-logs?page=100000", Some(&root), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());

    // The server is still answering.
    let (status, _) = app
        .request("GET", "/api/audit-logs", Some(&root), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_audit_records_nothing() {
    let (mut config, path) = test_config("audit_disabled");
    config.audit.enabled = false;
    let app = spawn_app_with(config, path).await;

    app.login_raw("ghost", "wrong-password").await;
    app.super_admin_token().await;

    assert_eq!(app.audit_count("LOGIN_FAILED").await, 0);
    assert_eq!(app.audit_count("LOGIN_SUCCESS").await, 0);
}
