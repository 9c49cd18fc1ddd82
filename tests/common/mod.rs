#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use vbg_tracker::api::{self, AppState};
use vbg_tracker::clock::{Clock, FixedClock};
use vbg_tracker::config::Config;
use vbg_tracker::db::NewUser;
use vbg_tracker::domain::{Role, UserId, UserStatus};
use vbg_tracker::state::SharedState;

pub const BOOTSTRAP_PASSWORD: &str = "bootstrap-pass";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub fn test_config(name: &str) -> (Config, PathBuf) {
    let path = std::env::temp_dir().join(format!(
        "vbg_api_{name}_{}.db",
        uuid::Uuid::new_v4().simple()
    ));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}?mode=rwc", path.display());
    config.session.secret = "integration-test-secret-0123456789abcdef".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.security.bootstrap_password = Some(BOOTSTRAP_PASSWORD.to_string());
    (config, path)
}

pub async fn spawn_app(name: &str) -> TestApp {
    let (config, path) = test_config(name);
    spawn_app_with(config, path).await
}

pub async fn spawn_app_with(config: Config, db_path: PathBuf) -> TestApp {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
    ));
    let shared = SharedState::with_clock(config, clock.clone())
        .await
        .expect("Failed to create shared state");
    let state = api::create_app_state(Arc::new(shared), None);

    TestApp {
        router: api::router(state.clone()),
        state,
        clock,
        db_path,
    }
}

impl TestApp {
    /// Seeds an account straight through the store, bypassing the guard.
    pub async fn seed_user(&self, username: &str, role: Role, region: Option<&str>) -> UserId {
        let now = self.clock.now();
        self.state
            .shared
            .store
            .create_user(
                NewUser {
                    name: username.to_string(),
                    username: username.to_string(),
                    email: None,
                    password: PASSWORD.to_string(),
                    role,
                    region: region.map(ToString::to_string),
                    department: None,
                    commune: None,
                    status: UserStatus::Active,
                },
                &self.state.shared.config.security,
                now,
            )
            .await
            .expect("Failed to seed user")
            .id
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    pub async fn login_raw(&self, username: &str, password: &str) -> (StatusCode, serde_json::Value) {
        self.request(
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({ "username": username, "password": password })),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self.login_raw(username, password).await;
        assert_eq!(status, StatusCode::OK, "login failed for {username}: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn super_admin_token(&self) -> String {
        self.login("superadmin", BOOTSTRAP_PASSWORD).await
    }

    pub async fn create_case(&self, token: &str, region: &str) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                "/api/cases",
                Some(token),
                Some(serde_json::json!({
                    "victim_name": "Victime",
                    "victim_region": region,
                    "violence_type": "physique",
                    "services_provided": ["écoute", "orientation médicale"]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "case creation failed: {body}");
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn audit_count(&self, action: &str) -> u64 {
        self.state
            .shared
            .store
            .count_audit_action(action.parse().unwrap())
            .await
            .unwrap()
    }
}

impl TestApp {
    pub fn clock_now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }
}
