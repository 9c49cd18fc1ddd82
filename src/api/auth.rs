use axum::{
    Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extractors::{ClientMeta, CurrentUser};
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::security::guard::{self, Capabilities};
use crate::services::UserView;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserView,
    pub capabilities: Capabilities,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <token>` into a [`crate::security::Caller`]
/// stored in the request extensions. Every failure is the same 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_bearer(&headers).ok_or_else(ApiError::unauthenticated)?;

    let caller = state
        .shared
        .auth_service
        .authenticate(&token)
        .await
        .map_err(ApiError::from)?;

    tracing::Span::current().record("user_id", caller.id.value());
    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("Authorization")?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientMeta(meta): ClientMeta,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("Le nom d'utilisateur est requis"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Le mot de passe est requis"));
    }

    let result = state
        .shared
        .auth_service
        .login(username, &payload.password, &meta)
        .await?;

    Ok(Json(ApiResponse::success(LoginResponse {
        token: result.token,
        expires_at: result.expires_at,
        user: result.user,
    })))
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<MeResponse>>, ApiError> {
    let user = state.shared.auth_service.current_user(&caller).await?;

    Ok(Json(ApiResponse::success(MeResponse {
        user,
        capabilities: guard::capabilities(&caller),
    })))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    ClientMeta(meta): ClientMeta,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.current_password.is_empty() {
        return Err(ApiError::validation("Le mot de passe actuel est requis"));
    }

    state
        .shared
        .auth_service
        .change_password(&caller, &payload.current_password, &payload.new_password, &meta)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Mot de passe modifié avec succès",
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers).as_deref(), Some("abc.def"));

        headers.insert("Authorization", HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), None);
    }
}
