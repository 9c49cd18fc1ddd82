use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::audit::AuditNote;
use super::extractors::{ClientMeta, CurrentUser};
use super::validation::{
    parse_optional, validate_email, validate_id, validate_required, validate_username,
};
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::domain::UserId;
use crate::domain::audit::AuditAction;
use crate::services::{CreateUserInput, UpdateUserInput, UserView};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Option<String>,
    pub region: Option<String>,
    pub department: Option<String>,
    pub commune: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub region: Option<String>,
    pub department: Option<String>,
    pub commune: Option<String>,
    pub status: Option<String>,
    pub password: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateUserRequest {
    fn into_input(self) -> Result<CreateUserInput, ApiError> {
        let email = non_empty(self.email)
            .map(|e| validate_email(&e).map(ToString::to_string))
            .transpose()?;

        Ok(CreateUserInput {
            name: validate_required(&self.name, "nom")?.to_string(),
            username: validate_username(&self.username)?.to_string(),
            email,
            password: self.password,
            role: parse_optional(self.role.as_deref())?,
            region: non_empty(self.region),
            department: non_empty(self.department),
            commune: non_empty(self.commune),
            status: parse_optional(self.status.as_deref())?,
        })
    }
}

impl UpdateUserRequest {
    fn into_input(self) -> Result<UpdateUserInput, ApiError> {
        let name = self
            .name
            .map(|n| validate_required(&n, "nom").map(ToString::to_string))
            .transpose()?;
        let email = non_empty(self.email)
            .map(|e| validate_email(&e).map(ToString::to_string))
            .transpose()?;

        Ok(UpdateUserInput {
            name,
            email,
            role: parse_optional(self.role.as_deref())?,
            region: non_empty(self.region),
            department: non_empty(self.department),
            commune: non_empty(self.commune),
            status: parse_optional(self.status.as_deref())?,
            password: self.password.filter(|p| !p.is_empty()),
        })
    }
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<Vec<UserView>>>, ApiError> {
    let users = state.shared.user_service.list(&caller).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let id = UserId::new(validate_id(id, "utilisateur")?);
    let user = state.shared.user_service.get(&caller, id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Extension<AuditNote>, Json<ApiResponse<UserView>>), ApiError> {
    let input = payload.into_input()?;
    let user = state.shared.user_service.create(&caller, input).await?;

    let note = AuditNote::new(AuditAction::UserCreated, "user", user.id)
        .detail("username", user.username.clone())
        .detail("role", user.role.as_str())
        .detail("region", user.region.clone());

    Ok((
        StatusCode::CREATED,
        Extension(note),
        Json(ApiResponse::success(user)),
    ))
}

/// PUT /users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<(Extension<AuditNote>, Json<ApiResponse<UserView>>), ApiError> {
    let id = UserId::new(validate_id(id, "utilisateur")?);
    let input = payload.into_input()?;
    let password_reset = input.password.is_some();
    let user = state
        .shared
        .user_service
        .update(&caller, id, input, &meta)
        .await?;

    let note = AuditNote::new(AuditAction::UserUpdated, "user", user.id)
        .detail("username", user.username.clone())
        .detail("password_reset", password_reset);

    Ok((Extension(note), Json(ApiResponse::success(user))))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i32>,
) -> Result<(Extension<AuditNote>, Json<ApiResponse<MessageResponse>>), ApiError> {
    let id = UserId::new(validate_id(id, "utilisateur")?);
    let user = state.shared.user_service.delete(&caller, id).await?;

    let note = AuditNote::new(AuditAction::UserDeleted, "user", user.id)
        .detail("username", user.username.clone())
        .detail("role", user.role.as_str());

    Ok((
        Extension(note),
        Json(ApiResponse::success(MessageResponse::new(format!(
            "Utilisateur {} supprimé",
            user.username
        )))),
    ))
}
