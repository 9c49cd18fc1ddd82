use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::extractors::CurrentUser;
use super::validation::{parse_optional, validate_id, validate_page, validate_page_size};
use super::{ApiError, ApiResponse, AppState, PaginatedResponse};
use crate::db::{AuditLogFilter, AuditLogRecord};
use crate::domain::UserId;
use crate::security::guard;

const DEFAULT_PAGE_SIZE: u64 = 50;

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub actor_id: Option<i32>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// GET /audit-logs
///
/// Newest first. Restricted to super-admins.
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<AuditLogRecord>>>, ApiError> {
    guard::authorize_audit_read(&caller)?;

    let page_size = validate_page_size(query.page_size.unwrap_or(DEFAULT_PAGE_SIZE))?;
    let page = validate_page(query.page.unwrap_or(1), page_size)?;
    let actor_id = query
        .actor_id
        .map(|id| validate_id(id, "utilisateur").map(UserId::new))
        .transpose()?;

    let filter = AuditLogFilter {
        action: parse_optional(query.action.as_deref())?,
        actor_id,
        page,
        page_size,
    };

    let (items, total) = state.store().list_audit_logs(&filter).await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        page_size,
    })))
}
