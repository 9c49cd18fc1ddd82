//! Audit decorator for the protected routes.
//!
//! Handlers describe what they changed by attaching an [`AuditNote`] to their
//! response. The middleware records the note once the handler has succeeded,
//! and records `UNAUTHORIZED_ACCESS` for every request the guard refused.

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use super::AppState;
use super::extractors::request_meta;
use crate::domain::audit::{AuditAction, AuditEntry};
use crate::security::Caller;

/// A pending audit entry carried in the response extensions.
#[derive(Debug, Clone)]
pub struct AuditNote(AuditEntry);

impl AuditNote {
    #[must_use]
    pub fn new(action: AuditAction, resource_type: &str, resource_id: impl fmt::Display) -> Self {
        Self(AuditEntry::new(action).resource(resource_type, resource_id))
    }

    #[must_use]
    pub fn detail(self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        Self(self.0.detail(key, value))
    }
}

pub async fn audit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let recorder = &state.shared.audit;
    if !recorder.is_enabled() {
        return next.run(request).await;
    }

    let caller = request.extensions().get::<Caller>().cloned();
    let meta = request_meta(
        request.headers(),
        request.extensions(),
        &state.config().server.trusted_proxy_ips,
    );
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path(), |uri| uri.0.path())
        .to_string();

    let mut response = next.run(request).await;
    let status = response.status();
    let note = response.extensions_mut().remove::<AuditNote>();
    let actor = caller.as_ref().map(Caller::audit_actor);

    if status.is_success() {
        if let Some(AuditNote(entry)) = note {
            recorder.record(entry.actor(actor).meta(meta)).await;
        }
    } else if status == StatusCode::FORBIDDEN {
        tracing::warn!(
            user_id = ?caller.as_ref().map(|c| c.id),
            method = %method,
            path = %path,
            "Access denied"
        );
        recorder
            .record(
                AuditEntry::new(AuditAction::UnauthorizedAccess)
                    .actor(actor)
                    .meta(meta)
                    .detail("method", method)
                    .detail("path", path)
                    .failed(),
            )
            .await;
    }

    response
}
