use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::{ApiError, AppState};

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.prometheus_handle.as_ref().map_or_else(
        || "Metrics not enabled or failed to initialize".to_string(),
        metrics_exporter_prometheus::PrometheusHandle::render,
    )
}

fn outcome(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "error"
    } else if ApiError::is_denial_status(status) {
        "denied"
    } else if status.is_client_error() {
        "client_error"
    } else {
        "success"
    }
}

/// Opens the per-request span (`user_id` is filled in by the auth
/// middleware) and emits one wide event plus the HTTP metrics when the
/// response is ready. Refusals are logged at warn.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    // Route template, so case and user ids stay out of metric labels.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| path.clone(), |mp| mp.as_str().to_owned());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_owned();

    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %method,
        path = %path,
        route = %route,
        user_id = tracing::field::Empty,
    );

    async move {
        let response = next.run(req).await;

        let elapsed = start.elapsed();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let status = response.status();
        let outcome = outcome(status);

        let labels = [
            ("method", method.to_string()),
            ("path", route),
            ("status", status.as_u16().to_string()),
        ];
        metrics::counter!("http_requests_total", &labels).increment(1);
        metrics::histogram!("http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        if outcome == "denied" {
            warn!(
                event = "http_request_denied",
                duration_ms,
                status_code = status.as_u16(),
                user_agent = %user_agent,
                "Request denied"
            );
        } else {
            info!(
                event = "http_request_finished",
                duration_ms,
                status_code = status.as_u16(),
                user_agent = %user_agent,
                outcome,
                "Request finished"
            );
        }

        response
    }
    .instrument(span)
    .await
}

const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("cache-control", "no-store"),
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'",
    ),
];

/// Case and user payloads are sensitive: nothing may be cached or framed.
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert_eq!(outcome(StatusCode::OK), "success");
        assert_eq!(outcome(StatusCode::CREATED), "success");
        assert_eq!(outcome(StatusCode::UNAUTHORIZED), "denied");
        assert_eq!(outcome(StatusCode::FORBIDDEN), "denied");
        assert_eq!(outcome(StatusCode::LOCKED), "denied");
        assert_eq!(outcome(StatusCode::NOT_FOUND), "client_error");
        assert_eq!(outcome(StatusCode::BAD_REQUEST), "client_error");
        assert_eq!(outcome(StatusCode::SERVICE_UNAVAILABLE), "error");
    }
}
