//! Request extractors shared by the handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, request::Parts},
};

use super::{ApiError, AppState};
use crate::domain::audit::RequestMeta;
use crate::security::Caller;

/// The authenticated caller, placed in the request extensions by the auth
/// middleware. Rejects with 401 when absent.
pub struct CurrentUser(pub Caller);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(ApiError::unauthenticated)
    }
}

/// Client address and user agent of the current request.
pub struct ClientMeta(pub RequestMeta);

impl FromRequestParts<Arc<AppState>> for ClientMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(request_meta(
            &parts.headers,
            &parts.extensions,
            &state.config().server.trusted_proxy_ips,
        )))
    }
}

/// `X-Forwarded-For` is honoured only when the socket peer is a trusted
/// proxy; otherwise the peer address is recorded as-is.
pub fn request_meta(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted_proxies: &[String],
) -> RequestMeta {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string);

    let ip = match (&peer, forwarded) {
        (Some(peer_ip), Some(client)) if trusted_proxies.iter().any(|p| p == peer_ip) => {
            Some(client)
        }
        _ => peer,
    };

    let user_agent = headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(ToString::to_string);

    RequestMeta { ip, user_agent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_peer(ip: &str) -> Extensions {
        let mut ext = Extensions::new();
        ext.insert(ConnectInfo(SocketAddr::new(ip.parse().unwrap(), 40000)));
        ext
    }

    fn forwarded_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("41.82.10.5, 10.0.0.1"),
        );
        headers.insert("user-agent", HeaderValue::from_static("Mozilla/5.0"));
        headers
    }

    #[test]
    fn test_forwarded_for_ignored_from_untrusted_peer() {
        let meta = request_meta(&forwarded_headers(), &with_peer("203.0.113.9"), &[]);
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn test_forwarded_for_used_behind_trusted_proxy() {
        let meta = request_meta(
            &forwarded_headers(),
            &with_peer("127.0.0.1"),
            &["127.0.0.1".to_string()],
        );
        assert_eq!(meta.ip.as_deref(), Some("41.82.10.5"));
    }

    #[test]
    fn test_missing_connect_info() {
        let meta = request_meta(&HeaderMap::new(), &Extensions::new(), &[]);
        assert_eq!(meta, RequestMeta::default());
    }
}
