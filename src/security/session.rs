//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying the caller's id, display name, role and
//! region. Expiry is checked against the injected clock reading rather than
//! the wall clock so the whole lifecycle can be tested deterministically.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::Caller;
use crate::config::SessionConfig;
use crate::domain::{Role, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Every verification failure collapses into this one variant.
    #[error("Session invalide ou expirée")]
    Unauthenticated,

    #[error("Session secret is not usable: {0}")]
    Misconfigured(String),

    #[error("Failed to sign session token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub region: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

impl Claims {
    pub fn caller(&self) -> Result<Caller, SessionError> {
        let id = self
            .sub
            .parse::<i32>()
            .map_err(|_| SessionError::Unauthenticated)?;

        Ok(Caller {
            id: UserId::new(id),
            name: self.name.clone(),
            role: self.role,
            region: self.region.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        if config.secret.len() < 32 {
            return Err(SessionError::Misconfigured(
                "secret must be at least 32 bytes".to_string(),
            ));
        }
        if config.ttl_minutes <= 0 {
            return Err(SessionError::Misconfigured(
                "ttl_minutes must be positive".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        // Checked below against the supplied clock reading.
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(config.secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(config.secret.as_bytes())),
            validation: Arc::new(validation),
            issuer: config.issuer.clone(),
            ttl: Duration::minutes(config.ttl_minutes),
        })
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, caller: &Caller, now: DateTime<Utc>) -> Result<IssuedSession, SessionError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: caller.id.to_string(),
            name: caller.name.clone(),
            role: caller.role,
            region: caller.region.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))?;

        Ok(IssuedSession { token, expires_at })
    }

    /// Rejects tampered, malformed, foreign and expired tokens alike.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, SessionError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(kind = ?e.kind(), "Session token rejected");
            SessionError::Unauthenticated
        })?;

        let claims = data.claims;
        if now.timestamp() >= claims.exp {
            tracing::debug!(sub = %claims.sub, "Session token expired");
            return Err(SessionError::Unauthenticated);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn issuer() -> SessionIssuer {
        SessionIssuer::new(&SessionConfig {
            secret: SECRET.to_string(),
            ..SessionConfig::default()
        })
        .unwrap()
    }

    fn zig_agent() -> Caller {
        Caller {
            id: UserId::new(7),
            name: "Awa Diatta".to_string(),
            role: Role::Agent,
            region: Some("Ziguinchor".to_string()),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_verify_returns_issued_claims() {
        let sessions = issuer();
        let issued = sessions.issue(&zig_agent(), t0()).unwrap();

        let claims = sessions.verify(&issued.token, t0() + Duration::minutes(1)).unwrap();
        assert_eq!(claims.caller().unwrap(), zig_agent());
        assert_eq!(issued.expires_at, t0() + Duration::hours(4));
    }

    #[test]
    fn test_token_lifetime_is_four_hours() {
        let sessions = issuer();
        let token = sessions.issue(&zig_agent(), t0()).unwrap().token;

        let just_before = t0() + Duration::hours(3) + Duration::minutes(59);
        assert!(sessions.verify(&token, just_before).is_ok());

        let just_after = t0() + Duration::hours(4) + Duration::minutes(1);
        assert_eq!(
            sessions.verify(&token, just_after),
            Err(SessionError::Unauthenticated)
        );
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let sessions = issuer();
        let token = sessions.issue(&zig_agent(), t0()).unwrap().token;
        let signature = token.rsplit('.').next().unwrap();

        let promoted = Caller {
            role: Role::SuperAdmin,
            region: None,
            ..zig_agent()
        };
        let forged = sessions.issue(&promoted, t0()).unwrap().token;
        let (forged_body, _) = forged.rsplit_once('.').unwrap();
        let tampered = format!("{forged_body}.{signature}");

        assert_eq!(
            sessions.verify(&tampered, t0()),
            Err(SessionError::Unauthenticated)
        );
    }

    #[test]
    fn test_foreign_secret_and_garbage_are_rejected() {
        let token = issuer().issue(&zig_agent(), t0()).unwrap().token;
        let other = SessionIssuer::new(&SessionConfig {
            secret: "ffffffffffffffffffffffffffffffff".to_string(),
            ..SessionConfig::default()
        })
        .unwrap();

        assert_eq!(other.verify(&token, t0()), Err(SessionError::Unauthenticated));
        assert_eq!(
            issuer().verify("not-a-token", t0()),
            Err(SessionError::Unauthenticated)
        );
        assert_eq!(issuer().verify("", t0()), Err(SessionError::Unauthenticated));
    }

    #[test]
    fn test_short_secret_is_refused() {
        let err = SessionIssuer::new(&SessionConfig {
            secret: "short".to_string(),
            ..SessionConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, SessionError::Misconfigured(_)));
    }
}
