use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::types::ErrorBody;
use crate::security::Denial;
use crate::services::{AuthError, CaseError, UserError};

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(String),

    InvalidCredentials { remaining_attempts: Option<u32> },

    Forbidden(String),

    AccountInactive,

    NotFound(String),

    ValidationError(String),

    Conflict(String),

    AccountLocked { remaining_minutes: i64 },

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            ApiError::InvalidCredentials { .. } => write!(f, "Invalid credentials"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::AccountInactive => write!(f, "Account inactive"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::AccountLocked { remaining_minutes } => {
                write!(f, "Account locked for {} more minute(s)", remaining_minutes)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Stable machine-readable kind carried in every error body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::InvalidCredentials { .. } => "invalid_credentials",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::AccountInactive => "account_inactive",
            ApiError::NotFound(_) => "not_found",
            ApiError::ValidationError(_) => "invalid_input",
            ApiError::Conflict(_) => "conflict",
            ApiError::AccountLocked { .. } => "account_locked",
            ApiError::InternalError(_) => "internal",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) | ApiError::InvalidCredentials { .. } => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden(_) | ApiError::AccountInactive => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::AccountLocked { .. } => StatusCode::LOCKED,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the statuses emitted by the authentication, authorization
    /// and lockout refusals above.
    #[must_use]
    pub fn is_denial_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::LOCKED
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let mut remaining_attempts = None;
        let mut remaining_minutes = None;

        let message = match self {
            ApiError::Unauthenticated(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::ValidationError(msg)
            | ApiError::Conflict(msg) => msg,
            ApiError::InvalidCredentials {
                remaining_attempts: hint,
            } => match hint {
                Some(n) => {
                    remaining_attempts = Some(n);
                    format!(
                        "Identifiants invalides. Il vous reste {n} tentative(s) avant le verrouillage du compte."
                    )
                }
                None => "Identifiants invalides".to_string(),
            },
            ApiError::AccountInactive => {
                "Compte désactivé. Contactez votre administrateur.".to_string()
            }
            ApiError::AccountLocked {
                remaining_minutes: minutes,
            } => {
                remaining_minutes = Some(minutes);
                format!("Compte verrouillé. Réessayez dans {minutes} minute(s).")
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Une erreur interne est survenue".to_string()
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
            code,
            remaining_attempts,
            remaining_minutes,
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{err:#}"))
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        ApiError::Forbidden(denial.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials { remaining_attempts } => {
                Self::InvalidCredentials { remaining_attempts }
            }
            AuthError::AccountLocked { remaining_minutes } => {
                Self::AccountLocked { remaining_minutes }
            }
            AuthError::AccountInactive => Self::AccountInactive,
            AuthError::Unauthenticated => Self::unauthenticated(),
            AuthError::Validation(msg) => Self::validation(msg),
            AuthError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => Self::NotFound(err.to_string()),
            UserError::Forbidden(denial) => denial.into(),
            UserError::Validation(msg) => Self::validation(msg),
            UserError::Conflict(msg) => Self::Conflict(msg),
            UserError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl From<CaseError> for ApiError {
    fn from(err: CaseError) -> Self {
        match err {
            CaseError::NotFound(_) => Self::NotFound(err.to_string()),
            CaseError::Forbidden(denial) => denial.into(),
            CaseError::Validation(msg) => Self::validation(msg),
            CaseError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        ApiError::Unauthenticated("Authentification requise".to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
