//! Domain service for authentication.
//!
//! Handles login with account lockout, bearer token verification and
//! password changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::audit::RequestMeta;
use crate::security::Caller;
use crate::services::user_service::UserView;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password. The hint is only present when the
    /// account exists and is close to being locked.
    #[error("Identifiants invalides")]
    InvalidCredentials { remaining_attempts: Option<u32> },

    #[error("Compte verrouillé. Réessayez dans {remaining_minutes} minute(s).")]
    AccountLocked { remaining_minutes: i64 },

    #[error("Compte désactivé. Contactez votre administrateur.")]
    AccountInactive,

    #[error("Authentification requise")]
    Unauthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Login result containing the bearer token and the account profile.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials under the lockout policy and issues a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccountLocked`] while a lock is active, even for
    /// the right password, [`AuthError::AccountInactive`] for disabled
    /// accounts and [`AuthError::InvalidCredentials`] otherwise.
    async fn login(
        &self,
        username: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<LoginResult, AuthError>;

    /// Turns a bearer token into the calling principal.
    async fn authenticate(&self, token: &str) -> Result<Caller, AuthError>;

    async fn current_user(&self, caller: &Caller) -> Result<UserView, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the current password is wrong or
    /// the new one is too short or unchanged.
    async fn change_password(
        &self,
        caller: &Caller,
        current_password: &str,
        new_password: &str,
        meta: &RequestMeta,
    ) -> Result<(), AuthError>;
}
