//! Domain service for user account management.
//!
//! Every operation takes the authenticated [`Caller`] and consults the
//! authorization guard before touching the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::User;
use crate::domain::audit::RequestMeta;
use crate::domain::{Role, UserId, UserStatus};
use crate::security::{Caller, Denial};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Utilisateur {0} introuvable")]
    NotFound(UserId),

    #[error("{0}")]
    Forbidden(Denial),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Denial> for UserError {
    fn from(denial: Denial) -> Self {
        Self::Forbidden(denial)
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// User account as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub region: Option<String>,
    pub department: Option<String>,
    pub commune: Option<String>,
    pub status: UserStatus,
    pub failed_login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            role: user.role,
            region: user.region,
            department: user.department,
            commune: user.commune,
            status: user.status,
            failed_login_attempts: user.failed_login_attempts,
            lock_until: user.lock_until,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Option<Role>,
    pub region: Option<String>,
    pub department: Option<String>,
    pub commune: Option<String>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub region: Option<String>,
    pub department: Option<String>,
    pub commune: Option<String>,
    pub status: Option<UserStatus>,
    pub password: Option<String>,
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Super-admins see everyone, admins see the agents of their region,
    /// agents see only themselves.
    async fn list(&self, caller: &Caller) -> Result<Vec<UserView>, UserError>;

    async fn get(&self, caller: &Caller, id: UserId) -> Result<UserView, UserError>;

    /// # Errors
    ///
    /// Returns [`UserError::Forbidden`] before any write when an admin asks
    /// for a role other than agent or a region other than their own.
    async fn create(&self, caller: &Caller, input: CreateUserInput)
    -> Result<UserView, UserError>;

    /// Records `ROLE_CHANGED` itself when the role moves.
    async fn update(
        &self,
        caller: &Caller,
        id: UserId,
        input: UpdateUserInput,
        meta: &RequestMeta,
    ) -> Result<UserView, UserError>;

    /// Returns the account as it was before deletion.
    async fn delete(&self, caller: &Caller, id: UserId) -> Result<UserView, UserError>;
}
