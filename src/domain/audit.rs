//! Audit vocabulary: the closed set of security-relevant actions and the
//! shape of a single append-only entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ParseEnumError, Role, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    LoginSuccess,
    LoginFailed,
    AccountLocked,
    CaseCreated,
    CaseUpdated,
    CaseDeleted,
    UserCreated,
    UserUpdated,
    UserDeleted,
    UnauthorizedAccess,
    RoleChanged,
    PasswordChanged,
}

impl AuditAction {
    pub const ALL: [Self; 12] = [
        Self::LoginSuccess,
        Self::LoginFailed,
        Self::AccountLocked,
        Self::CaseCreated,
        Self::CaseUpdated,
        Self::CaseDeleted,
        Self::UserCreated,
        Self::UserUpdated,
        Self::UserDeleted,
        Self::UnauthorizedAccess,
        Self::RoleChanged,
        Self::PasswordChanged,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::CaseCreated => "CASE_CREATED",
            Self::CaseUpdated => "CASE_UPDATED",
            Self::CaseDeleted => "CASE_DELETED",
            Self::UserCreated => "USER_CREATED",
            Self::UserUpdated => "USER_UPDATED",
            Self::UserDeleted => "USER_DELETED",
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::RoleChanged => "ROLE_CHANGED",
            Self::PasswordChanged => "PASSWORD_CHANGED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "audit action",
                value: s.to_string(),
            })
    }
}

/// Who performed an audited action. Absent for pre-authentication failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditActor {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

/// Transport metadata captured per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub actor: Option<AuditActor>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub meta: RequestMeta,
    pub details: serde_json::Value,
    pub success: bool,
}

impl AuditEntry {
    #[must_use]
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            actor: None,
            resource_type: None,
            resource_id: None,
            meta: RequestMeta::default(),
            details: serde_json::Value::Object(serde_json::Map::new()),
            success: true,
        }
    }

    #[must_use]
    pub fn actor(mut self, actor: Option<AuditActor>) -> Self {
        self.actor = actor;
        self
    }

    #[must_use]
    pub fn resource(mut self, resource_type: &str, resource_id: impl fmt::Display) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if let serde_json::Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    #[must_use]
    pub const fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}
