use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tokio::task;

use super::map_unique_violation;
use crate::config::SecurityConfig;
use crate::domain::{Role, UserId, UserStatus};
use crate::entities::{prelude::*, users};
use crate::security::lockout::CounterUpdate;
use crate::security::{Caller, LoginState, UserRef};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
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
    pub last_failed_login: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn login_state(&self) -> LoginState {
        LoginState {
            status: self.status,
            failed_login_attempts: self.failed_login_attempts,
            lock_until: self.lock_until,
        }
    }

    #[must_use]
    pub fn as_target(&self) -> UserRef<'_> {
        UserRef {
            id: self.id,
            role: self.role,
            region: self.region.as_deref(),
        }
    }

    #[must_use]
    pub fn caller(&self) -> Caller {
        Caller {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            region: self.region.clone(),
        }
    }
}

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(model: users::Model) -> Result<Self> {
        Ok(Self {
            id: UserId::new(model.id),
            role: model
                .role
                .parse()
                .with_context(|| format!("Corrupt role for user {}", model.id))?,
            status: model
                .status
                .parse()
                .with_context(|| format!("Corrupt status for user {}", model.id))?,
            failed_login_attempts: u32::try_from(model.failed_login_attempts).unwrap_or(0),
            name: model.name,
            username: model.username,
            email: model.email,
            region: model.region,
            department: model.department,
            commune: model.commune,
            lock_until: model.lock_until,
            last_failed_login: model.last_failed_login,
            last_login: model.last_login,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Role,
    pub region: Option<String>,
    pub department: Option<String>,
    pub commune: Option<String>,
    pub status: UserStatus,
}

/// Partial update. `None` leaves a column untouched; the nested `Option`
/// fields distinguish "clear" from "keep".
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub role: Option<Role>,
    pub region: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub commune: Option<Option<String>>,
    pub status: Option<UserStatus>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub region: Option<String>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn count(&self) -> Result<u64> {
        Users::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        user.map(User::try_from).transpose()
    }

    /// Get user by username together with the stored hash (login only)
    pub async fn get_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        user.map(|u| {
            let password_hash = u.password_hash.clone();
            User::try_from(u).map(|user| (user, password_hash))
        })
        .transpose()
    }

    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>> {
        let user = Users::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(|u| u.password_hash))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let user = Users::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        user.map(User::try_from).transpose()
    }

    pub async fn email_taken(&self, email: &str, except: Option<UserId>) -> Result<bool> {
        let mut query = Users::find().filter(users::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(users::Column::Id.ne(id.value()));
        }

        let count = query
            .count(&self.conn)
            .await
            .context("Failed to check email uniqueness")?;
        Ok(count > 0)
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let mut query = Users::find().order_by_asc(users::Column::Name);

        if let Some(role) = filter.role {
            query = query.filter(users::Column::Role.eq(role.as_str()));
        }
        if let Some(region) = &filter.region {
            query = query.filter(users::Column::Region.eq(region.as_str()));
        }

        let rows = query.all(&self.conn).await.context("Failed to list users")?;
        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn create(
        &self,
        new_user: NewUser,
        config: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let password = new_user.password;
        let config = config.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .context("Password hashing task panicked")??;

        let active = users::ActiveModel {
            name: Set(new_user.name),
            username: Set(new_user.username),
            email: Set(new_user.email),
            password_hash: Set(password_hash),
            role: Set(new_user.role.as_str().to_string()),
            region: Set(new_user.region),
            department: Set(new_user.department),
            commune: Set(new_user.commune),
            status: Set(new_user.status.as_str().to_string()),
            failed_login_attempts: Set(0),
            lock_until: Set(None),
            last_failed_login: Set(None),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .map_err(map_unique_violation)
            .context("Failed to insert user")?;

        User::try_from(model)
    }

    pub async fn update(
        &self,
        id: UserId,
        changes: UserChanges,
        config: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let Some(model) = Users::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(None);
        };

        let password_hash = match changes.password {
            Some(password) => {
                let config = config.clone();
                Some(
                    task::spawn_blocking(move || hash_password(&password, &config))
                        .await
                        .context("Password hashing task panicked")??,
                )
            }
            None => None,
        };

        let mut active: users::ActiveModel = model.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(role) = changes.role {
            active.role = Set(role.as_str().to_string());
        }
        if let Some(region) = changes.region {
            active.region = Set(region);
        }
        if let Some(department) = changes.department {
            active.department = Set(department);
        }
        if let Some(commune) = changes.commune {
            active.commune = Set(commune);
        }
        if let Some(status) = changes.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(hash) = password_hash {
            active.password_hash = Set(hash);
        }
        active.updated_at = Set(now);

        let model = active
            .update(&self.conn)
            .await
            .map_err(map_unique_violation)
            .context("Failed to update user")?;

        User::try_from(model).map(Some)
    }

    pub async fn delete(&self, id: UserId) -> Result<bool> {
        let result = Users::delete_by_id(id.value())
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }

    /// Applies a failed-attempt update only if the counter still holds the
    /// value the caller read. Returns `false` when another request got there
    /// first.
    pub async fn apply_failure(
        &self,
        id: UserId,
        observed_attempts: u32,
        update: &CounterUpdate,
    ) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(
                users::Column::FailedLoginAttempts,
                sea_orm::sea_query::Expr::value(counter_value(update.failed_login_attempts)),
            )
            .col_expr(
                users::Column::LockUntil,
                sea_orm::sea_query::Expr::value(update.lock_until),
            )
            .col_expr(
                users::Column::LastFailedLogin,
                sea_orm::sea_query::Expr::value(update.last_failed_login),
            )
            .filter(users::Column::Id.eq(id.value()))
            .filter(users::Column::FailedLoginAttempts.eq(counter_value(observed_attempts)))
            .exec(&self.conn)
            .await
            .context("Failed to record failed login")?;

        Ok(result.rows_affected == 1)
    }

    pub async fn apply_success(&self, id: UserId, update: &CounterUpdate) -> Result<()> {
        Users::update_many()
            .col_expr(
                users::Column::FailedLoginAttempts,
                sea_orm::sea_query::Expr::value(counter_value(update.failed_login_attempts)),
            )
            .col_expr(
                users::Column::LockUntil,
                sea_orm::sea_query::Expr::value(update.lock_until),
            )
            .col_expr(
                users::Column::LastLogin,
                sea_orm::sea_query::Expr::value(update.last_login),
            )
            .filter(users::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await
            .context("Failed to record successful login")?;

        Ok(())
    }

    /// Clears lockout state. Returns `false` if no such user exists.
    pub async fn unlock(&self, username: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(
                users::Column::FailedLoginAttempts,
                sea_orm::sea_query::Expr::value(0),
            )
            .col_expr(
                users::Column::LockUntil,
                sea_orm::sea_query::Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(users::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await
            .context("Failed to unlock user")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn update_password(
        &self,
        id: UserId,
        new_password: &str,
        config: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let password = new_password.to_string();
        let config = config.clone();
        let new_hash = task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .context("Password hashing task panicked")??;

        Users::update_many()
            .col_expr(
                users::Column::PasswordHash,
                sea_orm::sea_query::Expr::value(new_hash),
            )
            .col_expr(users::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
            .filter(users::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await
            .context("Failed to update password")?;

        Ok(())
    }
}

fn counter_value(attempts: u32) -> i32 {
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

/// Verify a password against a stored hash.
/// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
/// and would block the async runtime if run directly.
pub async fn verify_password(password_hash: String, password: &str) -> Result<bool> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")?
}

/// Hash a password using Argon2id with the configured cost parameters.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_config() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("correct horse", &cheap_config()).unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(verify_password(hash.clone(), "correct horse").await.unwrap());
        assert!(!verify_password(hash, "wrong horse").await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("not-a-hash".to_string(), "x").await.is_err());
    }
}
