//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tokio::task;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{Config, SecurityConfig};
use crate::db::repositories::user::{hash_password, verify_password};
use crate::db::{Store, User};
use crate::domain::UserStatus;
use crate::domain::audit::{AuditAction, AuditEntry, RequestMeta};
use crate::security::lockout::AttemptOutcome;
use crate::security::{Caller, LockoutPolicy, LoginDecision, SessionIssuer};
use crate::services::audit::AuditRecorder;
use crate::services::auth_service::{AuthError, AuthService, LoginResult};
use crate::services::user_service::UserView;

/// Re-reads allowed when a concurrent login moved the failure counter.
const MAX_COUNTER_RETRIES: usize = 3;

const DUMMY_PASSWORD: &str = "vbg-tracker-unknown-account";

/// Verifies `password` against a throwaway hash built with the configured
/// argon2 parameters, so an unknown username costs as much as a wrong password.
async fn verify_against_dummy(
    dummy_hash: &OnceCell<String>,
    security: &SecurityConfig,
    password: &str,
) -> bool {
    let hash = dummy_hash
        .get_or_try_init(|| async {
            let security = security.clone();
            task::spawn_blocking(move || hash_password(DUMMY_PASSWORD, &security))
                .await
                .context("Password hashing task panicked")?
        })
        .await;

    match hash {
        Ok(hash) => verify_password(hash.clone(), password)
            .await
            .unwrap_or(false),
        Err(e) => {
            warn!(error = %e, "Failed to build dummy password hash");
            false
        }
    }
}

pub struct SeaOrmAuthService {
    store: Store,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    sessions: SessionIssuer,
    lockout: LockoutPolicy,
    audit: AuditRecorder,
    dummy_hash: OnceCell<String>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        sessions: SessionIssuer,
        audit: AuditRecorder,
    ) -> Self {
        let lockout = LockoutPolicy::from_config(&config.security.lockout);
        Self {
            store,
            config,
            clock,
            sessions,
            lockout,
            audit,
            dummy_hash: OnceCell::new(),
        }
    }

    async fn audit_login_failure(
        &self,
        username: &str,
        user: Option<&User>,
        reason: &str,
        meta: &RequestMeta,
    ) {
        let mut entry = AuditEntry::new(AuditAction::LoginFailed)
            .actor(user.map(|u| u.caller().audit_actor()))
            .meta(meta.clone())
            .detail("username", username)
            .detail("reason", reason)
            .failed();
        if let Some(user) = user {
            entry = entry.resource("user", user.id);
        }
        self.audit.record(entry).await;
    }

    fn deny(&self, decision: LoginDecision) -> Option<AuthError> {
        match decision {
            LoginDecision::Allowed => None,
            LoginDecision::Locked { remaining_minutes } => {
                Some(AuthError::AccountLocked { remaining_minutes })
            }
            LoginDecision::Inactive => Some(AuthError::AccountInactive),
        }
    }

    /// Persists one failed attempt with a compare-and-set on the counter.
    /// Only the request whose write lands performs the lock transition.
    async fn register_failure(
        &self,
        mut user: User,
        now: DateTime<Utc>,
    ) -> Result<(User, AttemptOutcome), AuthError> {
        for _ in 0..MAX_COUNTER_RETRIES {
            if let Some(denial) = self.deny(self.lockout.evaluate_login(&user.login_state(), now)) {
                return Err(denial);
            }

            let outcome = self
                .lockout
                .record_outcome(&user.login_state(), false, now);
            if self
                .store
                .apply_login_failure(user.id, user.failed_login_attempts, &outcome.update)
                .await?
            {
                return Ok((user, outcome));
            }

            user = self
                .store
                .get_user(user.id)
                .await?
                .ok_or(AuthError::InvalidCredentials {
                    remaining_attempts: None,
                })?;
        }

        warn!(user_id = %user.id, "Failed-login counter contended, giving up");
        Err(AuthError::InvalidCredentials {
            remaining_attempts: None,
        })
    }
}

fn count_attempt(outcome: &'static str) {
    metrics::counter!("auth_login_attempts_total", "outcome" => outcome).increment(1);
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        username: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<LoginResult, AuthError> {
        let now = self.clock.now();

        let Some((user, password_hash)) = self.store.get_user_credentials(username).await? else {
            verify_against_dummy(&self.dummy_hash, &self.config.security, password).await;
            count_attempt("unknown_user");
            info!(username = %username, "Login failed: user not found");
            self.audit_login_failure(username, None, "user not found", meta)
                .await;
            return Err(AuthError::InvalidCredentials {
                remaining_attempts: None,
            });
        };

        match self.lockout.evaluate_login(&user.login_state(), now) {
            LoginDecision::Allowed => {}
            LoginDecision::Locked { remaining_minutes } => {
                count_attempt("locked");
                info!(user_id = %user.id, remaining_minutes, "Login refused: account locked");
                self.audit_login_failure(username, Some(&user), "account locked", meta)
                    .await;
                return Err(AuthError::AccountLocked { remaining_minutes });
            }
            LoginDecision::Inactive => {
                count_attempt("inactive");
                info!(user_id = %user.id, "Login refused: account inactive");
                self.audit_login_failure(username, Some(&user), "account inactive", meta)
                    .await;
                return Err(AuthError::AccountInactive);
            }
        }

        if !verify_password(password_hash, password).await? {
            let (user, outcome) = self.register_failure(user, now).await?;
            count_attempt("invalid_password");
            info!(
                user_id = %user.id,
                attempts = outcome.update.failed_login_attempts,
                "Login failed: invalid password"
            );
            self.audit
                .record(
                    AuditEntry::new(AuditAction::LoginFailed)
                        .actor(Some(user.caller().audit_actor()))
                        .resource("user", user.id)
                        .meta(meta.clone())
                        .detail("username", username)
                        .detail("reason", "invalid password")
                        .detail("failed_attempts", outcome.update.failed_login_attempts)
                        .failed(),
                )
                .await;

            if outcome.newly_locked {
                warn!(
                    user_id = %user.id,
                    lock_until = ?outcome.update.lock_until,
                    "Account locked after repeated failed logins"
                );
                self.audit
                    .record(
                        AuditEntry::new(AuditAction::AccountLocked)
                            .actor(Some(user.caller().audit_actor()))
                            .resource("user", user.id)
                            .meta(meta.clone())
                            .detail("username", username)
                            .detail("failed_attempts", outcome.update.failed_login_attempts)
                            .detail(
                                "lock_minutes",
                                self.config.security.lockout.lock_minutes,
                            ),
                    )
                    .await;
            }

            return Err(AuthError::InvalidCredentials {
                remaining_attempts: outcome.remaining_attempts,
            });
        }

        let outcome = self.lockout.record_outcome(&user.login_state(), true, now);
        self.store.apply_login_success(user.id, &outcome.update).await?;

        let issued = self
            .sessions
            .issue(&user.caller(), now)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        count_attempt("success");
        info!(user_id = %user.id, role = %user.role, "Login succeeded");
        self.audit
            .record(
                AuditEntry::new(AuditAction::LoginSuccess)
                    .actor(Some(user.caller().audit_actor()))
                    .resource("user", user.id)
                    .meta(meta.clone())
                    .detail("username", username),
            )
            .await;

        let mut view = UserView::from(user);
        view.failed_login_attempts = 0;
        view.lock_until = None;
        view.last_login = Some(now);

        Ok(LoginResult {
            token: issued.token,
            expires_at: issued.expires_at,
            user: view,
        })
    }

    async fn authenticate(&self, token: &str) -> Result<Caller, AuthError> {
        let claims = self
            .sessions
            .verify(token, self.clock.now())
            .map_err(|_| AuthError::Unauthenticated)?;
        let caller = claims.caller().map_err(|_| AuthError::Unauthenticated)?;

        if !self.config.session.revalidate_claims {
            return Ok(caller);
        }

        let Some(user) = self.store.get_user(caller.id).await? else {
            return Err(AuthError::Unauthenticated);
        };
        if user.status != UserStatus::Active
            || user.role != caller.role
            || user.region != caller.region
        {
            info!(user_id = %caller.id, "Token claims no longer match the account");
            return Err(AuthError::Unauthenticated);
        }

        Ok(user.caller())
    }

    async fn current_user(&self, caller: &Caller) -> Result<UserView, AuthError> {
        self.store
            .get_user(caller.id)
            .await?
            .map(UserView::from)
            .ok_or(AuthError::Unauthenticated)
    }

    async fn change_password(
        &self,
        caller: &Caller,
        current_password: &str,
        new_password: &str,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let min = self.config.security.min_password_length;
        if new_password.chars().count() < min {
            return Err(AuthError::Validation(format!(
                "Le nouveau mot de passe doit contenir au moins {min} caractères"
            )));
        }

        if current_password == new_password {
            return Err(AuthError::Validation(
                "Le nouveau mot de passe doit être différent de l'actuel".to_string(),
            ));
        }

        let hash = self
            .store
            .get_password_hash(caller.id)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        if !verify_password(hash, current_password).await? {
            return Err(AuthError::Validation(
                "Le mot de passe actuel est incorrect".to_string(),
            ));
        }

        self.store
            .update_password(
                caller.id,
                new_password,
                &self.config.security,
                self.clock.now(),
            )
            .await?;

        info!(user_id = %caller.id, "Password changed");
        self.audit
            .record(
                AuditEntry::new(AuditAction::PasswordChanged)
                    .actor(Some(caller.audit_actor()))
                    .resource("user", caller.id)
                    .meta(meta.clone()),
            )
            .await;

        Ok(())
    }
}
