//! `SeaORM` implementation of the `UserService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::repositories::is_duplicate;
use crate::db::{NewUser, Store, User, UserChanges, UserFilter};
use crate::domain::audit::{AuditAction, AuditEntry, RequestMeta};
use crate::domain::{Role, UserId, UserStatus};
use crate::security::guard::{self, SensitiveChanges};
use crate::security::{Caller, UserOperation};
use crate::services::audit::AuditRecorder;
use crate::services::user_service::{
    CreateUserInput, UpdateUserInput, UserError, UserService, UserView,
};

pub struct SeaOrmUserService {
    store: Store,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    audit: AuditRecorder,
}

impl SeaOrmUserService {
    #[must_use]
    pub fn new(
        store: Store,
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            audit,
        }
    }

    async fn load(&self, id: UserId) -> Result<User, UserError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    fn check_region(&self, region: &str) -> Result<(), UserError> {
        if self.config.is_known_region(region) {
            Ok(())
        } else {
            Err(UserError::Validation(format!("Région inconnue : {region}")))
        }
    }

    fn check_password(&self, password: &str) -> Result<(), UserError> {
        let min = self.config.security.min_password_length;
        if password.chars().count() < min {
            return Err(UserError::Validation(format!(
                "Le mot de passe doit contenir au moins {min} caractères"
            )));
        }
        Ok(())
    }

    async fn check_email_free(&self, email: &str, except: Option<UserId>) -> Result<(), UserError> {
        if self.store.email_taken(email, except).await? {
            return Err(UserError::Conflict(
                "Cette adresse e-mail est déjà utilisée".to_string(),
            ));
        }
        Ok(())
    }
}

fn conflict_or_internal(err: anyhow::Error) -> UserError {
    if is_duplicate(&err) {
        UserError::Conflict("Nom d'utilisateur ou e-mail déjà utilisé".to_string())
    } else {
        UserError::from(err)
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn list(&self, caller: &Caller) -> Result<Vec<UserView>, UserError> {
        let users = match caller.role {
            Role::SuperAdmin => self.store.list_users(&UserFilter::default()).await?,
            Role::Admin => match &caller.region {
                Some(region) => {
                    self.store
                        .list_users(&UserFilter {
                            role: Some(Role::Agent),
                            region: Some(region.clone()),
                        })
                        .await?
                }
                None => Vec::new(),
            },
            Role::Agent => self.store.get_user(caller.id).await?.into_iter().collect(),
        };

        Ok(users.into_iter().map(UserView::from).collect())
    }

    async fn get(&self, caller: &Caller, id: UserId) -> Result<UserView, UserError> {
        let user = self.load(id).await?;
        guard::authorize_user_operation(caller, user.as_target(), UserOperation::View)?;
        Ok(user.into())
    }

    async fn create(
        &self,
        caller: &Caller,
        input: CreateUserInput,
    ) -> Result<UserView, UserError> {
        let scope = guard::resolve_new_user(caller, input.role, input.region.as_deref())?;

        let role = scope
            .role
            .ok_or_else(|| UserError::Validation("Le rôle est requis".to_string()))?;
        let region = if role.requires_region() {
            let region = scope.region.ok_or_else(|| {
                UserError::Validation("La région est requise pour ce rôle".to_string())
            })?;
            self.check_region(&region)?;
            Some(region)
        } else {
            None
        };

        self.check_password(&input.password)?;

        if self
            .store
            .get_user_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(UserError::Conflict(
                "Ce nom d'utilisateur existe déjà".to_string(),
            ));
        }
        if let Some(email) = &input.email {
            self.check_email_free(email, None).await?;
        }

        // Department and commune only describe field agents.
        let (department, commune) = if role == Role::Agent {
            (input.department, input.commune)
        } else {
            (None, None)
        };

        let user = self
            .store
            .create_user(
                NewUser {
                    name: input.name,
                    username: input.username,
                    email: input.email,
                    password: input.password,
                    role,
                    region,
                    department,
                    commune,
                    status: input.status.unwrap_or(UserStatus::Active),
                },
                &self.config.security,
                self.clock.now(),
            )
            .await
            .map_err(conflict_or_internal)?;

        info!(
            user_id = %user.id,
            username = %user.username,
            role = %user.role,
            created_by = %caller.id,
            "User created"
        );

        Ok(user.into())
    }

    async fn update(
        &self,
        caller: &Caller,
        id: UserId,
        input: UpdateUserInput,
        meta: &RequestMeta,
    ) -> Result<UserView, UserError> {
        let target = self.load(id).await?;

        let role_changed = input.role.is_some_and(|role| role != target.role);
        let region_changed = input
            .region
            .as_deref()
            .is_some_and(|region| Some(region) != target.region.as_deref());
        let status_changed = input.status.is_some_and(|status| status != target.status);

        guard::authorize_user_operation(
            caller,
            target.as_target(),
            UserOperation::Update(SensitiveChanges {
                role: role_changed,
                region: region_changed,
                status: status_changed,
            }),
        )?;

        let final_role = input.role.unwrap_or(target.role);
        let final_region = if final_role.requires_region() {
            let region = input.region.clone().or_else(|| target.region.clone());
            let region = region.ok_or_else(|| {
                UserError::Validation("La région est requise pour ce rôle".to_string())
            })?;
            self.check_region(&region)?;
            Some(region)
        } else {
            None
        };

        if let Some(password) = &input.password {
            self.check_password(password)?;
        }
        if let Some(email) = &input.email {
            self.check_email_free(email, Some(id)).await?;
        }

        let changes = UserChanges {
            name: input.name,
            email: input.email.map(Some),
            role: role_changed.then_some(final_role),
            region: (final_region != target.region).then_some(final_region),
            department: input.department.map(Some),
            commune: input.commune.map(Some),
            status: input.status,
            password: input.password,
        };

        let updated = self
            .store
            .update_user(id, changes, &self.config.security, self.clock.now())
            .await
            .map_err(conflict_or_internal)?
            .ok_or(UserError::NotFound(id))?;

        if role_changed {
            info!(
                user_id = %id,
                from = %target.role,
                to = %updated.role,
                changed_by = %caller.id,
                "User role changed"
            );
            self.audit
                .record(
                    AuditEntry::new(AuditAction::RoleChanged)
                        .actor(Some(caller.audit_actor()))
                        .resource("user", id)
                        .meta(meta.clone())
                        .detail("username", updated.username.clone())
                        .detail("from", target.role.as_str())
                        .detail("to", updated.role.as_str()),
                )
                .await;
        }

        Ok(updated.into())
    }

    async fn delete(&self, caller: &Caller, id: UserId) -> Result<UserView, UserError> {
        let target = self.load(id).await?;
        guard::authorize_user_operation(caller, target.as_target(), UserOperation::Delete)?;

        if !self.store.delete_user(id).await? {
            return Err(UserError::NotFound(id));
        }

        info!(user_id = %id, username = %target.username, deleted_by = %caller.id, "User deleted");
        Ok(target.into())
    }
}
