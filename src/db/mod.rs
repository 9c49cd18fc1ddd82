use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::domain::audit::{AuditAction, AuditEntry};
use crate::domain::{CaseId, Role, UserId, UserStatus};
use crate::security::lockout::CounterUpdate;

pub mod migrator;
pub mod repositories;

pub use repositories::audit::{AuditLogFilter, AuditLogRecord};
pub use repositories::case::{Case, CaseFields, CaseFilter, CaseUpdate, NewCase};
pub use repositories::user::{NewUser, User, UserChanges, UserFilter};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn case_repo(&self) -> repositories::case::CaseRepository {
        repositories::case::CaseRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    /// Creates the first super-admin when the users table is empty.
    /// Returns `true` if an account was created.
    pub async fn ensure_bootstrap_super_admin(
        &self,
        config: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(password) = config.bootstrap_password.as_deref() else {
            return Ok(false);
        };

        if self.user_repo().count().await? > 0 {
            return Ok(false);
        }

        let new_user = NewUser {
            name: "Super Administrateur".to_string(),
            username: config.bootstrap_username.clone(),
            email: None,
            password: password.to_string(),
            role: Role::SuperAdmin,
            region: None,
            department: None,
            commune: None,
            status: UserStatus::Active,
        };
        self.user_repo().create(new_user, config, now).await?;

        info!(username = %config.bootstrap_username, "Bootstrap super-admin created");
        Ok(true)
    }

    // ========== User Repository Methods ==========

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        self.user_repo().get_credentials(username).await
    }

    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>> {
        self.user_repo().get_password_hash(id).await
    }

    pub async fn email_taken(&self, email: &str, except: Option<UserId>) -> Result<bool> {
        self.user_repo().email_taken(email, except).await
    }

    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        self.user_repo().list(filter).await
    }

    pub async fn create_user(
        &self,
        new_user: NewUser,
        config: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<User> {
        self.user_repo().create(new_user, config, now).await
    }

    pub async fn update_user(
        &self,
        id: UserId,
        changes: UserChanges,
        config: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        self.user_repo().update(id, changes, config, now).await
    }

    pub async fn delete_user(&self, id: UserId) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn apply_login_failure(
        &self,
        id: UserId,
        observed_attempts: u32,
        update: &CounterUpdate,
    ) -> Result<bool> {
        self.user_repo()
            .apply_failure(id, observed_attempts, update)
            .await
    }

    pub async fn apply_login_success(&self, id: UserId, update: &CounterUpdate) -> Result<()> {
        self.user_repo().apply_success(id, update).await
    }

    pub async fn unlock_user(&self, username: &str, now: DateTime<Utc>) -> Result<bool> {
        self.user_repo().unlock(username, now).await
    }

    pub async fn update_password(
        &self,
        id: UserId,
        new_password: &str,
        config: &SecurityConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.user_repo()
            .update_password(id, new_password, config, now)
            .await
    }

    // ========== Case Repository Methods ==========

    pub async fn get_case(&self, id: CaseId) -> Result<Option<Case>> {
        self.case_repo().get(id).await
    }

    pub async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>> {
        self.case_repo().list(filter).await
    }

    pub async fn create_case(&self, new_case: NewCase, now: DateTime<Utc>) -> Result<Case> {
        self.case_repo().create(new_case, now).await
    }

    pub async fn update_case(
        &self,
        id: CaseId,
        update: CaseUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Case>> {
        self.case_repo().update(id, update, now).await
    }

    pub async fn delete_case(&self, id: CaseId) -> Result<bool> {
        self.case_repo().delete(id).await
    }

    // ========== Audit Repository Methods ==========

    pub async fn append_audit_log(&self, entry: &AuditEntry, now: DateTime<Utc>) -> Result<()> {
        self.audit_repo().append(entry, now).await
    }

    pub async fn list_audit_logs(
        &self,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<AuditLogRecord>, u64)> {
        self.audit_repo().list(filter).await
    }

    pub async fn count_audit_action(&self, action: AuditAction) -> Result<u64> {
        self.audit_repo().count_action(action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CaseStatus;
    use crate::security::CaseScope;

    fn cheap_security() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            bootstrap_password: Some("bootstrap-pass".to_string()),
            ..SecurityConfig::default()
        }
    }

    async fn temp_store(name: &str) -> (Store, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "vbg_store_{name}_{}.db",
            uuid::Uuid::new_v4().simple()
        ));
        let url = format!("sqlite:{}?mode=rwc", path.display());
        (Store::new(&url).await.unwrap(), path)
    }

    fn agent(username: &str, region: &str) -> NewUser {
        NewUser {
            name: username.to_string(),
            username: username.to_string(),
            email: None,
            password: "password123".to_string(),
            role: Role::Agent,
            region: Some(region.to_string()),
            department: None,
            commune: None,
            status: UserStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_bootstrap_only_on_empty_table() {
        let (store, path) = temp_store("bootstrap").await;
        let config = cheap_security();
        let now = Utc::now();

        assert!(store.ensure_bootstrap_super_admin(&config, now).await.unwrap());
        assert!(!store.ensure_bootstrap_super_admin(&config, now).await.unwrap());

        let admin = store
            .get_user_by_username(&config.bootstrap_username)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::SuperAdmin);
        assert_eq!(admin.region, None);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_detected() {
        let (store, path) = temp_store("dup").await;
        let config = cheap_security();
        let now = Utc::now();

        store.create_user(agent("awa", "Dakar"), &config, now).await.unwrap();
        let err = store
            .create_user(agent("awa", "Kolda"), &config, now)
            .await
            .unwrap_err();
        assert!(repositories::is_duplicate(&err));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_conditional_failure_update_loses_stale_race() {
        let (store, path) = temp_store("cas").await;
        let config = cheap_security();
        let now = Utc::now();
        let user = store.create_user(agent("awa", "Dakar"), &config, now).await.unwrap();

        let update = CounterUpdate {
            failed_login_attempts: 1,
            lock_until: None,
            last_failed_login: Some(now),
            last_login: None,
        };
        assert!(store.apply_login_failure(user.id, 0, &update).await.unwrap());
        // Second writer still believes the counter is 0.
        assert!(!store.apply_login_failure(user.id, 0, &update).await.unwrap());

        let reloaded = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.failed_login_attempts, 1);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_case_scopes_filter_rows() {
        let (store, path) = temp_store("cases").await;
        let now = Utc::now();

        for (region, agent_id) in [("Ziguinchor", 7), ("Ziguinchor", 8), ("Dakar", 7)] {
            store
                .create_case(
                    NewCase {
                        fields: CaseFields::default(),
                        violence_type: "physique".to_string(),
                        status: CaseStatus::Pending,
                        victim_region: Some(region.to_string()),
                        agent_id: UserId::new(agent_id),
                        agent_name: format!("agent {agent_id}"),
                    },
                    now,
                )
                .await
                .unwrap();
        }

        let filter = |scope| CaseFilter {
            scope,
            status: None,
            region: None,
        };

        assert_eq!(store.list_cases(&filter(CaseScope::All)).await.unwrap().len(), 3);
        let zig = store
            .list_cases(&filter(CaseScope::Region("Ziguinchor".to_string())))
            .await
            .unwrap();
        assert_eq!(zig.len(), 2);
        assert!(zig.iter().all(|c| c.victim_region.as_deref() == Some("Ziguinchor")));
        assert_eq!(
            store
                .list_cases(&filter(CaseScope::Agent(UserId::new(7))))
                .await
                .unwrap()
                .len(),
            2
        );
        assert!(store.list_cases(&filter(CaseScope::Nothing)).await.unwrap().is_empty());

        let _ = std::fs::remove_file(path);
    }
}
