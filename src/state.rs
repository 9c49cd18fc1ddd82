use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Store;
use crate::security::SessionIssuer;
use crate::services::{
    AuditRecorder, AuthService, CaseService, SeaOrmAuthService, SeaOrmCaseService,
    SeaOrmUserService, UserService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub clock: Arc<dyn Clock>,

    pub audit: AuditRecorder,

    pub auth_service: Arc<dyn AuthService>,

    pub user_service: Arc<dyn UserService>,

    pub case_service: Arc<dyn CaseService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    /// Builds the state around an explicit clock so lockout and token expiry
    /// can be driven from tests.
    pub async fn with_clock(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        store
            .ensure_bootstrap_super_admin(&config.security, clock.now())
            .await?;

        let sessions = SessionIssuer::new(&config.session)?;
        let config = Arc::new(config);

        let audit = AuditRecorder::new(
            Arc::new(store.clone()),
            clock.clone(),
            config.audit.enabled,
        );

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.clone(),
            clock.clone(),
            sessions,
            audit.clone(),
        ));

        let user_service = Arc::new(SeaOrmUserService::new(
            store.clone(),
            config.clone(),
            clock.clone(),
            audit.clone(),
        ));

        let case_service = Arc::new(SeaOrmCaseService::new(
            store.clone(),
            config.clone(),
            clock.clone(),
        ));

        Ok(Self {
            config,
            store,
            clock,
            audit,
            auth_service,
            user_service,
            case_service,
        })
    }
}
