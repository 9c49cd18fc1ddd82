//! `SeaORM` implementation of the `CaseService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::{Case, CaseFilter, CaseUpdate, NewCase, Store};
use crate::domain::{CaseId, CaseStatus};
use crate::security::guard;
use crate::security::Caller;
use crate::services::case_service::{CaseError, CaseInput, CaseQuery, CaseService, CaseStats};

pub struct SeaOrmCaseService {
    store: Store,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
}

impl SeaOrmCaseService {
    #[must_use]
    pub fn new(store: Store, config: Arc<Config>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    async fn load(&self, id: CaseId) -> Result<Case, CaseError> {
        self.store
            .get_case(id)
            .await?
            .ok_or(CaseError::NotFound(id))
    }

    fn check_region(&self, region: &str) -> Result<(), CaseError> {
        if self.config.is_known_region(region) {
            Ok(())
        } else {
            Err(CaseError::Validation(format!("Région inconnue : {region}")))
        }
    }

    fn scoped_filter(&self, caller: &Caller, query: CaseQuery) -> Result<CaseFilter, CaseError> {
        let region = if caller.is_super_admin() {
            if let Some(region) = &query.region {
                self.check_region(region)?;
            }
            query.region
        } else {
            None
        };

        Ok(CaseFilter {
            scope: guard::case_list_scope(caller),
            status: query.status,
            region,
        })
    }
}

#[async_trait]
impl CaseService for SeaOrmCaseService {
    async fn list(&self, caller: &Caller, query: CaseQuery) -> Result<Vec<Case>, CaseError> {
        let filter = self.scoped_filter(caller, query)?;
        Ok(self.store.list_cases(&filter).await?)
    }

    async fn stats(&self, caller: &Caller) -> Result<CaseStats, CaseError> {
        let filter = self.scoped_filter(caller, CaseQuery::default())?;
        let cases = self.store.list_cases(&filter).await?;
        Ok(CaseStats::from_cases(&cases))
    }

    async fn get(&self, caller: &Caller, id: CaseId) -> Result<Case, CaseError> {
        let case = self.load(id).await?;
        guard::authorize_case_access(caller, case.ownership())?;
        Ok(case)
    }

    async fn create(&self, caller: &Caller, input: CaseInput) -> Result<Case, CaseError> {
        let region = guard::resolve_case_region(caller, input.victim_region.as_deref())?
            .ok_or_else(|| {
                CaseError::Validation("La région de la victime est requise".to_string())
            })?;
        self.check_region(&region)?;

        let mut fields = input.fields;
        let violence_type = fields
            .violence_type
            .take()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                CaseError::Validation("Le type de violence est requis".to_string())
            })?;

        let case = self
            .store
            .create_case(
                NewCase {
                    fields,
                    violence_type,
                    status: input.status.unwrap_or(CaseStatus::Pending),
                    victim_region: Some(region),
                    agent_id: caller.id,
                    agent_name: caller.name.clone(),
                },
                self.clock.now(),
            )
            .await?;

        info!(case_id = %case.id, agent_id = %caller.id, region = ?case.victim_region, "Case created");
        Ok(case)
    }

    async fn update(
        &self,
        caller: &Caller,
        id: CaseId,
        input: CaseInput,
    ) -> Result<Case, CaseError> {
        let existing = self.load(id).await?;
        guard::authorize_case_access(caller, existing.ownership())?;

        let victim_region = match input.victim_region.as_deref() {
            None => None,
            Some(region) if Some(region) == existing.victim_region.as_deref() => None,
            Some(region) => {
                let resolved = guard::resolve_case_region(caller, Some(region))?;
                if let Some(region) = &resolved {
                    self.check_region(region)?;
                }
                resolved
            }
        };

        if input
            .fields
            .violence_type
            .as_deref()
            .is_some_and(|v| v.trim().is_empty())
        {
            return Err(CaseError::Validation(
                "Le type de violence ne peut pas être vide".to_string(),
            ));
        }

        let updated = self
            .store
            .update_case(
                id,
                CaseUpdate {
                    fields: input.fields,
                    status: input.status,
                    victim_region,
                },
                self.clock.now(),
            )
            .await?
            .ok_or(CaseError::NotFound(id))?;

        info!(case_id = %id, updated_by = %caller.id, status = %updated.status, "Case updated");
        Ok(updated)
    }

    async fn delete(&self, caller: &Caller, id: CaseId) -> Result<Case, CaseError> {
        let existing = self.load(id).await?;
        guard::authorize_case_delete(caller, existing.ownership())?;

        if !self.store.delete_case(id).await? {
            return Err(CaseError::NotFound(id));
        }

        info!(case_id = %id, deleted_by = %caller.id, "Case deleted");
        Ok(existing)
    }
}
