//! Domain service for VBG case records.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::db::{Case, CaseFields};
use crate::domain::{CaseId, CaseStatus};
use crate::security::{Caller, Denial};

#[derive(Debug, Error)]
pub enum CaseError {
    #[error("Dossier {0} introuvable")]
    NotFound(CaseId),

    #[error("{0}")]
    Forbidden(Denial),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Denial> for CaseError {
    fn from(denial: Denial) -> Self {
        Self::Forbidden(denial)
    }
}

impl From<anyhow::Error> for CaseError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaseQuery {
    pub status: Option<CaseStatus>,
    /// Honoured for super-admins only; everyone else is already scoped.
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CaseInput {
    pub fields: CaseFields,
    pub status: Option<CaseStatus>,
    pub victim_region: Option<String>,
}

/// Aggregates over the cases visible to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaseStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_region: BTreeMap<String, u64>,
    pub by_violence_type: BTreeMap<String, u64>,
}

impl CaseStats {
    #[must_use]
    pub fn from_cases(cases: &[Case]) -> Self {
        let mut stats = Self::default();
        for case in cases {
            stats.total += 1;
            *stats
                .by_status
                .entry(case.status.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_region
                .entry(
                    case.victim_region
                        .clone()
                        .unwrap_or_else(|| "inconnue".to_string()),
                )
                .or_default() += 1;
            *stats
                .by_violence_type
                .entry(case.details.violence_type.clone())
                .or_default() += 1;
        }
        stats
    }
}

#[async_trait::async_trait]
pub trait CaseService: Send + Sync {
    async fn list(&self, caller: &Caller, query: CaseQuery) -> Result<Vec<Case>, CaseError>;

    async fn stats(&self, caller: &Caller) -> Result<CaseStats, CaseError>;

    async fn get(&self, caller: &Caller, id: CaseId) -> Result<Case, CaseError>;

    /// Stamps the caller as the case's agent. Non-super-admins always file
    /// into their own region.
    async fn create(&self, caller: &Caller, input: CaseInput) -> Result<Case, CaseError>;

    async fn update(&self, caller: &Caller, id: CaseId, input: CaseInput)
    -> Result<Case, CaseError>;

    /// Returns the case as it was before deletion.
    async fn delete(&self, caller: &Caller, id: CaseId) -> Result<Case, CaseError>;
}
