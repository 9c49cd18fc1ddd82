use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;

use crate::domain::{CaseId, CaseStatus, UserId};
use crate::entities::{cases, prelude::*};
use crate::security::{CaseRef, CaseScope};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Case {
    pub id: CaseId,
    #[serde(flatten)]
    pub details: CaseRecordDetails,
    pub victim_region: Option<String>,
    pub status: CaseStatus,
    pub agent_id: UserId,
    pub agent_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Descriptive columns of a stored case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseRecordDetails {
    pub victim_name: Option<String>,
    pub victim_age: Option<i32>,
    pub victim_gender: Option<String>,
    pub victim_marital_status: Option<String>,
    pub victim_occupation: Option<String>,
    pub victim_commune: Option<String>,
    pub perpetrator_gender: Option<String>,
    pub perpetrator_age: Option<i32>,
    pub perpetrator_relationship: Option<String>,
    pub violence_type: String,
    pub violence_description: Option<String>,
    pub incident_date: Option<NaiveDate>,
    pub incident_location: Option<String>,
    pub services_provided: Vec<String>,
}

impl Case {
    #[must_use]
    pub fn ownership(&self) -> CaseRef<'_> {
        CaseRef {
            victim_region: self.victim_region.as_deref(),
            agent_id: self.agent_id,
        }
    }
}

impl TryFrom<cases::Model> for Case {
    type Error = anyhow::Error;

    fn try_from(model: cases::Model) -> Result<Self> {
        let services_provided: Vec<String> = serde_json::from_str(&model.services_provided)
            .with_context(|| format!("Corrupt services list for case {}", model.id))?;
        let status = model
            .status
            .parse()
            .with_context(|| format!("Corrupt status for case {}", model.id))?;

        Ok(Self {
            id: CaseId::new(model.id),
            details: CaseRecordDetails {
                victim_name: model.victim_name,
                victim_age: model.victim_age,
                victim_gender: model.victim_gender,
                victim_marital_status: model.victim_marital_status,
                victim_occupation: model.victim_occupation,
                victim_commune: model.victim_commune,
                perpetrator_gender: model.perpetrator_gender,
                perpetrator_age: model.perpetrator_age,
                perpetrator_relationship: model.perpetrator_relationship,
                violence_type: model.violence_type,
                violence_description: model.violence_description,
                incident_date: model.incident_date,
                incident_location: model.incident_location,
                services_provided,
            },
            victim_region: model.victim_region,
            status,
            agent_id: UserId::new(model.agent_id),
            agent_name: model.agent_name,
            created_at: model.created_at,
            updated_at: model.updated_at,
            submitted_at: model.submitted_at,
        })
    }
}

/// Descriptive fields supplied on create or update. On update, `None` keeps
/// the stored value.
#[derive(Debug, Clone, Default)]
pub struct CaseFields {
    pub victim_name: Option<String>,
    pub victim_age: Option<i32>,
    pub victim_gender: Option<String>,
    pub victim_marital_status: Option<String>,
    pub victim_occupation: Option<String>,
    pub victim_commune: Option<String>,
    pub perpetrator_gender: Option<String>,
    pub perpetrator_age: Option<i32>,
    pub perpetrator_relationship: Option<String>,
    pub violence_type: Option<String>,
    pub violence_description: Option<String>,
    pub incident_date: Option<NaiveDate>,
    pub incident_location: Option<String>,
    pub services_provided: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct NewCase {
    pub fields: CaseFields,
    pub violence_type: String,
    pub status: CaseStatus,
    pub victim_region: Option<String>,
    pub agent_id: UserId,
    pub agent_name: String,
}

#[derive(Debug, Clone)]
pub struct CaseUpdate {
    pub fields: CaseFields,
    pub status: Option<CaseStatus>,
    pub victim_region: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CaseFilter {
    pub scope: CaseScope,
    pub status: Option<CaseStatus>,
    pub region: Option<String>,
}

pub struct CaseRepository {
    conn: DatabaseConnection,
}

impl CaseRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: CaseId) -> Result<Option<Case>> {
        let row = Cases::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query case by ID")?;

        row.map(Case::try_from).transpose()
    }

    pub async fn list(&self, filter: &CaseFilter) -> Result<Vec<Case>> {
        let mut query = Cases::find().order_by_desc(cases::Column::CreatedAt);

        match &filter.scope {
            CaseScope::All => {}
            CaseScope::Region(region) => {
                query = query.filter(cases::Column::VictimRegion.eq(region.as_str()));
            }
            CaseScope::Agent(agent_id) => {
                query = query.filter(cases::Column::AgentId.eq(agent_id.value()));
            }
            CaseScope::Nothing => return Ok(Vec::new()),
        }

        if let Some(status) = filter.status {
            query = query.filter(cases::Column::Status.eq(status.as_str()));
        }
        if let Some(region) = &filter.region {
            query = query.filter(cases::Column::VictimRegion.eq(region.as_str()));
        }

        let rows = query.all(&self.conn).await.context("Failed to list cases")?;
        rows.into_iter().map(Case::try_from).collect()
    }

    pub async fn create(&self, new_case: NewCase, now: DateTime<Utc>) -> Result<Case> {
        let fields = new_case.fields;
        let services = serde_json::to_string(&fields.services_provided.unwrap_or_default())?;

        let active = cases::ActiveModel {
            victim_name: Set(fields.victim_name),
            victim_age: Set(fields.victim_age),
            victim_gender: Set(fields.victim_gender),
            victim_marital_status: Set(fields.victim_marital_status),
            victim_occupation: Set(fields.victim_occupation),
            victim_commune: Set(fields.victim_commune),
            victim_region: Set(new_case.victim_region),
            perpetrator_gender: Set(fields.perpetrator_gender),
            perpetrator_age: Set(fields.perpetrator_age),
            perpetrator_relationship: Set(fields.perpetrator_relationship),
            violence_type: Set(new_case.violence_type),
            violence_description: Set(fields.violence_description),
            incident_date: Set(fields.incident_date),
            incident_location: Set(fields.incident_location),
            services_provided: Set(services),
            status: Set(new_case.status.as_str().to_string()),
            agent_id: Set(new_case.agent_id.value()),
            agent_name: Set(new_case.agent_name),
            created_at: Set(now),
            updated_at: Set(now),
            submitted_at: Set(Some(now)),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert case")?;

        Case::try_from(model)
    }

    pub async fn update(
        &self,
        id: CaseId,
        update: CaseUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Case>> {
        let Some(model) = Cases::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query case for update")?
        else {
            return Ok(None);
        };

        let fields = update.fields;
        let mut active: cases::ActiveModel = model.into();

        macro_rules! set_some {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = fields.$field {
                        active.$field = Set(Some(value));
                    }
                )*
            };
        }
        set_some!(
            victim_name,
            victim_age,
            victim_gender,
            victim_marital_status,
            victim_occupation,
            victim_commune,
            perpetrator_gender,
            perpetrator_age,
            perpetrator_relationship,
            violence_description,
            incident_date,
            incident_location,
        );

        if let Some(violence_type) = fields.violence_type {
            active.violence_type = Set(violence_type);
        }
        if let Some(services) = fields.services_provided {
            active.services_provided = Set(serde_json::to_string(&services)?);
        }
        if let Some(status) = update.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(region) = update.victim_region {
            active.victim_region = Set(Some(region));
        }
        active.updated_at = Set(now);

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update case")?;

        Case::try_from(model).map(Some)
    }

    pub async fn delete(&self, id: CaseId) -> Result<bool> {
        let result = Cases::delete_by_id(id.value())
            .exec(&self.conn)
            .await
            .context("Failed to delete case")?;

        Ok(result.rows_affected > 0)
    }
}
