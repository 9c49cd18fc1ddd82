use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

use super::audit::AuditNote;
use super::extractors::CurrentUser;
use super::validation::{parse_optional, validate_id};
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::db::{Case, CaseFields};
use crate::domain::CaseId;
use crate::domain::audit::AuditAction;
use crate::services::{CaseInput, CaseQuery, CaseStats};

#[derive(Debug, Deserialize)]
pub struct CaseListQuery {
    pub status: Option<String>,
    pub region: Option<String>,
}

/// Body of `POST /cases` and `PUT /cases/{id}`. Absent fields are left
/// untouched on update.
#[derive(Debug, Default, Deserialize)]
pub struct CaseRequest {
    pub victim_name: Option<String>,
    pub victim_age: Option<i32>,
    pub victim_gender: Option<String>,
    pub victim_marital_status: Option<String>,
    pub victim_occupation: Option<String>,
    pub victim_commune: Option<String>,
    pub victim_region: Option<String>,
    pub perpetrator_gender: Option<String>,
    pub perpetrator_age: Option<i32>,
    pub perpetrator_relationship: Option<String>,
    pub violence_type: Option<String>,
    pub violence_description: Option<String>,
    pub incident_date: Option<NaiveDate>,
    pub incident_location: Option<String>,
    pub services_provided: Option<Vec<String>>,
    pub status: Option<String>,
}

impl CaseRequest {
    fn into_input(self) -> Result<CaseInput, ApiError> {
        for age in [self.victim_age, self.perpetrator_age].into_iter().flatten() {
            if !(0..=150).contains(&age) {
                return Err(ApiError::validation(format!("Âge invalide : {age}")));
            }
        }

        let status = parse_optional(self.status.as_deref())?;

        Ok(CaseInput {
            fields: CaseFields {
                victim_name: self.victim_name,
                victim_age: self.victim_age,
                victim_gender: self.victim_gender,
                victim_marital_status: self.victim_marital_status,
                victim_occupation: self.victim_occupation,
                victim_commune: self.victim_commune,
                perpetrator_gender: self.perpetrator_gender,
                perpetrator_age: self.perpetrator_age,
                perpetrator_relationship: self.perpetrator_relationship,
                violence_type: self.violence_type,
                violence_description: self.violence_description,
                incident_date: self.incident_date,
                incident_location: self.incident_location,
                services_provided: self.services_provided,
            },
            status,
            victim_region: self
                .victim_region
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        })
    }
}

/// GET /cases
pub async fn list_cases(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Query(query): Query<CaseListQuery>,
) -> Result<Json<ApiResponse<Vec<Case>>>, ApiError> {
    let query = CaseQuery {
        status: parse_optional(query.status.as_deref())?,
        region: query.region.filter(|r| !r.trim().is_empty()),
    };

    let cases = state.shared.case_service.list(&caller, query).await?;
    Ok(Json(ApiResponse::success(cases)))
}

/// GET /cases/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<CaseStats>>, ApiError> {
    let stats = state.shared.case_service.stats(&caller).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// GET /cases/{id}
pub async fn get_case(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Case>>, ApiError> {
    let id = CaseId::new(validate_id(id, "dossier")?);
    let case = state.shared.case_service.get(&caller, id).await?;
    Ok(Json(ApiResponse::success(case)))
}

/// POST /cases
pub async fn create_case(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Json(payload): Json<CaseRequest>,
) -> Result<(StatusCode, Extension<AuditNote>, Json<ApiResponse<Case>>), ApiError> {
    let input = payload.into_input()?;
    let case = state.shared.case_service.create(&caller, input).await?;

    let note = AuditNote::new(AuditAction::CaseCreated, "case", case.id)
        .detail("victim_region", case.victim_region.clone())
        .detail("violence_type", case.details.violence_type.clone());

    Ok((
        StatusCode::CREATED,
        Extension(note),
        Json(ApiResponse::success(case)),
    ))
}

/// PUT /cases/{id}
pub async fn update_case(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<CaseRequest>,
) -> Result<(Extension<AuditNote>, Json<ApiResponse<Case>>), ApiError> {
    let id = CaseId::new(validate_id(id, "dossier")?);
    let input = payload.into_input()?;
    let case = state.shared.case_service.update(&caller, id, input).await?;

    let note = AuditNote::new(AuditAction::CaseUpdated, "case", case.id)
        .detail("status", case.status.as_str());

    Ok((Extension(note), Json(ApiResponse::success(case))))
}

/// DELETE /cases/{id}
pub async fn delete_case(
    State(state): State<Arc<AppState>>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<i32>,
) -> Result<(Extension<AuditNote>, Json<ApiResponse<MessageResponse>>), ApiError> {
    let id = CaseId::new(validate_id(id, "dossier")?);
    let case = state.shared.case_service.delete(&caller, id).await?;

    let note = AuditNote::new(AuditAction::CaseDeleted, "case", case.id)
        .detail("victim_region", case.victim_region.clone())
        .detail("agent_id", case.agent_id.value());

    Ok((
        Extension(note),
        Json(ApiResponse::success(MessageResponse::new(format!(
            "Dossier {id} supprimé"
        )))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CaseStatus;

    #[test]
    fn test_request_maps_status_and_trims_region() {
        let input = CaseRequest {
            violence_type: Some("physique".to_string()),
            status: Some("follow-up".to_string()),
            victim_region: Some("  ".to_string()),
            ..CaseRequest::default()
        }
        .into_input()
        .unwrap();

        assert_eq!(input.status, Some(CaseStatus::FollowUp));
        assert_eq!(input.victim_region, None);
        assert_eq!(input.fields.violence_type.as_deref(), Some("physique"));
    }

    #[test]
    fn test_request_rejects_unknown_status() {
        let err = CaseRequest {
            status: Some("lost".to_string()),
            ..CaseRequest::default()
        }
        .into_input()
        .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn test_request_rejects_negative_age() {
        let result = CaseRequest {
            victim_age: Some(-1),
            ..CaseRequest::default()
        }
        .into_input();
        assert!(result.is_err());
    }
}
