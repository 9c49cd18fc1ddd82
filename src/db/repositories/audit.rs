use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;

use crate::domain::UserId;
use crate::domain::audit::{AuditAction, AuditEntry};
use crate::entities::{audit_logs, prelude::*};

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogRecord {
    pub id: i64,
    pub action: String,
    pub actor_id: Option<i32>,
    pub actor_name: Option<String>,
    pub actor_role: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: serde_json::Value,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl From<audit_logs::Model> for AuditLogRecord {
    fn from(model: audit_logs::Model) -> Self {
        Self {
            id: model.id,
            action: model.action,
            actor_id: model.actor_id,
            actor_name: model.actor_name,
            actor_role: model.actor_role,
            resource_type: model.resource_type,
            resource_id: model.resource_id,
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            details: serde_json::from_str(&model.details).unwrap_or(serde_json::Value::Null),
            success: model.success,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditLogFilter {
    pub action: Option<AuditAction>,
    pub actor_id: Option<UserId>,
    pub page: u64,
    pub page_size: u64,
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn append(&self, entry: &AuditEntry, now: DateTime<Utc>) -> Result<()> {
        let actor = entry.actor.as_ref();
        let active_model = audit_logs::ActiveModel {
            action: Set(entry.action.as_str().to_string()),
            actor_id: Set(actor.map(|a| a.id.value())),
            actor_name: Set(actor.map(|a| a.name.clone())),
            actor_role: Set(actor.map(|a| a.role.as_str().to_string())),
            resource_type: Set(entry.resource_type.clone()),
            resource_id: Set(entry.resource_id.clone()),
            ip_address: Set(entry.meta.ip.clone()),
            user_agent: Set(entry.meta.user_agent.clone()),
            details: Set(entry.details.to_string()),
            success: Set(entry.success),
            created_at: Set(now),
            ..Default::default()
        };

        AuditLogs::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to append audit log")?;
        Ok(())
    }

    /// Newest first. Returns the page and the total number of matching rows.
    pub async fn list(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLogRecord>, u64)> {
        let mut query = AuditLogs::find()
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id);

        if let Some(action) = filter.action {
            query = query.filter(audit_logs::Column::Action.eq(action.as_str()));
        }
        if let Some(actor_id) = filter.actor_id {
            query = query.filter(audit_logs::Column::ActorId.eq(actor_id.value()));
        }

        let paginator = query.paginate(&self.conn, filter.page_size.max(1));
        let total = paginator
            .num_items()
            .await
            .context("Failed to count audit logs")?;
        let items = paginator
            .fetch_page(filter.page.saturating_sub(1))
            .await
            .context("Failed to fetch audit logs")?;

        Ok((items.into_iter().map(AuditLogRecord::from).collect(), total))
    }

    pub async fn count_action(&self, action: AuditAction) -> Result<u64> {
        AuditLogs::find()
            .filter(audit_logs::Column::Action.eq(action.as_str()))
            .count(&self.conn)
            .await
            .context("Failed to count audit logs")
    }
}
