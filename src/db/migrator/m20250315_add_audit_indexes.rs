use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_created_at")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_action")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::Action)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_actor_id")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::ActorId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_audit_logs_actor_id",
            "idx_audit_logs_action",
            "idx_audit_logs_created_at",
        ] {
            manager
                .drop_index(Index::drop().name(name).table(AuditLogs::Table).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(Iden)]
enum AuditLogs {
    Table,
    CreatedAt,
    Action,
    ActorId,
}
