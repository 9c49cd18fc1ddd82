pub use super::audit_logs::Entity as AuditLogs;
pub use super::cases::Entity as Cases;
pub use super::users::Entity as Users;
