pub mod prelude;

pub mod audit_logs;
pub mod cases;
pub mod users;
