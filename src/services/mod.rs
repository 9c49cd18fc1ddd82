pub mod audit;
pub use audit::{AuditRecorder, AuditSink};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult};
pub use auth_service_impl::SeaOrmAuthService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{CreateUserInput, UpdateUserInput, UserError, UserService, UserView};
pub use user_service_impl::SeaOrmUserService;

pub mod case_service;
pub mod case_service_impl;
pub use case_service::{CaseError, CaseInput, CaseQuery, CaseService, CaseStats};
pub use case_service_impl::SeaOrmCaseService;
