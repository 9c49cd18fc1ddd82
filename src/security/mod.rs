//! Authorization and session core.
//!
//! Everything in here is synchronous and free of I/O: the lockout policy, the
//! authorization guard and the session issuer take the clock reading and the
//! relevant records as arguments and return decisions. Services persist the
//! outcomes; the HTTP layer only translates them.

pub mod guard;
pub mod lockout;
pub mod session;

pub use guard::{CaseRef, CaseScope, Denial, UserOperation, UserRef};
pub use lockout::{LockoutPolicy, LoginDecision, LoginState};
pub use session::{Claims, IssuedSession, SessionError, SessionIssuer};

use crate::domain::audit::AuditActor;
use crate::domain::{Role, UserId};

/// The authenticated principal of a request, rebuilt from token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub region: Option<String>,
}

impl Caller {
    #[must_use]
    pub const fn is_super_admin(&self) -> bool {
        matches!(self.role, Role::SuperAdmin)
    }

    #[must_use]
    pub fn audit_actor(&self) -> AuditActor {
        AuditActor {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
        }
    }
}
