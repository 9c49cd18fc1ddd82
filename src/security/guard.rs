//! Authorization guard.
//!
//! Single source of truth for region scoping. Route handlers, services and
//! the capability flags served to the dashboard all call these functions;
//! none of them re-implement a role check.

use serde::Serialize;

use super::Caller;
use crate::domain::{Role, UserId};

/// Ownership view of a case: the two columns that decide access.
#[derive(Debug, Clone, Copy)]
pub struct CaseRef<'a> {
    pub victim_region: Option<&'a str>,
    pub agent_id: UserId,
}

#[derive(Debug, Clone, Copy)]
pub struct UserRef<'a> {
    pub id: UserId,
    pub role: Role,
    pub region: Option<&'a str>,
}

/// Which cases a bulk listing may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseScope {
    All,
    Region(String),
    Agent(UserId),
    /// Misconfigured admin without a region.
    Nothing,
}

/// Fields an update touches that carry access-control meaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensitiveChanges {
    pub role: bool,
    pub region: bool,
    pub status: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOperation {
    View,
    Update(SensitiveChanges),
    Delete,
}

/// Role and region a new account will be created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserScope {
    pub role: Option<Role>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("Accès refusé")]
    NotPermitted,
    #[error("Accès refusé : cette ressource n'appartient pas à votre région")]
    RegionMismatch,
    #[error("Vous n'êtes pas autorisé à attribuer ce rôle")]
    RoleEscalation,
    #[error("Vous n'êtes pas autorisé à attribuer cette région")]
    RegionEscalation,
    #[error("Vous ne pouvez pas supprimer votre propre compte")]
    SelfDelete,
    #[error("Vous ne pouvez pas modifier votre propre rôle, région ou statut")]
    SelfEscalation,
    #[error("Seul un super-administrateur peut consulter le journal d'audit")]
    AuditRestricted,
}

fn same_region(caller: &Caller, region: Option<&str>) -> bool {
    match (caller.region.as_deref(), region) {
        (Some(own), Some(other)) => own == other,
        _ => false,
    }
}

#[must_use]
pub fn can_access_case(caller: &Caller, case: CaseRef<'_>) -> bool {
    authorize_case_access(caller, case).is_ok()
}

pub fn authorize_case_access(caller: &Caller, case: CaseRef<'_>) -> Result<(), Denial> {
    match caller.role {
        Role::SuperAdmin => Ok(()),
        Role::Admin if same_region(caller, case.victim_region) => Ok(()),
        Role::Admin => Err(Denial::RegionMismatch),
        Role::Agent if case.agent_id == caller.id => Ok(()),
        Role::Agent => Err(Denial::NotPermitted),
    }
}

#[must_use]
pub fn can_delete_case(caller: &Caller, case: CaseRef<'_>) -> bool {
    authorize_case_delete(caller, case).is_ok()
}

pub fn authorize_case_delete(caller: &Caller, case: CaseRef<'_>) -> Result<(), Denial> {
    match caller.role {
        Role::Agent => Err(Denial::NotPermitted),
        Role::Admin | Role::SuperAdmin => authorize_case_access(caller, case),
    }
}

#[must_use]
pub fn case_list_scope(caller: &Caller) -> CaseScope {
    match caller.role {
        Role::SuperAdmin => CaseScope::All,
        Role::Admin => caller
            .region
            .clone()
            .map_or(CaseScope::Nothing, CaseScope::Region),
        Role::Agent => CaseScope::Agent(caller.id),
    }
}

/// Region a case will be stored under. Agents and admins always write into
/// their own region; naming another one is a denial, not a silent rewrite.
pub fn resolve_case_region(caller: &Caller, requested: Option<&str>) -> Result<Option<String>, Denial> {
    match caller.role {
        Role::SuperAdmin => Ok(requested.map(ToString::to_string)),
        Role::Admin | Role::Agent => {
            let own = caller.region.as_deref().ok_or(Denial::NotPermitted)?;
            match requested {
                None => Ok(Some(own.to_string())),
                Some(region) if region == own => Ok(Some(own.to_string())),
                Some(_) => Err(Denial::RegionEscalation),
            }
        }
    }
}

/// Admins may only create agents of their own region. Fails closed when an
/// admin explicitly asks for anything else.
pub fn resolve_new_user(
    caller: &Caller,
    requested_role: Option<Role>,
    requested_region: Option<&str>,
) -> Result<NewUserScope, Denial> {
    match caller.role {
        Role::Agent => Err(Denial::NotPermitted),
        Role::SuperAdmin => Ok(NewUserScope {
            role: requested_role,
            region: requested_region.map(ToString::to_string),
        }),
        Role::Admin => {
            let own = caller.region.as_deref().ok_or(Denial::NotPermitted)?;
            if requested_role.is_some_and(|role| role != Role::Agent) {
                return Err(Denial::RoleEscalation);
            }
            if requested_region.is_some_and(|region| region != own) {
                return Err(Denial::RegionEscalation);
            }
            Ok(NewUserScope {
                role: Some(Role::Agent),
                region: Some(own.to_string()),
            })
        }
    }
}

#[must_use]
pub fn can_manage_user(caller: &Caller, target: UserRef<'_>, operation: UserOperation) -> bool {
    authorize_user_operation(caller, target, operation).is_ok()
}

pub fn authorize_user_operation(
    caller: &Caller,
    target: UserRef<'_>,
    operation: UserOperation,
) -> Result<(), Denial> {
    let is_self = caller.id == target.id;

    match operation {
        UserOperation::View if is_self => Ok(()),
        UserOperation::Update(changes) if is_self => {
            if changes.role || changes.region || changes.status {
                Err(Denial::SelfEscalation)
            } else {
                Ok(())
            }
        }
        UserOperation::Delete if is_self => Err(Denial::SelfDelete),

        _ if caller.is_super_admin() => Ok(()),

        UserOperation::View | UserOperation::Delete => admin_over_agent(caller, target),
        UserOperation::Update(changes) => {
            admin_over_agent(caller, target)?;
            if changes.role {
                return Err(Denial::RoleEscalation);
            }
            if changes.region {
                return Err(Denial::RegionEscalation);
            }
            Ok(())
        }
    }
}

fn admin_over_agent(caller: &Caller, target: UserRef<'_>) -> Result<(), Denial> {
    if caller.role != Role::Admin || target.role != Role::Agent {
        return Err(Denial::NotPermitted);
    }
    if same_region(caller, target.region) {
        Ok(())
    } else {
        Err(Denial::RegionMismatch)
    }
}

pub fn authorize_audit_read(caller: &Caller) -> Result<(), Denial> {
    if caller.is_super_admin() {
        Ok(())
    } else {
        Err(Denial::AuditRestricted)
    }
}

/// Flags the dashboard uses to decide what to display. Display only: the
/// server re-checks every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_create_users: bool,
    pub can_create_admins: bool,
    pub can_delete_cases: bool,
    pub can_view_all_regions: bool,
    pub can_view_audit_logs: bool,
}

#[must_use]
pub fn capabilities(caller: &Caller) -> Capabilities {
    let privileged = matches!(caller.role, Role::Admin | Role::SuperAdmin);
    Capabilities {
        can_create_users: privileged,
        can_create_admins: caller.is_super_admin(),
        can_delete_cases: privileged,
        can_view_all_regions: caller.is_super_admin(),
        can_view_audit_logs: authorize_audit_read(caller).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: i32, role: Role, region: Option<&str>) -> Caller {
        Caller {
            id: UserId::new(id),
            name: format!("user-{id}"),
            role,
            region: region.map(ToString::to_string),
        }
    }

    fn case(region: &str, agent: i32) -> CaseRef<'_> {
        CaseRef {
            victim_region: Some(region),
            agent_id: UserId::new(agent),
        }
    }

    fn agent_target(id: i32, region: &str) -> UserRef<'_> {
        UserRef {
            id: UserId::new(id),
            role: Role::Agent,
            region: Some(region),
        }
    }

    #[test]
    fn test_case_access_by_role() {
        let sa = caller(1, Role::SuperAdmin, None);
        let admin = caller(2, Role::Admin, Some("Ziguinchor"));
        let agent = caller(7, Role::Agent, Some("Ziguinchor"));

        for c in [case("Dakar", 9), case("Ziguinchor", 7), case("Kolda", 3)] {
            assert!(can_access_case(&sa, c));
            assert_eq!(
                can_access_case(&admin, c),
                c.victim_region == Some("Ziguinchor")
            );
            assert_eq!(can_access_case(&agent, c), c.agent_id == agent.id);
        }
    }

    #[test]
    fn test_agent_access_ignores_region() {
        let agent = caller(7, Role::Agent, Some("Ziguinchor"));
        assert!(can_access_case(&agent, case("Dakar", 7)));
        assert!(!can_access_case(&agent, case("Ziguinchor", 8)));
    }

    #[test]
    fn test_admin_without_region_is_denied() {
        let admin = caller(2, Role::Admin, None);
        assert!(!can_access_case(&admin, case("Dakar", 1)));
        assert_eq!(case_list_scope(&admin), CaseScope::Nothing);
        assert_eq!(
            resolve_new_user(&admin, None, None),
            Err(Denial::NotPermitted)
        );
    }

    #[test]
    fn test_case_delete_rules() {
        let sa = caller(1, Role::SuperAdmin, None);
        let admin = caller(2, Role::Admin, Some("Dakar"));
        let agent = caller(7, Role::Agent, Some("Dakar"));

        assert!(can_delete_case(&sa, case("Kolda", 7)));
        assert!(can_delete_case(&admin, case("Dakar", 7)));
        assert!(!can_delete_case(&admin, case("Kolda", 7)));
        assert!(!can_delete_case(&agent, case("Dakar", 7)));
    }

    #[test]
    fn test_case_list_scope() {
        assert_eq!(
            case_list_scope(&caller(1, Role::SuperAdmin, None)),
            CaseScope::All
        );
        assert_eq!(
            case_list_scope(&caller(2, Role::Admin, Some("Ziguinchor"))),
            CaseScope::Region("Ziguinchor".to_string())
        );
        assert_eq!(
            case_list_scope(&caller(7, Role::Agent, Some("Ziguinchor"))),
            CaseScope::Agent(UserId::new(7))
        );
    }

    #[test]
    fn test_resolve_case_region() {
        let admin = caller(2, Role::Admin, Some("Dakar"));
        assert_eq!(
            resolve_case_region(&admin, None),
            Ok(Some("Dakar".to_string()))
        );
        assert_eq!(
            resolve_case_region(&admin, Some("Kolda")),
            Err(Denial::RegionEscalation)
        );

        let sa = caller(1, Role::SuperAdmin, None);
        assert_eq!(
            resolve_case_region(&sa, Some("Kolda")),
            Ok(Some("Kolda".to_string()))
        );
    }

    #[test]
    fn test_admin_creates_only_agents_of_own_region() {
        let admin = caller(2, Role::Admin, Some("Dakar"));

        assert_eq!(
            resolve_new_user(&admin, None, None),
            Ok(NewUserScope {
                role: Some(Role::Agent),
                region: Some("Dakar".to_string()),
            })
        );
        assert!(resolve_new_user(&admin, Some(Role::Agent), Some("Dakar")).is_ok());
        assert_eq!(
            resolve_new_user(&admin, Some(Role::Admin), None),
            Err(Denial::RoleEscalation)
        );
        assert_eq!(
            resolve_new_user(&admin, Some(Role::SuperAdmin), Some("Dakar")),
            Err(Denial::RoleEscalation)
        );
        assert_eq!(
            resolve_new_user(&admin, Some(Role::Agent), Some("Kolda")),
            Err(Denial::RegionEscalation)
        );
    }

    #[test]
    fn test_agents_cannot_create_users() {
        let agent = caller(7, Role::Agent, Some("Dakar"));
        assert_eq!(
            resolve_new_user(&agent, Some(Role::Agent), Some("Dakar")),
            Err(Denial::NotPermitted)
        );
    }

    #[test]
    fn test_nobody_deletes_themself() {
        for role in [Role::Agent, Role::Admin, Role::SuperAdmin] {
            let me = caller(5, role, Some("Dakar"));
            let target = UserRef {
                id: me.id,
                role,
                region: Some("Dakar"),
            };
            assert_eq!(
                authorize_user_operation(&me, target, UserOperation::Delete),
                Err(Denial::SelfDelete)
            );
        }
    }

    #[test]
    fn test_user_delete_rules() {
        let sa = caller(1, Role::SuperAdmin, None);
        let dakar_admin = caller(2, Role::Admin, Some("Dakar"));
        let kolda_agent = agent_target(9, "Kolda");

        assert!(can_manage_user(&sa, kolda_agent, UserOperation::Delete));
        assert_eq!(
            authorize_user_operation(&dakar_admin, kolda_agent, UserOperation::Delete),
            Err(Denial::RegionMismatch)
        );
        assert!(can_manage_user(
            &dakar_admin,
            agent_target(10, "Dakar"),
            UserOperation::Delete
        ));

        let other_admin = UserRef {
            id: UserId::new(3),
            role: Role::Admin,
            region: Some("Dakar"),
        };
        assert!(!can_manage_user(&dakar_admin, other_admin, UserOperation::Delete));
    }

    #[test]
    fn test_self_update_excludes_role_region_status() {
        let agent = caller(7, Role::Agent, Some("Dakar"));
        let me = agent_target(7, "Dakar");

        assert!(can_manage_user(
            &agent,
            me,
            UserOperation::Update(SensitiveChanges::default())
        ));
        assert_eq!(
            authorize_user_operation(
                &agent,
                me,
                UserOperation::Update(SensitiveChanges {
                    role: true,
                    ..Default::default()
                })
            ),
            Err(Denial::SelfEscalation)
        );
    }

    #[test]
    fn test_admin_updates_agents_but_not_their_role() {
        let admin = caller(2, Role::Admin, Some("Dakar"));
        let agent = agent_target(7, "Dakar");

        assert!(can_manage_user(
            &admin,
            agent,
            UserOperation::Update(SensitiveChanges {
                status: true,
                ..Default::default()
            })
        ));
        assert_eq!(
            authorize_user_operation(
                &admin,
                agent,
                UserOperation::Update(SensitiveChanges {
                    role: true,
                    ..Default::default()
                })
            ),
            Err(Denial::RoleEscalation)
        );
        assert_eq!(
            authorize_user_operation(
                &admin,
                agent_target(8, "Kolda"),
                UserOperation::Update(SensitiveChanges::default())
            ),
            Err(Denial::RegionMismatch)
        );
    }

    #[test]
    fn test_super_admin_updates_anyone_else() {
        let sa = caller(1, Role::SuperAdmin, None);
        let admin = UserRef {
            id: UserId::new(2),
            role: Role::Admin,
            region: Some("Dakar"),
        };
        assert!(can_manage_user(
            &sa,
            admin,
            UserOperation::Update(SensitiveChanges {
                role: true,
                region: true,
                status: true,
            })
        ));
    }

    #[test]
    fn test_capabilities() {
        let agent = capabilities(&caller(7, Role::Agent, Some("Dakar")));
        assert!(!agent.can_create_users);
        assert!(!agent.can_delete_cases);

        let admin = capabilities(&caller(2, Role::Admin, Some("Dakar")));
        assert!(admin.can_create_users);
        assert!(!admin.can_create_admins);
        assert!(!admin.can_view_audit_logs);

        let sa = capabilities(&caller(1, Role::SuperAdmin, None));
        assert!(sa.can_view_all_regions);
        assert!(sa.can_view_audit_logs);
    }
}
