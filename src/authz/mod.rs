/// Role, permission, and scope model
///
/// Roles are a closed set matched exhaustively; adding a role forces every
/// call site to be revisited. Permission maps are typed: a role row whose
/// JSON names an unknown resource or action fails at load time instead of
/// silently denying.
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// The five portal roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Full system access; implicitly holds every permission
    Admin,
    /// Manages one department's users, worksheets, and reports
    #[serde(rename = "Department Manager")]
    DepartmentManager,
    /// Leads and reviews team work
    #[serde(rename = "Team Lead")]
    TeamLead,
    /// Standard employee access
    Employee,
    /// Read-only audit access across departments
    Auditor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::DepartmentManager => "Department Manager",
            Role::TeamLead => "Team Lead",
            Role::Employee => "Employee",
            Role::Auditor => "Auditor",
        }
    }

    pub fn from_str(s: &str) -> ApiResult<Self> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Department Manager" => Ok(Role::DepartmentManager),
            "Team Lead" => Ok(Role::TeamLead),
            "Employee" => Ok(Role::Employee),
            "Auditor" => Ok(Role::Auditor),
            _ => Err(ApiError::Validation(format!("Invalid role: {}", s))),
        }
    }

    pub fn all() -> [Role; 5] {
        [
            Role::Admin,
            Role::DepartmentManager,
            Role::TeamLead,
            Role::Employee,
            Role::Auditor,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Full system access",
            Role::DepartmentManager => "Manage department operations",
            Role::TeamLead => "Lead and review team work",
            Role::Employee => "Standard employee access",
            Role::Auditor => "Read-only audit access",
        }
    }

    /// Default permission map for a role, used when seeding the roles table
    pub fn default_permissions(&self) -> PermissionMap {
        use Action::*;
        use Resource::*;
        let entries: &[(Resource, &[Action])] = match self {
            Role::Admin => &[
                (Users, &[Create, Read, Update, Delete]),
                (Departments, &[Create, Read, Update, Delete]),
                (Roles, &[Create, Read, Update, Delete]),
                (Worksheets, &[Create, Read, Update, Delete, Approve]),
                (Reports, &[Create, Read, Update, Delete, Approve, Export]),
                (Dashboards, &[Read, Export]),
                (Audit, &[Read, Export]),
                (Settings, &[Read, Update]),
            ],
            Role::DepartmentManager => &[
                (Users, &[Read, Update]),
                (Worksheets, &[Read, Approve]),
                (Reports, &[Read, Approve, Export]),
                (Dashboards, &[Read, Export]),
                (Audit, &[Read]),
            ],
            Role::TeamLead => &[
                (Users, &[Read]),
                (Worksheets, &[Create, Read, Update, Review]),
                (Reports, &[Create, Read, Update, Export]),
                (Dashboards, &[Read]),
            ],
            Role::Employee => &[
                (Worksheets, &[Create, Read, Update]),
                (Reports, &[Create, Read, Update]),
                (Dashboards, &[Read]),
            ],
            Role::Auditor => &[
                (Worksheets, &[Read]),
                (Reports, &[Read, Export]),
                (Dashboards, &[Read]),
                (Audit, &[Read, Export]),
            ],
        };

        PermissionMap(
            entries
                .iter()
                .map(|(resource, actions)| (*resource, actions.iter().copied().collect()))
                .collect(),
        )
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protected resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Users,
    Departments,
    Roles,
    Worksheets,
    Reports,
    Dashboards,
    Audit,
    Settings,
}

/// Actions a role can hold on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Approve,
    Review,
    Export,
}

/// Typed permission map from resource to allowed actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMap(pub BTreeMap<Resource, BTreeSet<Action>>);

impl PermissionMap {
    /// Parse a role row's JSON permission blob. Unknown resources or actions
    /// are load-time errors.
    pub fn from_json(raw: &str) -> ApiResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ApiError::Validation(format!("Invalid permission map: {}", e)))
    }

    pub fn to_json(&self) -> ApiResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ApiError::Internal(format!("Failed to serialize permission map: {}", e)))
    }

    /// Membership check; an absent resource key behaves as the empty set
    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.0
            .get(&resource)
            .map(|actions| actions.contains(&action))
            .unwrap_or(false)
    }
}

/// Permission evaluator: Admin always passes, everyone else needs the
/// action in their map
pub fn evaluate(role: Role, permissions: &PermissionMap, resource: Resource, action: Action) -> bool {
    match role {
        Role::Admin => true,
        Role::DepartmentManager | Role::TeamLead | Role::Employee | Role::Auditor => {
            permissions.allows(resource, action)
        }
    }
}

/// Require a permission or fail with 403
pub fn require(
    role: Role,
    permissions: &PermissionMap,
    resource: Resource,
    action: Action,
) -> ApiResult<()> {
    if evaluate(role, permissions, resource, action) {
        Ok(())
    } else {
        Err(ApiError::Authorization(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

/// Row-level scope derived from the caller's role. Each role maps to exactly
/// one rule; client-supplied filters only ever narrow it further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// No row filter (Admin, Auditor)
    Unrestricted,
    /// Rows whose department matches
    Department(Uuid),
    /// Rows created by the caller
    Owned(Uuid),
    /// Rows created by or assigned to the caller
    OwnedOrAssigned(Uuid),
}

impl Scope {
    /// Scope for worksheet queries
    pub fn for_worksheets(role: Role, user_id: Uuid, department_id: Option<Uuid>) -> Scope {
        match role {
            Role::Admin | Role::Auditor => Scope::Unrestricted,
            Role::DepartmentManager => match department_id {
                Some(dept) => Scope::Department(dept),
                // A manager with no department sees only their own rows
                None => Scope::OwnedOrAssigned(user_id),
            },
            Role::TeamLead | Role::Employee => Scope::OwnedOrAssigned(user_id),
        }
    }

    /// Scope for report queries
    pub fn for_reports(role: Role, user_id: Uuid, department_id: Option<Uuid>) -> Scope {
        match role {
            Role::Admin | Role::Auditor => Scope::Unrestricted,
            Role::DepartmentManager => match department_id {
                Some(dept) => Scope::Department(dept),
                None => Scope::Owned(user_id),
            },
            Role::TeamLead | Role::Employee => Scope::Owned(user_id),
        }
    }

    /// Scope for user queries
    pub fn for_users(role: Role, user_id: Uuid, department_id: Option<Uuid>) -> Scope {
        match role {
            Role::Admin => Scope::Unrestricted,
            Role::DepartmentManager => match department_id {
                Some(dept) => Scope::Department(dept),
                None => Scope::Owned(user_id),
            },
            Role::TeamLead | Role::Employee | Role::Auditor => Scope::Owned(user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_always_allowed() {
        let empty = PermissionMap::default();
        for resource in [
            Resource::Users,
            Resource::Worksheets,
            Resource::Reports,
            Resource::Audit,
        ] {
            for action in [Action::Create, Action::Delete, Action::Approve] {
                assert!(evaluate(Role::Admin, &empty, resource, action));
            }
        }
    }

    #[test]
    fn test_evaluate_is_map_membership_for_non_admin() {
        for role in Role::all() {
            if role == Role::Admin {
                continue;
            }
            let permissions = role.default_permissions();
            for resource in [
                Resource::Users,
                Resource::Departments,
                Resource::Roles,
                Resource::Worksheets,
                Resource::Reports,
                Resource::Dashboards,
                Resource::Audit,
                Resource::Settings,
            ] {
                for action in [
                    Action::Create,
                    Action::Read,
                    Action::Update,
                    Action::Delete,
                    Action::Approve,
                    Action::Review,
                    Action::Export,
                ] {
                    assert_eq!(
                        evaluate(role, &permissions, resource, action),
                        permissions.allows(resource, action),
                        "role {:?} resource {:?} action {:?}",
                        role,
                        resource,
                        action
                    );
                }
            }
        }
    }

    #[test]
    fn test_absent_resource_denies() {
        let permissions = Role::Employee.default_permissions();
        assert!(!evaluate(
            Role::Employee,
            &permissions,
            Resource::Audit,
            Action::Read
        ));
        assert!(!evaluate(
            Role::Employee,
            &permissions,
            Resource::Users,
            Action::Read
        ));
    }

    #[test]
    fn test_employee_cannot_approve() {
        let permissions = Role::Employee.default_permissions();
        assert!(!evaluate(
            Role::Employee,
            &permissions,
            Resource::Worksheets,
            Action::Approve
        ));
    }

    #[test]
    fn test_manager_can_approve_but_not_create_users() {
        let permissions = Role::DepartmentManager.default_permissions();
        assert!(evaluate(
            Role::DepartmentManager,
            &permissions,
            Resource::Worksheets,
            Action::Approve
        ));
        assert!(!evaluate(
            Role::DepartmentManager,
            &permissions,
            Resource::Users,
            Action::Create
        ));
    }

    #[test]
    fn test_permission_map_round_trip() {
        for role in Role::all() {
            let map = role.default_permissions();
            let json = map.to_json().unwrap();
            let parsed = PermissionMap::from_json(&json).unwrap();
            assert_eq!(map, parsed);
        }
    }

    #[test]
    fn test_unknown_resource_is_load_time_error() {
        let raw = r#"{"gadgets": ["read"]}"#;
        assert!(PermissionMap::from_json(raw).is_err());
    }

    #[test]
    fn test_unknown_action_is_load_time_error() {
        let raw = r#"{"worksheets": ["teleport"]}"#;
        assert!(PermissionMap::from_json(raw).is_err());
    }

    #[test]
    fn test_role_string_round_trip() {
        for role in Role::all() {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
        assert!(Role::from_str("Superuser").is_err());
    }

    #[test]
    fn test_single_scope_rule_per_role() {
        let user = Uuid::new_v4();
        let dept = Uuid::new_v4();

        assert_eq!(
            Scope::for_worksheets(Role::Admin, user, Some(dept)),
            Scope::Unrestricted
        );
        assert_eq!(
            Scope::for_worksheets(Role::Auditor, user, Some(dept)),
            Scope::Unrestricted
        );
        assert_eq!(
            Scope::for_worksheets(Role::DepartmentManager, user, Some(dept)),
            Scope::Department(dept)
        );
        assert_eq!(
            Scope::for_worksheets(Role::Employee, user, Some(dept)),
            Scope::OwnedOrAssigned(user)
        );
        assert_eq!(
            Scope::for_reports(Role::Employee, user, Some(dept)),
            Scope::Owned(user)
        );
        assert_eq!(
            Scope::for_users(Role::DepartmentManager, user, Some(dept)),
            Scope::Department(dept)
        );
    }
}
