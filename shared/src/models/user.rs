//! User roles and the permission matrix

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Role assigned to a platform user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full access, including user management
    Admin,
    /// Runs the training program: courses, trainings, certificates, reports
    Coordinator,
    /// Records workplace and EPP inspections
    Inspector,
    /// Read-only access
    Viewer,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::Admin,
        UserRole::Coordinator,
        UserRole::Inspector,
        UserRole::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Coordinator => "coordinator",
            UserRole::Inspector => "inspector",
            UserRole::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("user role", s))
    }

    pub fn display_name_es(&self) -> &'static str {
        match self {
            UserRole::Admin => "Administrador",
            UserRole::Coordinator => "Coordinador SST",
            UserRole::Inspector => "Inspector",
            UserRole::Viewer => "Consulta",
        }
    }
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    User,
    Location,
    Coach,
    Course,
    Collaborator,
    Training,
    Certificate,
    Inspection,
    EppInspection,
    Report,
}

impl Resource {
    pub const ALL: [Resource; 10] = [
        Resource::User,
        Resource::Location,
        Resource::Coach,
        Resource::Course,
        Resource::Collaborator,
        Resource::Training,
        Resource::Certificate,
        Resource::Inspection,
        Resource::EppInspection,
        Resource::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::User => "user",
            Resource::Location => "location",
            Resource::Coach => "coach",
            Resource::Course => "course",
            Resource::Collaborator => "collaborator",
            Resource::Training => "training",
            Resource::Certificate => "certificate",
            Resource::Inspection => "inspection",
            Resource::EppInspection => "epp_inspection",
            Resource::Report => "report",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Export,
    Import,
    Issue,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::Export,
        Action::Import,
        Action::Issue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Import => "import",
            Action::Issue => "issue",
        }
    }
}

/// Format a permission the way it is carried in access tokens
pub fn permission_key(resource: Resource, action: Action) -> String {
    format!("{}:{}", resource.as_str(), action.as_str())
}

const CRUD: &[Action] = &[Action::View, Action::Create, Action::Edit, Action::Delete];

/// Permissions granted to each role
pub fn permissions_for_role(role: UserRole) -> Vec<String> {
    let mut permissions = Vec::new();
    let mut grant = |resource: Resource, actions: &[Action]| {
        permissions.extend(actions.iter().map(|a| permission_key(resource, *a)));
    };

    match role {
        UserRole::Admin => {
            for resource in Resource::ALL {
                grant(resource, &Action::ALL);
            }
        }
        UserRole::Coordinator => {
            grant(Resource::Location, CRUD);
            grant(Resource::Coach, CRUD);
            grant(Resource::Course, CRUD);
            grant(Resource::Collaborator, CRUD);
            grant(Resource::Training, CRUD);
            grant(
                Resource::Certificate,
                &[Action::View, Action::Issue, Action::Edit, Action::Export],
            );
            grant(Resource::Inspection, &[Action::View]);
            grant(Resource::EppInspection, &[Action::View, Action::Export]);
            grant(
                Resource::Report,
                &[Action::View, Action::Create, Action::Edit, Action::Delete, Action::Export],
            );
        }
        UserRole::Inspector => {
            grant(Resource::Location, &[Action::View]);
            grant(Resource::Collaborator, &[Action::View]);
            grant(Resource::Inspection, CRUD);
            grant(
                Resource::EppInspection,
                &[Action::View, Action::Create, Action::Delete, Action::Import],
            );
            grant(Resource::Report, &[Action::View]);
        }
        UserRole::Viewer => {
            for resource in Resource::ALL {
                if resource != Resource::User {
                    grant(resource, &[Action::View]);
                }
            }
        }
    }

    permissions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_every_permission() {
        let perms = permissions_for_role(UserRole::Admin);
        assert_eq!(perms.len(), Resource::ALL.len() * Action::ALL.len());
        assert!(perms.contains(&"user:create".to_string()));
    }

    #[test]
    fn test_viewer_is_read_only() {
        let perms = permissions_for_role(UserRole::Viewer);
        assert!(perms.iter().all(|p| p.ends_with(":view")));
        assert!(!perms.contains(&"user:view".to_string()));
    }

    #[test]
    fn test_inspector_can_import_epp() {
        let perms = permissions_for_role(UserRole::Inspector);
        assert!(perms.contains(&"epp_inspection:import".to_string()));
        assert!(!perms.contains(&"certificate:issue".to_string()));
    }

    #[test]
    fn test_role_round_trip_names() {
        for role in UserRole::ALL {
            assert_eq!(UserRole::parse(role.as_str()), Ok(role));
        }
        assert!(UserRole::parse("owner").is_err());
    }
}
