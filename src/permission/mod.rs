// permission - role grants and the access gate
//
// Allow-list only: a missing actor, role or grant is a denial.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Action;

/// Name of a protected resource (an entity table name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(String);

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Resource(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Resource {
    fn from(name: &str) -> Self {
        Resource::new(name)
    }
}

/// One `role_access` row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grant {
    pub resource: Resource,
    pub action: Action,
}

impl Grant {
    pub fn new(resource: impl Into<Resource>, action: Action) -> Self {
        Self { resource: resource.into(), action }
    }
}

/// Flattened grants of one role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    grants: HashSet<(Resource, Action)>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&mut self, resource: impl Into<Resource>, action: Action) {
        self.grants.insert((resource.into(), action));
    }

    pub fn allows(&self, resource: &str, action: Action) -> bool {
        self.grants.contains(&(Resource::new(resource), action))
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Grants sorted by resource then action
    pub fn grants(&self) -> Vec<Grant> {
        let mut out: Vec<Grant> = self
            .grants
            .iter()
            .map(|(resource, action)| Grant { resource: resource.clone(), action: *action })
            .collect();
        out.sort();
        out
    }
}

impl FromIterator<Grant> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Grant>>(iter: I) -> Self {
        let mut set = PermissionSet::new();
        for grant in iter {
            set.allow(grant.resource, grant.action);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleProfile {
    pub id: String,
    pub name: String,
    pub permissions: PermissionSet,
}

/// The signed-in user, loaded once per request from the `users` row
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub user_id: String,
    pub auth_id: String,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub role: Option<RoleProfile>,
}

impl Actor {
    pub fn can(&self, resource: &str, action: Action) -> bool {
        has_permission(Some(self), resource, action)
    }

    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().map(|r| r.name.as_str())
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            id: self.user_id.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role_name().map(str::to_string),
            grants: self.role.as_ref().map(|r| r.permissions.grants()).unwrap_or_default(),
        }
    }
}

pub fn has_permission(actor: Option<&Actor>, resource: &str, action: Action) -> bool {
    actor
        .and_then(|a| a.role.as_ref())
        .map_or(false, |role| role.permissions.allows(resource, action))
}

/// Client-visible profile, stored in the `user_profile` cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Option<String>,
    #[serde(default)]
    pub grants: Vec<Grant>,
}
