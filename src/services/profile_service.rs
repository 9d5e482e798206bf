use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::database::{EntityStore, Record, StoreError};
use crate::entity::registry::{self, ROLES, ROLE_ACCESS, SETTINGS, USERS};
use crate::filter::{Filter, FilterWhere};
use crate::permission::{Actor, PermissionSet, RoleProfile};
use crate::session::AppSession;
use crate::types::Action;

/// Load the user behind an auth account together with their role's grants.
///
/// `None` when no `users` row points at `auth_id`. An inactive or missing
/// role leaves the actor without a role, which denies everything.
pub async fn load_actor(store: &dyn EntityStore, auth_id: &str) -> Result<Option<Actor>, StoreError> {
    let Some(user) = store.find_one(&USERS, FilterWhere::eq("auth_id", auth_id)).await? else {
        return Ok(None);
    };
    let role = match user.str_field("role_id") {
        Some(role_id) => load_role(store, role_id).await?,
        None => None,
    };
    Ok(Some(actor_from_row(&user, auth_id, role)))
}

fn actor_from_row(user: &Record, auth_id: &str, role: Option<RoleProfile>) -> Actor {
    Actor {
        user_id: user.id.clone(),
        auth_id: auth_id.to_string(),
        email: user.str_field("email").unwrap_or_default().to_string(),
        full_name: user.str_field("full_name").unwrap_or_default().to_string(),
        is_active: user.flag("is_active").unwrap_or(false),
        role,
    }
}

async fn load_role(store: &dyn EntityStore, role_id: &str) -> Result<Option<RoleProfile>, StoreError> {
    let Some(role) = store.get(&ROLES, role_id).await? else {
        warn!("user references missing role {}", role_id);
        return Ok(None);
    };
    if role.flag("active") == Some(false) {
        debug!("role {} is inactive", role_id);
        return Ok(None);
    }

    let mut filter = Filter::new(ROLE_ACCESS.table)?;
    filter.where_clause(FilterWhere::eq("role_id", role_id));
    let mut permissions = PermissionSet::new();
    for row in store.fetch_all(&ROLE_ACCESS, &filter).await? {
        let resource = row.str_field("resource");
        let action = row.str_field("action").map(str::parse::<Action>);
        match (resource, action) {
            (Some(resource), Some(Ok(action))) => permissions.allow(resource, action),
            _ => warn!("skipping malformed role_access row {}", row.id),
        }
    }

    Ok(Some(RoleProfile {
        id: role.id.clone(),
        name: role.str_field("name").unwrap_or_default().to_string(),
        permissions,
    }))
}

/// Application settings as name -> value
pub async fn load_settings(store: &dyn EntityStore) -> Result<BTreeMap<String, String>, StoreError> {
    let filter = Filter::new(SETTINGS.table)?;
    let rows = store.fetch_all(&SETTINGS, &filter).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let name = row.str_field("name")?.to_string();
            let value = match row.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Some((name, value))
        })
        .collect())
}

pub async fn load_session(store: &dyn EntityStore, actor: &Actor) -> Result<AppSession, StoreError> {
    Ok(AppSession {
        profile: actor.snapshot(),
        settings: load_settings(store).await?,
    })
}

/// Operator identity for the command line: every grant on every entity
pub fn system_actor() -> Actor {
    let mut permissions = PermissionSet::new();
    for entity in registry::all() {
        for action in Action::ALL {
            permissions.allow(entity.resource(), action);
        }
    }
    Actor {
        user_id: "system".to_string(),
        auth_id: String::new(),
        email: "system".to_string(),
        full_name: "System".to_string(),
        is_active: true,
        role: Some(RoleProfile {
            id: "system".to_string(),
            name: "System".to_string(),
            permissions,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::{json, Map};

    fn values(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    async fn seed_role(store: &MemoryStore, active: bool, grants: &[(&str, &str)]) -> String {
        let role = store
            .create(&ROLES, values(json!({ "name": "Admissions", "active": active })))
            .await
            .unwrap();
        for (resource, action) in grants {
            store
                .create(
                    &ROLE_ACCESS,
                    values(json!({ "role_id": role.id, "resource": resource, "action": action })),
                )
                .await
                .unwrap();
        }
        role.id
    }

    async fn seed_user(store: &MemoryStore, role_id: &str) {
        store
            .create(
                &USERS,
                values(json!({
                    "full_name": "Staff Member",
                    "email": "staff@example.com",
                    "role_id": role_id,
                    "is_active": true,
                    "auth_id": "auth-1"
                })),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn actor_gets_role_grants() {
        let store = MemoryStore::new();
        let role_id = seed_role(&store, true, &[("students", "CREATE"), ("students", "read"), ("x", "PUBLISH")]).await;
        seed_user(&store, &role_id).await;

        let actor = load_actor(&store, "auth-1").await.unwrap().unwrap();
        assert_eq!(actor.full_name, "Staff Member");
        assert!(actor.is_active);
        assert!(actor.can("students", Action::Create));
        assert!(actor.can("students", Action::Read));
        assert!(!actor.can("students", Action::Delete));
        assert_eq!(actor.role.unwrap().permissions.len(), 2);
    }

    #[tokio::test]
    async fn inactive_role_grants_nothing() {
        let store = MemoryStore::new();
        let role_id = seed_role(&store, false, &[("students", "READ")]).await;
        seed_user(&store, &role_id).await;

        let actor = load_actor(&store, "auth-1").await.unwrap().unwrap();
        assert!(actor.role.is_none());
        assert!(!actor.can("students", Action::Read));
    }

    #[tokio::test]
    async fn unknown_auth_id_has_no_actor() {
        let store = MemoryStore::new();
        assert!(load_actor(&store, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settings_flatten_to_strings() {
        let store = MemoryStore::new();
        store.create(&SETTINGS, values(json!({ "name": "agency_name", "value": "Globe" }))).await.unwrap();
        store.create(&SETTINGS, values(json!({ "name": "empty" }))).await.unwrap();
        let settings = load_settings(&store).await.unwrap();
        assert_eq!(settings.get("agency_name").map(String::as_str), Some("Globe"));
        assert_eq!(settings.get("empty").map(String::as_str), Some(""));
    }

    #[test]
    fn system_actor_can_do_everything() {
        let actor = system_actor();
        for entity in registry::all() {
            for action in Action::ALL {
                assert!(actor.can(entity.table, action));
            }
        }
    }
}
