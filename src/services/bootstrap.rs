use std::collections::HashSet;

use futures::future::try_join_all;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::auth::AuthProvider;
use crate::database::{EntityStore, Record};
use crate::entity::registry::{self, ROLES, ROLE_ACCESS, USERS};
use crate::entity::schema;
use crate::filter::{Filter, FilterWhere};
use crate::services::entity_service::ServiceError;
use crate::types::{Action, Operation};

pub const ADMIN_ROLE: &str = "Administrator";

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub role_id: String,
    pub role_created: bool,
    pub grants_added: usize,
    pub user: Record,
}

/// Create the first administrator.
///
/// The Administrator role is reused when present and topped up to every
/// (resource, action) grant. Fails if a user with that email exists.
pub async fn bootstrap_admin(
    store: &dyn EntityStore,
    auth: &dyn AuthProvider,
    request: &AdminBootstrap,
) -> Result<BootstrapOutcome, ServiceError> {
    let mut form = Map::new();
    form.insert("full_name".into(), json!(request.full_name));
    form.insert("email".into(), json!(request.email));
    form.insert("role_id".into(), json!("pending"));
    form.insert("password".into(), json!(request.password));
    form.insert("confirm_password".into(), json!(request.password));
    schema::validate(&USERS, &form, Operation::Create)?;

    if store.find_one(&USERS, FilterWhere::eq("email", request.email.as_str())).await?.is_some() {
        return Err(ServiceError::AlreadyExists(format!("User {}", request.email)));
    }

    let (role_id, role_created) = match store.find_one(&ROLES, FilterWhere::eq("name", ADMIN_ROLE)).await? {
        Some(role) => (role.id, false),
        None => {
            let mut values = Map::new();
            values.insert("name".into(), json!(ADMIN_ROLE));
            values.insert("description".into(), json!("Full access to every entity"));
            values.insert("active".into(), json!(true));
            let role = store.create(&ROLES, values).await?;
            info!("created role {} ({})", ADMIN_ROLE, role.id);
            (role.id, true)
        }
    };

    let grants_added = grant_everything(store, &role_id).await?;

    let account = auth.create_user(&request.email, &request.password).await?;
    let mut row = Map::new();
    row.insert("full_name".into(), json!(request.full_name));
    row.insert("email".into(), json!(request.email));
    row.insert("role_id".into(), json!(role_id));
    row.insert("is_active".into(), Value::Bool(true));
    row.insert("auth_id".into(), json!(account.id));

    let user = match store.create(&USERS, row).await {
        Ok(user) => user,
        Err(e) => {
            if let Err(cleanup) = auth.delete_user(&account.id).await {
                warn!("orphaned auth account {}: {}", account.id, cleanup);
            }
            return Err(e.into());
        }
    };
    info!("bootstrapped administrator {}", request.email);

    Ok(BootstrapOutcome { role_id, role_created, grants_added, user })
}

async fn grant_everything(store: &dyn EntityStore, role_id: &str) -> Result<usize, ServiceError> {
    let mut filter = Filter::new(ROLE_ACCESS.table)?;
    filter.where_clause(FilterWhere::eq("role_id", role_id));
    let existing: HashSet<(String, String)> = store
        .fetch_all(&ROLE_ACCESS, &filter)
        .await?
        .into_iter()
        .filter_map(|r| Some((r.str_field("resource")?.to_string(), r.str_field("action")?.to_uppercase())))
        .collect();

    let missing: Vec<Map<String, Value>> = registry::all()
        .iter()
        .flat_map(|entity| Action::ALL.into_iter().map(move |action| (entity.resource(), action)))
        .filter(|(resource, action)| !existing.contains(&(resource.to_string(), action.as_str().to_string())))
        .map(|(resource, action)| {
            let mut values = Map::new();
            values.insert("role_id".into(), json!(role_id));
            values.insert("resource".into(), json!(resource));
            values.insert("action".into(), json!(action.as_str()));
            values
        })
        .collect();

    let added = missing.len();
    try_join_all(missing.into_iter().map(|values| store.create(&ROLE_ACCESS, values))).await?;
    Ok(added)
}
