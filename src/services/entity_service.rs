// services/entity_service.rs - entity operations shared by the HTTP API and the CLI
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::{AuthError, AuthProvider};
use crate::config::AppConfig;
use crate::database::record::SYSTEM_FIELDS;
use crate::database::{EntityStore, Record, RecordPage, StoreError};
use crate::entity::schema::{self, ValidationErrors};
use crate::entity::{registry, EntityDef};
use crate::filter::{Filter, FilterClause, FilterError, FilterOrderInfo, FilterWhere, PageRequest, SortDirection};
use crate::permission::Actor;
use crate::types::{Action, Operation};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Not allowed to {action} {resource}")]
    Forbidden { resource: String, action: Action },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("'{field}' is not a toggle on {entity}")]
    NotToggle { entity: String, field: String },

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A multi-step operation stopped half way; nothing was rolled back
    #[error("{0}")]
    PartialFailure(String),
}

/// `{id, name}` pair for reference dropdowns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionItem {
    pub id: String,
    pub name: String,
}

#[derive(Clone)]
pub struct EntityService {
    store: Arc<dyn EntityStore>,
    auth: Arc<dyn AuthProvider>,
    max_page_size: i64,
    audit: bool,
}

impl EntityService {
    pub fn new(store: Arc<dyn EntityStore>, auth: Arc<dyn AuthProvider>, config: &AppConfig) -> Self {
        Self {
            store,
            auth,
            max_page_size: config.list.max_page_size,
            audit: config.security.enable_audit_logging,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn entity(&self, name: &str) -> Result<&'static EntityDef, ServiceError> {
        registry::lookup(name).ok_or_else(|| ServiceError::UnknownEntity(name.to_string()))
    }

    fn authorize(&self, actor: &Actor, entity: &EntityDef, action: Action) -> Result<(), ServiceError> {
        if actor.can(entity.resource(), action) {
            Ok(())
        } else {
            warn!("{} denied {} on {}", actor.email, action, entity.resource());
            Err(ServiceError::Forbidden { resource: entity.resource().to_string(), action })
        }
    }

    fn authorized(&self, actor: &Actor, name: &str, action: Action) -> Result<&'static EntityDef, ServiceError> {
        let entity = self.entity(name)?;
        self.authorize(actor, entity, action)?;
        Ok(entity)
    }

    fn audit(&self, actor: &Actor, operation: Operation, entity: &EntityDef, id: &str) {
        if self.audit {
            info!(target: "audit", actor = %actor.email, ?operation, entity = entity.table, id, "record changed");
        }
    }

    /// Entities the actor may read
    pub fn catalogue(&self, actor: &Actor) -> Vec<&'static EntityDef> {
        registry::all()
            .iter()
            .copied()
            .filter(|e| actor.can(e.resource(), Action::Read))
            .collect()
    }

    pub async fn list(&self, actor: &Actor, name: &str, request: &PageRequest) -> Result<RecordPage, ServiceError> {
        let entity = self.authorized(actor, name, Action::Read)?;
        let mut filter = request.to_filter(entity.table, entity.search_column, self.max_page_size)?;
        if let Some(spec) = request.filter.as_deref() {
            for clause in FilterClause::parse_all(spec)? {
                filter.where_clause(condition_for(entity, &clause)?);
            }
        }
        Ok(self.store.list(entity, &filter).await?)
    }

    /// Active rows as dropdown options, ordered by display name.
    ///
    /// `flag` picks which lifecycle flag means "active"; the entity's first
    /// toggle is used when absent. Entities without toggles list every row.
    pub async fn options(&self, actor: &Actor, name: &str, flag: Option<&str>) -> Result<Vec<OptionItem>, ServiceError> {
        let entity = self.authorized(actor, name, Action::Read)?;
        let flag = match flag {
            Some(f) if entity.is_toggle(f) => Some(f),
            Some(f) => {
                return Err(ServiceError::NotToggle { entity: entity.table.to_string(), field: f.to_string() })
            }
            None => entity.toggles.first().copied(),
        };

        let mut filter = Filter::new(entity.table)?;
        if let Some(flag) = flag {
            filter.where_clause(FilterWhere::eq(flag, true));
        }
        filter.order(vec![FilterOrderInfo::new(entity.search_column, SortDirection::Asc)]);

        let records = self.store.fetch_all(entity, &filter).await?;
        Ok(records
            .into_iter()
            .map(|r| OptionItem {
                name: r.str_field(entity.search_column).unwrap_or_default().to_string(),
                id: r.id,
            })
            .collect())
    }

    pub async fn get(&self, actor: &Actor, name: &str, id: &str) -> Result<Record, ServiceError> {
        let entity = self.authorized(actor, name, Action::Read)?;
        Ok(self.store.get_404(entity, id).await?)
    }

    pub async fn create(&self, actor: &Actor, name: &str, values: Map<String, Value>) -> Result<Record, ServiceError> {
        let entity = self.authorized(actor, name, Action::Create)?;
        let mut values = values;
        for (field, default) in schema::defaults(entity) {
            if schema::is_blank(values.get(&field)) {
                values.insert(field, default);
            }
        }
        schema::validate(entity, &values, Operation::Create)?;

        let record = if entity.table == registry::USERS.table {
            self.create_user(entity, values).await?
        } else {
            self.store.create(entity, persisted(entity, values)).await?
        };
        self.audit(actor, Operation::Create, entity, &record.id);
        Ok(record)
    }

    /// Auth account first, then the row pointing at it
    async fn create_user(&self, entity: &EntityDef, values: Map<String, Value>) -> Result<Record, ServiceError> {
        let email = values.get("email").and_then(Value::as_str).unwrap_or_default().to_string();
        let password = values.get("password").and_then(Value::as_str).unwrap_or_default().to_string();

        let account = self.auth.create_user(&email, &password).await?;
        let mut row = persisted(entity, values);
        row.insert("auth_id".to_string(), Value::String(account.id.clone()));

        match self.store.create(entity, row).await {
            Ok(record) => Ok(record),
            Err(e) => {
                if let Err(cleanup) = self.auth.delete_user(&account.id).await {
                    warn!("orphaned auth account {} after failed user insert: {}", account.id, cleanup);
                }
                Err(e.into())
            }
        }
    }

    pub async fn update(
        &self,
        actor: &Actor,
        name: &str,
        id: &str,
        changes: Map<String, Value>,
    ) -> Result<Record, ServiceError> {
        let entity = self.authorized(actor, name, Action::Update)?;
        schema::validate(entity, &changes, Operation::Update)?;

        let mut rejected = ValidationErrors::new();
        for field in entity.fields.iter().filter(|f| f.write_only) {
            if !schema::is_blank(changes.get(field.name)) {
                rejected.add(field.name, "Passwords are changed through the auth provider");
            }
        }
        rejected.into_result()?;

        // Resubmitting the stored value of a create-only field is a no-op
        let mut changes = changes;
        if entity.fields.iter().any(|f| f.create_only && changes.contains_key(f.name)) {
            let current = self.store.get_404(entity, id).await?;
            let mut rejected = ValidationErrors::new();
            for field in entity.fields.iter().filter(|f| f.create_only) {
                let unchanged = changes.get(field.name).map(|value| current.get(field.name) == Some(value));
                match unchanged {
                    Some(true) => {
                        changes.remove(field.name);
                    }
                    Some(false) => rejected.add(field.name, "This field cannot be changed after creation"),
                    None => {}
                }
            }
            rejected.into_result()?;
        }

        let changes = persisted(entity, changes);
        let record = if changes.is_empty() {
            self.store.get_404(entity, id).await?
        } else {
            self.store.update(entity, id, changes).await?
        };
        self.audit(actor, Operation::Update, entity, id);
        Ok(record)
    }

    /// Flip one lifecycle flag, leaving every other field alone
    pub async fn toggle(&self, actor: &Actor, name: &str, id: &str, field: &str) -> Result<Record, ServiceError> {
        let entity = self.authorized(actor, name, Operation::Toggle.required_action())?;
        if !entity.is_toggle(field) {
            return Err(ServiceError::NotToggle { entity: entity.table.to_string(), field: field.to_string() });
        }
        let current = self.store.get_404(entity, id).await?;
        let mut changes = Map::new();
        changes.insert(field.to_string(), Value::Bool(!current.flag(field).unwrap_or(false)));
        let record = self.store.update(entity, id, changes).await?;
        self.audit(actor, Operation::Toggle, entity, id);
        Ok(record)
    }

    pub async fn delete(&self, actor: &Actor, name: &str, id: &str) -> Result<(), ServiceError> {
        let entity = self.authorized(actor, name, Action::Delete)?;
        if entity.table == registry::USERS.table {
            self.delete_user(entity, id).await?;
        } else {
            self.store.delete(entity, id).await?;
        }
        self.audit(actor, Operation::Delete, entity, id);
        Ok(())
    }

    /// Row first, then the auth account; no rollback
    async fn delete_user(&self, entity: &EntityDef, id: &str) -> Result<(), ServiceError> {
        let record = self.store.get_404(entity, id).await?;
        self.store.delete(entity, id).await?;

        let Some(auth_id) = record.str_field("auth_id").filter(|s| !s.is_empty()) else {
            return Ok(());
        };
        match self.auth.delete_user(auth_id).await {
            Ok(()) | Err(AuthError::UserNotFound(_)) => Ok(()),
            Err(e) => {
                error!("user {} deleted but auth account {} was not: {}", id, auth_id, e);
                Err(ServiceError::PartialFailure(format!(
                    "User record deleted, but removing the login account failed: {}",
                    e
                )))
            }
        }
    }
}

/// Typed condition for one list-filter clause on a stored column
fn condition_for(entity: &EntityDef, clause: &FilterClause) -> Result<FilterWhere, FilterError> {
    if SYSTEM_FIELDS.contains(&clause.column.as_str()) {
        return clause.to_where(|raw| Ok(Value::String(raw.to_string())));
    }
    let field = entity
        .field(&clause.column)
        .filter(|f| !f.write_only)
        .ok_or_else(|| FilterError::InvalidColumn(format!("{} has no column {}", entity.table, clause.column)))?;
    clause.to_where(|raw| field.parse_input(raw).map_err(FilterError::InvalidOperatorData))
}

/// Drop write-only fields before anything reaches the store
fn persisted(entity: &EntityDef, values: Map<String, Value>) -> Map<String, Value> {
    values
        .into_iter()
        .filter(|(k, _)| entity.field(k).map_or(false, |f| !f.write_only))
        .collect()
}
