use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::controller::list::RefreshHandle;
use crate::database::Record;
use crate::entity::schema::{self, is_blank, ValidationErrors};
use crate::entity::{EntityDef, Requirement};
use crate::permission::Actor;
use crate::services::{EntityService, ServiceError};
use crate::types::Operation;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("{0}")]
    Backend(String),

    #[error("editor is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Create,
    Edit { id: String, original: Map<String, Value> },
}

/// Form state for creating or editing one record
#[derive(Debug, Clone)]
pub struct RecordEditor {
    entity: &'static EntityDef,
    mode: Mode,
    values: Map<String, Value>,
    open: bool,
    on_saved: Option<RefreshHandle>,
}

impl RecordEditor {
    pub fn create(entity: &'static EntityDef) -> Self {
        Self {
            entity,
            mode: Mode::Create,
            values: schema::defaults(entity),
            open: true,
            on_saved: None,
        }
    }

    pub fn edit(entity: &'static EntityDef, record: &Record) -> Self {
        let original: Map<String, Value> = record
            .fields
            .iter()
            .filter(|(k, _)| entity.field(k).map_or(false, |f| !f.read_only))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            entity,
            mode: Mode::Edit { id: record.id.clone(), original: original.clone() },
            values: original,
            open: true,
            on_saved: None,
        }
    }

    /// Parent list to refresh after a successful save
    pub fn with_refresh(mut self, handle: RefreshHandle) -> Self {
        self.on_saved = Some(handle);
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_create(&self) -> bool {
        self.mode == Mode::Create
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn set(&mut self, field: &str, value: Value) -> Result<(), EditorError> {
        if self.entity.field(field).is_none() {
            return Err(EditorError::UnknownField {
                entity: self.entity.table.to_string(),
                field: field.to_string(),
            });
        }
        self.values.insert(field.to_string(), value);
        Ok(())
    }

    pub fn set_all(&mut self, values: Map<String, Value>) -> Result<(), EditorError> {
        for (field, value) in values {
            self.set(&field, value)?;
        }
        Ok(())
    }

    fn operation(&self) -> Operation {
        match self.mode {
            Mode::Create => Operation::Create,
            Mode::Edit { .. } => Operation::Update,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        schema::validate(self.entity, &self.payload(), self.operation())
    }

    /// What would be sent: non-blank values on create, changed fields on edit
    pub fn payload(&self) -> Map<String, Value> {
        match &self.mode {
            Mode::Create => self
                .values
                .iter()
                .filter(|(k, v)| {
                    let optional = self.entity.field(k).map_or(true, |f| f.requirement == Requirement::Optional);
                    !(optional && is_blank(Some(v)))
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Mode::Edit { original, .. } => self
                .values
                .iter()
                .filter(|(k, v)| original.get(k.as_str()) != Some(*v))
                .filter(|(k, v)| {
                    // untouched write-only fields stay out of the payload
                    let write_only = self.entity.field(k).map_or(false, |f| f.write_only);
                    !(write_only && is_blank(Some(v)))
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Validate, save, close and refresh the parent list
    pub async fn submit(&mut self, service: &EntityService, actor: &Actor) -> Result<Record, EditorError> {
        if !self.open {
            return Err(EditorError::Closed);
        }
        self.validate()?;
        let payload = self.payload();
        let saved = match &self.mode {
            Mode::Create => service.create(actor, self.entity.table, payload).await,
            Mode::Edit { id, .. } => service.update(actor, self.entity.table, id, payload).await,
        }
        .map_err(|e| match e {
            ServiceError::Validation(errors) => EditorError::Invalid(errors),
            other => EditorError::Backend(other.to_string()),
        })?;

        debug!("editor: saved {} {}", self.entity.table, saved.id);
        self.open = false;
        if let Some(handle) = &self.on_saved {
            handle.refresh().await;
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryAuthProvider;
    use crate::config::AppConfig;
    use crate::controller::list::{ListController, ListState};
    use crate::database::{EntityStore, MemoryStore};
    use crate::entity::registry::{COUNTRIES, USERS};
    use crate::services::profile_service::system_actor;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> (EntityService, Arc<MemoryStore>) {
        let config = AppConfig::development();
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(MemoryAuthProvider::new(config.auth.clone()));
        (EntityService::new(store.clone(), auth, &config), store)
    }

    #[test]
    fn create_starts_from_defaults() {
        let editor = RecordEditor::create(&COUNTRIES);
        assert_eq!(editor.values().get("active_on_university"), Some(&json!(true)));
        assert!(editor.is_create());
    }

    #[test]
    fn unknown_field_rejected() {
        let mut editor = RecordEditor::create(&COUNTRIES);
        assert!(matches!(
            editor.set("capital", json!("x")),
            Err(EditorError::UnknownField { .. })
        ));
    }

    #[test]
    fn edit_payload_holds_only_changes() {
        let record = Record::from_value(json!({
            "id": "c1",
            "name": "Testland",
            "country_code": "TL",
            "active_on_nationalities": true,
            "active_on_university": true
        }))
        .unwrap();
        let mut editor = RecordEditor::edit(&COUNTRIES, &record);
        assert!(editor.payload().is_empty());
        editor.set("active_on_university", json!(false)).unwrap();
        editor.set("name", json!("Testland")).unwrap();
        let payload = editor.payload();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get("active_on_university"), Some(&json!(false)));
    }

    #[test]
    fn edit_leaves_auth_link_out_of_the_form() {
        let record = Record::from_value(json!({
            "id": "u1",
            "full_name": "Ada",
            "email": "ada@example.com",
            "role_id": "r1",
            "is_active": true,
            "auth_id": "auth-1"
        }))
        .unwrap();
        let mut editor = RecordEditor::edit(&USERS, &record);
        assert!(editor.values().get("auth_id").is_none());
        assert_eq!(editor.values().get("full_name"), Some(&json!("Ada")));

        editor.set("auth_id", json!("auth-2")).unwrap();
        let errors = editor.validate().unwrap_err();
        assert_eq!(errors.get("auth_id"), Some("This field is assigned by the system"));
    }

    #[test]
    fn mismatched_passwords_block_submission() {
        let mut editor = RecordEditor::create(&USERS);
        editor
            .set_all(
                json!({
                    "full_name": "Ada",
                    "email": "ada@example.com",
                    "role_id": "r1",
                    "password": "long-enough-1",
                    "confirm_password": "long-enough-2"
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
            .unwrap();
        let errors = editor.validate().unwrap_err();
        assert_eq!(errors.get("confirm_password"), Some("Passwords must match"));
    }

    #[tokio::test]
    async fn submit_closes_and_refreshes_parent() {
        let (service, store) = service();
        let actor = system_actor();
        let list = ListController::new(store.clone(), &COUNTRIES, 10, 100);
        list.mount().await;

        let mut editor = RecordEditor::create(&COUNTRIES).with_refresh(list.refresh_handle());
        editor.set("name", json!("Testland")).unwrap();
        editor.set("country_code", json!("TL")).unwrap();
        let saved = editor.submit(&service, &actor).await.unwrap();

        assert!(!editor.is_open());
        assert_eq!(saved.flag("active_on_nationalities"), Some(true));
        match list.state() {
            ListState::Loaded { total_count, .. } => assert_eq!(total_count, 1),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(editor.submit(&service, &actor).await, Err(EditorError::Closed)));

        let stored = store.get(&COUNTRIES, &saved.id).await.unwrap().unwrap();
        assert_eq!(stored.str_field("country_code"), Some("TL"));
    }

    #[tokio::test]
    async fn invalid_submit_stays_open() {
        let (service, _) = service();
        let mut editor = RecordEditor::create(&COUNTRIES);
        let err = editor.submit(&service, &system_actor()).await.unwrap_err();
        assert!(matches!(err, EditorError::Invalid(_)));
        assert!(editor.is_open());
    }
}
