// entity/schema.rs - form validation for entity input
//
// Every failing field is reported, not just the first one.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::record::SYSTEM_FIELDS;
use crate::entity::registry::{CrossFieldRule, EntityDef, FieldDef, FieldKind, Requirement};
use crate::types::Operation;

/// Field name -> message, ordered so responses are stable
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("Validation failed: {}", summary(.0))]
pub struct ValidationErrors(pub BTreeMap<String, String>);

fn summary(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, msg)| format!("{}: {}", field, msg))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Keeps the first message recorded for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Initial form values for a new record
pub fn defaults(entity: &EntityDef) -> Map<String, Value> {
    entity
        .fields
        .iter()
        .filter_map(|f| f.default.to_value().map(|v| (f.name.to_string(), v)))
        .collect()
}

/// Missing, null and blank strings all count as "not provided"
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Check form values against the entity's field rules.
///
/// On `Update` only the fields present in `values` are checked, except that
/// a present-but-blank required field is still an error.
pub fn validate(entity: &EntityDef, values: &Map<String, Value>, operation: Operation) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let creating = operation == Operation::Create;

    for key in values.keys() {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            errors.add(key.as_str(), "This field is assigned by the system");
        } else {
            match entity.field(key) {
                None => errors.add(key.as_str(), "Unknown field"),
                Some(field) if field.read_only => errors.add(key.as_str(), "This field is assigned by the system"),
                Some(_) => {}
            }
        }
    }

    for field in entity.fields {
        let value = values.get(field.name);
        let required = match field.requirement {
            Requirement::Required => creating || value.is_some(),
            Requirement::OnCreate => creating,
            Requirement::Optional => false,
        };
        if is_blank(value) {
            if required {
                errors.add(field.name, "This field is required");
            }
            continue;
        }
        if let Some(value) = value {
            if let Err(message) = check_value(field, value) {
                errors.add(field.name, message);
            }
        }
    }

    for rule in entity.rules {
        match rule {
            CrossFieldRule::MustMatch { field, confirm, message } => {
                let a = values.get(*field).filter(|v| !is_blank(Some(v)));
                let b = values.get(*confirm).filter(|v| !is_blank(Some(v)));
                if (a.is_some() || b.is_some()) && a != b {
                    errors.add(*confirm, *message);
                }
            }
        }
    }

    errors.into_result()
}

fn check_value(field: &FieldDef, value: &Value) -> Result<(), String> {
    match field.kind {
        FieldKind::Bool => value.as_bool().map(|_| ()).ok_or_else(|| "Must be true or false".to_string()),
        FieldKind::Integer => value.as_i64().map(|_| ()).ok_or_else(|| "Must be a whole number".to_string()),
        FieldKind::Reference(_) => match value {
            Value::String(_) | Value::Number(_) => Ok(()),
            _ => Err("Must be a record id".to_string()),
        },
        FieldKind::Text | FieldKind::Password => {
            let text = value.as_str().ok_or_else(|| "Must be text".to_string())?;
            match field.min_len {
                Some(min) if text.chars().count() < min => Err(format!("Must be at least {} characters", min)),
                _ => Ok(()),
            }
        }
        FieldKind::Email => {
            let text = value.as_str().ok_or_else(|| "Must be text".to_string())?;
            if is_email(text) {
                Ok(())
            } else {
                Err("Must be a valid email address".to_string())
            }
        }
        FieldKind::Url => {
            let text = value.as_str().ok_or_else(|| "Must be text".to_string())?;
            url::Url::parse(text)
                .map(|_| ())
                .map_err(|_| "Must be a valid URL".to_string())
        }
        FieldKind::Date => {
            let text = value.as_str().ok_or_else(|| "Must be text".to_string())?;
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|_| ())
                .map_err(|_| "Must be a date (YYYY-MM-DD)".to_string())
        }
        FieldKind::Choice(choices) => {
            let text = value.as_str().ok_or_else(|| "Must be text".to_string())?;
            if choices.contains(&text) {
                Ok(())
            } else {
                Err(format!("Must be one of: {}", choices.join(", ")))
            }
        }
    }
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.trim().split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::registry::{APPLICATIONS, COUNTRIES, USERS};
    use serde_json::json;

    fn values(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn country_defaults_enable_both_flags() {
        let d = defaults(&COUNTRIES);
        assert_eq!(d.get("active_on_nationalities"), Some(&json!(true)));
        assert_eq!(d.get("active_on_university"), Some(&json!(true)));
        assert!(d.get("name").is_none());
    }

    #[test]
    fn create_reports_every_missing_field() {
        let err = validate(&COUNTRIES, &Map::new(), Operation::Create).unwrap_err();
        assert_eq!(err.get("name"), Some("This field is required"));
        assert_eq!(err.get("country_code"), Some("This field is required"));
    }

    #[test]
    fn blank_string_counts_as_missing() {
        let err = validate(&COUNTRIES, &values(json!({ "name": "  ", "country_code": "TL" })), Operation::Create)
            .unwrap_err();
        assert!(err.get("name").is_some());
        assert!(err.get("country_code").is_none());
    }

    #[test]
    fn update_checks_only_present_fields() {
        assert!(validate(&COUNTRIES, &values(json!({ "country_code": "TX" })), Operation::Update).is_ok());
        assert!(validate(&COUNTRIES, &values(json!({ "name": "" })), Operation::Update).is_err());
    }

    #[test]
    fn unknown_and_system_fields_rejected() {
        let err = validate(
            &COUNTRIES,
            &values(json!({ "name": "X", "country_code": "X", "id": "1", "bogus": 1 })),
            Operation::Create,
        )
        .unwrap_err();
        assert!(err.get("id").is_some());
        assert_eq!(err.get("bogus"), Some("Unknown field"));
    }

    #[test]
    fn user_password_rules() {
        let base = json!({ "full_name": "Ada", "email": "ada@example.com", "role_id": "r1" });

        let err = validate(&USERS, &values(base.clone()), Operation::Create).unwrap_err();
        assert!(err.get("password").is_some());

        let mut short = base.clone();
        short["password"] = json!("short");
        short["confirm_password"] = json!("short");
        let err = validate(&USERS, &values(short), Operation::Create).unwrap_err();
        assert_eq!(err.get("password"), Some("Must be at least 8 characters"));

        let mut mismatch = base.clone();
        mismatch["password"] = json!("long-enough-1");
        mismatch["confirm_password"] = json!("long-enough-2");
        let err = validate(&USERS, &values(mismatch), Operation::Create).unwrap_err();
        assert_eq!(err.get("confirm_password"), Some("Passwords must match"));

        let mut ok = base;
        ok["password"] = json!("long-enough-1");
        ok["confirm_password"] = json!("long-enough-1");
        assert!(validate(&USERS, &values(ok), Operation::Create).is_ok());
    }

    #[test]
    fn auth_link_cannot_be_written() {
        let err = validate(&USERS, &values(json!({ "auth_id": "someone-else" })), Operation::Update).unwrap_err();
        assert_eq!(err.get("auth_id"), Some("This field is assigned by the system"));

        let create = json!({
            "full_name": "Ada",
            "email": "ada@example.com",
            "role_id": "r1",
            "password": "secret-pass",
            "confirm_password": "secret-pass",
            "auth_id": "forged",
        });
        let err = validate(&USERS, &values(create), Operation::Create).unwrap_err();
        assert_eq!(err.get("auth_id"), Some("This field is assigned by the system"));
    }

    #[test]
    fn user_edit_without_password_is_fine() {
        assert!(validate(&USERS, &values(json!({ "full_name": "Ada L" })), Operation::Update).is_ok());
    }

    #[test]
    fn typed_fields_are_checked() {
        let err = validate(&USERS, &values(json!({ "email": "not-an-email" })), Operation::Update).unwrap_err();
        assert!(err.get("email").is_some());

        let err = validate(&APPLICATIONS, &values(json!({ "status": "lost" })), Operation::Update).unwrap_err();
        assert!(err.get("status").unwrap().starts_with("Must be one of"));

        let err = validate(&COUNTRIES, &values(json!({ "active_on_university": "yes" })), Operation::Update)
            .unwrap_err();
        assert_eq!(err.get("active_on_university"), Some("Must be true or false"));
    }
}
