// entity/registry.rs - the catalogue of managed entities
//
// Table name doubles as the permission resource name.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Url,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    Bool,
    Integer,
    /// Id of a row in another table
    Reference(&'static str),
    Choice(&'static [&'static str]),
    /// Write-only secret, never persisted
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Optional,
    Required,
    /// Required when creating, optional when editing
    OnCreate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldDefault {
    None,
    Bool(bool),
    Text(&'static str),
}

impl FieldDefault {
    pub fn to_value(self) -> Option<Value> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Bool(b) => Some(Value::Bool(b)),
            FieldDefault::Text(s) => Some(Value::String(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub requirement: Requirement,
    pub default: FieldDefault,
    pub write_only: bool,
    /// Filled in by the service, never accepted from a form
    pub read_only: bool,
    /// Settable on create; later changes go through another system
    pub create_only: bool,
    pub min_len: Option<usize>,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            requirement: Requirement::Optional,
            default: FieldDefault::None,
            write_only: matches!(kind, FieldKind::Password),
            read_only: false,
            create_only: false,
            min_len: None,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Lifecycle flag defaulting to true
    pub const fn flag(name: &'static str) -> Self {
        Self::new(name, FieldKind::Bool).default_to(FieldDefault::Bool(true))
    }

    pub const fn reference(name: &'static str, target: &'static str) -> Self {
        Self::new(name, FieldKind::Reference(target))
    }

    pub const fn required(mut self) -> Self {
        self.requirement = Requirement::Required;
        self
    }

    pub const fn required_on_create(mut self) -> Self {
        self.requirement = Requirement::OnCreate;
        self
    }

    pub const fn default_to(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    pub const fn min_len(mut self, len: usize) -> Self {
        self.min_len = Some(len);
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub const fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }

    /// Parse a command-line `key=value` right-hand side into this field's JSON type
    pub fn parse_input(&self, raw: &str) -> Result<Value, String> {
        if raw == "null" {
            return Ok(Value::Null);
        }
        match self.kind {
            FieldKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("{} expects true or false", self.name)),
            },
            FieldKind::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("{} expects an integer", self.name)),
            _ => Ok(Value::String(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CrossFieldRule {
    MustMatch {
        field: &'static str,
        confirm: &'static str,
        message: &'static str,
    },
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct EntityDef {
    pub table: &'static str,
    pub label: &'static str,
    /// Column matched by the list search box
    pub search_column: &'static str,
    pub fields: &'static [FieldDef],
    /// Boolean lifecycle flags; the first one gates dropdown options
    pub toggles: &'static [&'static str],
    pub rules: &'static [CrossFieldRule],
}

impl EntityDef {
    /// Permission resource guarding this entity
    pub fn resource(&self) -> &'static str {
        self.table
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Columns stored in the backend (write-only fields excluded)
    pub fn persisted_fields(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().filter(|f| !f.write_only).map(|f| f.name)
    }

    pub fn is_toggle(&self, field: &str) -> bool {
        self.toggles.contains(&field)
    }
}

pub static ACADEMIC_YEARS: EntityDef = EntityDef {
    table: "academic_years",
    label: "Academic year",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::new("start_date", FieldKind::Date),
        FieldDef::new("end_date", FieldKind::Date),
        FieldDef::flag("active"),
    ],
    toggles: &["active"],
    rules: &[],
};

pub static SEMESTERS: EntityDef = EntityDef {
    table: "semesters",
    label: "Semester",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::reference("academic_year_id", "academic_years"),
        FieldDef::flag("active"),
    ],
    toggles: &["active"],
    rules: &[],
};

pub static COUNTRIES: EntityDef = EntityDef {
    table: "countries",
    label: "Country",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::text("country_code").required(),
        FieldDef::flag("active_on_nationalities"),
        FieldDef::flag("active_on_university"),
    ],
    toggles: &["active_on_nationalities", "active_on_university"],
    rules: &[],
};

pub static CITIES: EntityDef = EntityDef {
    table: "cities",
    label: "City",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::reference("country_id", "countries").required(),
        FieldDef::flag("active"),
    ],
    toggles: &["active"],
    rules: &[],
};

pub static FACULTIES: EntityDef = EntityDef {
    table: "faculties",
    label: "Faculty",
    search_column: "name",
    fields: &[FieldDef::text("name").required(), FieldDef::flag("active")],
    toggles: &["active"],
    rules: &[],
};

pub static SPECIALITIES: EntityDef = EntityDef {
    table: "specialities",
    label: "Speciality",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::reference("faculty_id", "faculties").required(),
        FieldDef::flag("active"),
    ],
    toggles: &["active"],
    rules: &[],
};

pub static LANGUAGES: EntityDef = EntityDef {
    table: "languages",
    label: "Language",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::text("code"),
        FieldDef::flag("active"),
    ],
    toggles: &["active"],
    rules: &[],
};

pub static DEGREES: EntityDef = EntityDef {
    table: "degrees",
    label: "Degree",
    search_column: "name",
    fields: &[FieldDef::text("name").required(), FieldDef::flag("active")],
    toggles: &["active"],
    rules: &[],
};

pub static UNIVERSITIES: EntityDef = EntityDef {
    table: "universities",
    label: "University",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::reference("country_id", "countries").required(),
        FieldDef::reference("city_id", "cities"),
        FieldDef::new("website", FieldKind::Url),
        FieldDef::new("email", FieldKind::Email),
        FieldDef::flag("active"),
    ],
    toggles: &["active"],
    rules: &[],
};

pub static STUDENTS: EntityDef = EntityDef {
    table: "students",
    label: "Student",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::new("email", FieldKind::Email),
        FieldDef::text("phone"),
        FieldDef::reference("nationality_id", "countries"),
        FieldDef::text("passport_number"),
        FieldDef::new("birth_date", FieldKind::Date),
        FieldDef::flag("active"),
    ],
    toggles: &["active"],
    rules: &[],
};

pub const APPLICATION_STATUSES: &[&str] = &["pending", "submitted", "accepted", "rejected", "withdrawn"];

pub static APPLICATIONS: EntityDef = EntityDef {
    table: "applications",
    label: "Application",
    search_column: "application_number",
    fields: &[
        FieldDef::text("application_number").required(),
        FieldDef::reference("student_id", "students").required(),
        FieldDef::reference("university_id", "universities").required(),
        FieldDef::reference("speciality_id", "specialities"),
        FieldDef::reference("degree_id", "degrees"),
        FieldDef::reference("semester_id", "semesters"),
        FieldDef::new("status", FieldKind::Choice(APPLICATION_STATUSES))
            .required()
            .default_to(FieldDefault::Text("pending")),
        FieldDef::text("notes"),
    ],
    toggles: &[],
    rules: &[],
};

pub static USERS: EntityDef = EntityDef {
    table: "users",
    label: "User",
    search_column: "full_name",
    fields: &[
        FieldDef::text("full_name").required(),
        FieldDef::new("email", FieldKind::Email).required().create_only(),
        FieldDef::reference("role_id", "roles").required(),
        FieldDef::flag("is_active"),
        FieldDef::text("auth_id").read_only(),
        FieldDef::new("password", FieldKind::Password).required_on_create().min_len(8),
        FieldDef::new("confirm_password", FieldKind::Password).required_on_create(),
    ],
    toggles: &["is_active"],
    rules: &[CrossFieldRule::MustMatch {
        field: "password",
        confirm: "confirm_password",
        message: "Passwords must match",
    }],
};

pub static ROLES: EntityDef = EntityDef {
    table: "roles",
    label: "Role",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::text("description"),
        FieldDef::flag("active"),
    ],
    toggles: &["active"],
    rules: &[],
};

pub const ACTIONS: &[&str] = &["CREATE", "READ", "UPDATE", "DELETE"];

pub static ROLE_ACCESS: EntityDef = EntityDef {
    table: "role_access",
    label: "Role permission",
    search_column: "resource",
    fields: &[
        FieldDef::reference("role_id", "roles").required(),
        FieldDef::text("resource").required(),
        FieldDef::new("action", FieldKind::Choice(ACTIONS)).required(),
    ],
    toggles: &[],
    rules: &[],
};

pub static SETTINGS: EntityDef = EntityDef {
    table: "settings",
    label: "Setting",
    search_column: "name",
    fields: &[FieldDef::text("name").required(), FieldDef::text("value")],
    toggles: &[],
    rules: &[],
};

pub const ATTACHMENT_CATEGORIES: &[&str] = &["passport", "transcript", "diploma", "photo", "cv", "other"];

pub static ATTACHMENTS: EntityDef = EntityDef {
    table: "attachments",
    label: "Attachment",
    search_column: "name",
    fields: &[
        FieldDef::text("name").required(),
        FieldDef::text("record_id").required(),
        FieldDef::new("category", FieldKind::Choice(ATTACHMENT_CATEGORIES)).required(),
        FieldDef::new("file_url", FieldKind::Url),
    ],
    toggles: &[],
    rules: &[],
};

pub static ENTITIES: &[&EntityDef] = &[
    &ACADEMIC_YEARS,
    &SEMESTERS,
    &COUNTRIES,
    &CITIES,
    &FACULTIES,
    &SPECIALITIES,
    &LANGUAGES,
    &DEGREES,
    &UNIVERSITIES,
    &STUDENTS,
    &APPLICATIONS,
    &USERS,
    &ROLES,
    &ROLE_ACCESS,
    &SETTINGS,
    &ATTACHMENTS,
];

pub fn lookup(table: &str) -> Option<&'static EntityDef> {
    ENTITIES.iter().copied().find(|e| e.table == table)
}

pub fn all() -> &'static [&'static EntityDef] {
    ENTITIES
}
