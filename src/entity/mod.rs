pub mod registry;
pub mod schema;

pub use registry::{CrossFieldRule, EntityDef, FieldDef, FieldDefault, FieldKind, Requirement};
pub use schema::ValidationErrors;
