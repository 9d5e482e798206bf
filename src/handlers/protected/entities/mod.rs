// handlers/protected/entities/mod.rs - Generic entity routes
//
// One set of handlers serves every table in the registry; the `:entity`
// path segment picks the definition and the permission resource.

pub mod collection;
pub mod record;

pub use collection::{catalogue_get, collection_get, collection_post, options_get};
pub use record::{record_delete, record_get, record_put, toggle_patch};
