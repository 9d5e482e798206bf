pub mod graphql;
pub mod memory;
pub mod record;
pub mod repository;

pub use graphql::GraphqlStore;
pub use memory::MemoryStore;
pub use record::{Record, RecordError, RecordPage};
pub use repository::{EntityStore, StoreError};
