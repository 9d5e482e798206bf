pub mod client;
pub mod documents;

pub use client::{GraphqlClient, GraphqlError};
pub use documents::CollectionDocuments;
