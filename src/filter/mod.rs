pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod page;
pub mod error;

pub use types::*;
pub use error::FilterError;
pub use filter::Filter;
pub use filter_where::{FilterClause, FilterWhere};
pub use filter_order::FilterOrder;
pub use page::PageRequest;
