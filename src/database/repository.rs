use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::record::{Record, RecordError, RecordPage};
use crate::entity::EntityDef;
use crate::filter::{Filter, FilterError, FilterWhere};
use crate::graphql::GraphqlError;

/// Errors from an entity store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} record {id} not found")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Graphql(#[from] GraphqlError),

    #[error("unexpected backend payload: {0}")]
    Payload(String),
}

impl StoreError {
    pub fn not_found(entity: &EntityDef, id: &str) -> Self {
        StoreError::NotFound { entity: entity.table.to_string(), id: id.to_string() }
    }
}

/// Page size used when a caller needs every row of a collection
pub const FETCH_ALL_PAGE_SIZE: i64 = 100;

/// Storage seam for managed entities.
///
/// The backend assigns ids and timestamps; writes are independent single-row
/// operations with no version check.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Rows matching `filter`, windowed by its limit/offset, with the total match count
    async fn list(&self, entity: &EntityDef, filter: &Filter) -> Result<RecordPage, StoreError>;

    async fn create(&self, entity: &EntityDef, values: Map<String, Value>) -> Result<Record, StoreError>;

    async fn update(&self, entity: &EntityDef, id: &str, changes: Map<String, Value>) -> Result<Record, StoreError>;

    async fn delete(&self, entity: &EntityDef, id: &str) -> Result<(), StoreError>;

    /// Backend reachability, for health checks
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, entity: &EntityDef, id: &str) -> Result<Option<Record>, StoreError> {
        let mut filter = Filter::new(entity.table)?;
        filter.where_clause(FilterWhere::eq("id", id));
        filter.limit(1, None)?;
        Ok(self.list(entity, &filter).await?.records.into_iter().next())
    }

    async fn get_404(&self, entity: &EntityDef, id: &str) -> Result<Record, StoreError> {
        self.get(entity, id)
            .await?
            .ok_or_else(|| StoreError::not_found(entity, id))
    }

    /// First row matching `condition`
    async fn find_one(&self, entity: &EntityDef, condition: FilterWhere) -> Result<Option<Record>, StoreError> {
        let mut filter = Filter::new(entity.table)?;
        filter.where_clause(condition);
        filter.limit(1, None)?;
        Ok(self.list(entity, &filter).await?.records.into_iter().next())
    }

    /// Every row matching `filter`, paging through the collection
    async fn fetch_all(&self, entity: &EntityDef, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let mut out = Vec::new();
        let mut offset = 0;
        loop {
            let mut page_filter = filter.clone();
            page_filter.limit(FETCH_ALL_PAGE_SIZE, Some(offset))?;
            let page = self.list(entity, &page_filter).await?;
            let fetched = page.records.len() as i64;
            out.extend(page.records);
            offset += fetched;
            if fetched == 0 || offset >= page.total_count {
                break;
            }
        }
        Ok(out)
    }
}
