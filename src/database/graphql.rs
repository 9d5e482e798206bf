use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::database::record::{ensure_no_system_fields, Record, RecordPage};
use crate::database::repository::{EntityStore, StoreError};
use crate::entity::EntityDef;
use crate::filter::{Filter, FilterWhere};
use crate::graphql::{CollectionDocuments, GraphqlClient};

/// Entity store backed by the hosted database's generated GraphQL layer
pub struct GraphqlStore {
    client: GraphqlClient,
}

impl GraphqlStore {
    pub fn new(client: GraphqlClient) -> Self {
        Self { client }
    }

    fn documents(entity: &EntityDef) -> CollectionDocuments<'_> {
        CollectionDocuments::new(entity.table, entity.persisted_fields())
    }

    fn decode(nodes: Vec<Value>) -> Result<Vec<Record>, StoreError> {
        nodes
            .into_iter()
            .map(|n| Record::from_value(n).map_err(|e| StoreError::Payload(e.to_string())))
            .collect()
    }

    fn by_id(id: &str) -> Value {
        FilterWhere::eq("id", id).to_graphql()
    }
}

#[async_trait]
impl EntityStore for GraphqlStore {
    async fn list(&self, entity: &EntityDef, filter: &Filter) -> Result<RecordPage, StoreError> {
        let docs = Self::documents(entity);
        debug!("graphql list {} {}", entity.table, filter.to_variables());
        let data = self.client.execute(&docs.select(), filter.to_variables()).await?;
        let (nodes, total_count) = docs.read_collection(&data)?;
        Ok(RecordPage { records: Self::decode(nodes)?, total_count })
    }

    async fn create(&self, entity: &EntityDef, values: Map<String, Value>) -> Result<Record, StoreError> {
        ensure_no_system_fields(&values)?;
        let docs = Self::documents(entity);
        let data = self
            .client
            .execute(&docs.insert(), json!({ "objects": [Value::Object(values)] }))
            .await?;
        Self::decode(docs.read_records(&data, &docs.insert_field())?)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Payload(format!("insert into {} returned no record", entity.table)))
    }

    async fn update(&self, entity: &EntityDef, id: &str, changes: Map<String, Value>) -> Result<Record, StoreError> {
        ensure_no_system_fields(&changes)?;
        let docs = Self::documents(entity);
        let data = self
            .client
            .execute(&docs.update(), json!({ "set": Value::Object(changes), "filter": Self::by_id(id) }))
            .await?;
        Self::decode(docs.read_records(&data, &docs.update_field())?)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(entity, id))
    }

    async fn delete(&self, entity: &EntityDef, id: &str) -> Result<(), StoreError> {
        let docs = Self::documents(entity);
        let data = self
            .client
            .execute(&docs.delete(), json!({ "filter": Self::by_id(id) }))
            .await?;
        if docs.read_records(&data, &docs.delete_field())?.is_empty() {
            return Err(StoreError::not_found(entity, id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client.execute("query Ping { __typename }", json!({})).await?;
        Ok(())
    }
}
