// graphql/documents.rs - query and mutation documents for one collection
//
// Collections follow the generated-schema naming: table `countries` exposes
// `countriesCollection`, `insertIntocountriesCollection`,
// `updatecountriesCollection` and `deleteFromcountriesCollection`.

use serde_json::Value;

use crate::database::StoreError;

/// Columns every collection selects in addition to its own fields
pub const SYSTEM_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

pub struct CollectionDocuments<'a> {
    table: &'a str,
    selection: String,
}

impl<'a> CollectionDocuments<'a> {
    pub fn new<I, S>(table: &'a str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut columns: Vec<String> = SYSTEM_COLUMNS.iter().map(|c| c.to_string()).collect();
        for field in fields {
            let field = field.as_ref();
            if !columns.iter().any(|c| c == field) {
                columns.push(field.to_string());
            }
        }
        Self { table, selection: columns.join(" ") }
    }

    pub fn collection_field(&self) -> String {
        format!("{}Collection", self.table)
    }

    pub fn insert_field(&self) -> String {
        format!("insertInto{}Collection", self.table)
    }

    pub fn update_field(&self) -> String {
        format!("update{}Collection", self.table)
    }

    pub fn delete_field(&self) -> String {
        format!("deleteFrom{}Collection", self.table)
    }

    pub fn select(&self) -> String {
        let t = self.table;
        format!(
            "query List($filter: {t}Filter, $first: Int, $offset: Int, $orderBy: [{t}OrderBy!]) {{ \
             {field}(filter: $filter, first: $first, offset: $offset, orderBy: $orderBy) {{ \
             totalCount edges {{ node {{ {sel} }} }} }} }}",
            t = t,
            field = self.collection_field(),
            sel = self.selection,
        )
    }

    pub fn insert(&self) -> String {
        let t = self.table;
        format!(
            "mutation Insert($objects: [{t}InsertInput!]!) {{ \
             {field}(objects: $objects) {{ records {{ {sel} }} }} }}",
            t = t,
            field = self.insert_field(),
            sel = self.selection,
        )
    }

    pub fn update(&self) -> String {
        let t = self.table;
        format!(
            "mutation Update($set: {t}UpdateInput!, $filter: {t}Filter) {{ \
             {field}(set: $set, filter: $filter, atMost: 1) {{ records {{ {sel} }} }} }}",
            t = t,
            field = self.update_field(),
            sel = self.selection,
        )
    }

    pub fn delete(&self) -> String {
        let t = self.table;
        format!(
            "mutation Delete($filter: {t}Filter) {{ \
             {field}(filter: $filter, atMost: 1) {{ records {{ id }} }} }}",
            t = t,
            field = self.delete_field(),
        )
    }

    /// `data.<t>Collection` → (nodes, totalCount)
    pub fn read_collection(&self, data: &Value) -> Result<(Vec<Value>, i64), StoreError> {
        let field = self.collection_field();
        let collection = data
            .get(&field)
            .ok_or_else(|| StoreError::Payload(format!("missing {}", field)))?;
        let nodes = collection
            .get("edges")
            .and_then(Value::as_array)
            .map(|edges| edges.iter().filter_map(|e| e.get("node").cloned()).collect::<Vec<_>>())
            .unwrap_or_default();
        let total = collection
            .get("totalCount")
            .and_then(Value::as_i64)
            .unwrap_or(nodes.len() as i64);
        Ok((nodes, total))
    }

    /// `data.<mutation>.records`
    pub fn read_records(&self, data: &Value, field: &str) -> Result<Vec<Value>, StoreError> {
        data.get(field)
            .and_then(|m| m.get("records"))
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| StoreError::Payload(format!("missing {}.records", field)))
    }
}
