use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::database::record::{ensure_no_system_fields, Record, RecordPage};
use crate::database::repository::{EntityStore, StoreError};
use crate::entity::EntityDef;
use crate::filter::filter_where::like_match;
use crate::filter::{Filter, FilterOp, FilterWhere, SortDirection};

/// In-process store with the backend's filter, order and window semantics.
///
/// Backs `serve --memory` and the test suites. Plays the backend role, so it
/// is the one place ids and timestamps are generated.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strictly increasing timestamps so `created_at` ordering is total
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = now.duration_trunc(Duration::microseconds(1)).unwrap_or(now);
        let mut last = match self.last_timestamp.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let ts = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(ts);
        ts
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list(&self, entity: &EntityDef, filter: &Filter) -> Result<RecordPage, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables.get(entity.table).map(Vec::as_slice).unwrap_or(&[]);

        let mut matched: Vec<&Record> = rows
            .iter()
            .filter(|r| filter.where_data().map_or(true, |w| evaluate(w, r)))
            .collect();

        matched.sort_by(|a, b| {
            for info in filter.order_data() {
                let ord = compare_for_sort(&a.column(&info.column), &b.column(&info.column), info.sort);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let total_count = matched.len() as i64;
        let offset = filter.offset_value().unwrap_or(0).max(0) as usize;
        let limit = filter.limit_value().map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        let records = matched.into_iter().skip(offset).take(limit).cloned().collect();

        Ok(RecordPage { records, total_count })
    }

    async fn create(&self, entity: &EntityDef, values: Map<String, Value>) -> Result<Record, StoreError> {
        ensure_no_system_fields(&values)?;
        let ts = self.next_timestamp();
        let record = Record {
            id: Uuid::new_v4().to_string(),
            created_at: Some(ts),
            updated_at: Some(ts),
            fields: values,
        };
        debug!("memory store: insert {} {}", entity.table, record.id);
        self.tables
            .write()
            .await
            .entry(entity.table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(&self, entity: &EntityDef, id: &str, changes: Map<String, Value>) -> Result<Record, StoreError> {
        ensure_no_system_fields(&changes)?;
        let ts = self.next_timestamp();
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(entity.table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| StoreError::not_found(entity, id))?;
        for (k, v) in changes {
            record.fields.insert(k, v);
        }
        record.updated_at = Some(ts);
        Ok(record.clone())
    }

    async fn delete(&self, entity: &EntityDef, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(entity.table)
            .ok_or_else(|| StoreError::not_found(entity, id))?;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() == before {
            return Err(StoreError::not_found(entity, id));
        }
        Ok(())
    }
}

fn evaluate(condition: &FilterWhere, record: &Record) -> bool {
    match condition {
        FilterWhere::And(parts) => parts.iter().all(|p| evaluate(p, record)),
        FilterWhere::Or(parts) => parts.iter().any(|p| evaluate(p, record)),
        FilterWhere::Not(inner) => !evaluate(inner, record),
        FilterWhere::Field { column, op, value } => {
            let lhs = record.column(column);
            match op {
                FilterOp::Eq => !lhs.is_null() && compare(&lhs, value) == Some(Ordering::Equal),
                FilterOp::Neq => !lhs.is_null() && compare(&lhs, value) != Some(Ordering::Equal),
                FilterOp::Gt => compare(&lhs, value) == Some(Ordering::Greater),
                FilterOp::Gte => matches!(compare(&lhs, value), Some(Ordering::Greater | Ordering::Equal)),
                FilterOp::Lt => compare(&lhs, value) == Some(Ordering::Less),
                FilterOp::Lte => matches!(compare(&lhs, value), Some(Ordering::Less | Ordering::Equal)),
                FilterOp::Like | FilterOp::Ilike => match (lhs.as_str(), value.as_str()) {
                    (Some(text), Some(pattern)) => like_match(pattern, text, *op == FilterOp::Ilike),
                    _ => false,
                },
                FilterOp::In => value
                    .as_array()
                    .map_or(false, |vals| vals.iter().any(|v| compare(&lhs, v) == Some(Ordering::Equal))),
                FilterOp::Is => match value.as_str() {
                    Some("NULL") => lhs.is_null(),
                    Some("NOT_NULL") => !lhs.is_null(),
                    _ => false,
                },
            }
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Nulls sort last in either direction
fn compare_for_sort(a: &Value, b: &Value, dir: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = compare(a, b).unwrap_or(Ordering::Equal);
            match dir {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::registry;
    use crate::filter::PageRequest;
    use serde_json::json;

    fn values(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_windows() {
        let store = MemoryStore::new();
        let countries = &registry::COUNTRIES;
        for name in ["A", "B", "C", "D", "E"] {
            store.create(countries, values(json!({ "name": name }))).await.unwrap();
        }

        let filter = PageRequest::new(1, 2).to_filter("countries", "name", 100).unwrap();
        let page = store.list(countries, &filter).await.unwrap();
        assert_eq!(page.total_count, 5);
        let names: Vec<_> = page.records.iter().map(|r| r.str_field("name").unwrap()).collect();
        assert_eq!(names, vec!["C", "B"]);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let store = MemoryStore::new();
        let countries = &registry::COUNTRIES;
        for name in ["Testland", "Landover", "Elsewhere"] {
            store.create(countries, values(json!({ "name": name }))).await.unwrap();
        }
        let filter = PageRequest::new(0, 10).with_search("LAND").to_filter("countries", "name", 100).unwrap();
        let page = store.list(countries, &filter).await.unwrap();
        assert_eq!(page.total_count, 2);
    }

    #[tokio::test]
    async fn client_supplied_id_is_rejected() {
        let store = MemoryStore::new();
        let degrees = &registry::DEGREES;
        let err = store
            .create(degrees, values(json!({ "id": "mine", "name": "BSc" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Record(_)));
    }

    #[tokio::test]
    async fn update_and_delete_missing_rows_are_not_found() {
        let store = MemoryStore::new();
        let degrees = &registry::DEGREES;
        assert!(matches!(
            store.update(degrees, "nope", Map::new()).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(store.delete(degrees, "nope").await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn fetch_all_pages_through_everything() {
        let store = MemoryStore::new();
        let degrees = &registry::DEGREES;
        for i in 0..250 {
            store.create(degrees, values(json!({ "name": format!("d{}", i) }))).await.unwrap();
        }
        let filter = Filter::new("degrees").unwrap();
        assert_eq!(store.fetch_all(degrees, &filter).await.unwrap().len(), 250);
    }

    #[test]
    fn nulls_sort_last_both_ways() {
        assert_eq!(compare_for_sort(&Value::Null, &json!("a"), SortDirection::Asc), Ordering::Greater);
        assert_eq!(compare_for_sort(&Value::Null, &json!("a"), SortDirection::Desc), Ordering::Greater);
        assert_eq!(compare_for_sort(&json!("a"), &json!("b"), SortDirection::Desc), Ordering::Greater);
    }

    #[test]
    fn field_conditions_evaluate() {
        let record = Record::from_value(json!({ "id": "1", "name": "Berlin", "country_id": "de", "population": 3 })).unwrap();
        assert!(evaluate(&FilterWhere::eq("country_id", "de"), &record));
        assert!(!evaluate(&FilterWhere::eq("country_id", "fr"), &record));
        assert!(evaluate(&FilterWhere::field("population", FilterOp::Gt, json!(2)).unwrap(), &record));
        assert!(evaluate(&FilterWhere::field("missing", FilterOp::Is, json!("NULL")).unwrap(), &record));
        assert!(evaluate(
            &FilterWhere::Or(vec![FilterWhere::eq("name", "Paris"), FilterWhere::contains("name", "erl")]),
            &record
        ));
    }
}
