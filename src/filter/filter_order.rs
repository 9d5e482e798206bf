use serde_json::{Map, Value};

use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Column used when a list has no explicit sort
    pub const DEFAULT_COLUMN: &'static str = "created_at";

    pub fn default_order() -> Vec<FilterOrderInfo> {
        vec![FilterOrderInfo::new(Self::DEFAULT_COLUMN, SortDirection::Desc)]
    }

    /// Parse `"created_at desc, name asc"`. Column names are passed through
    /// as given; an empty spec yields the default order.
    pub fn parse(spec: &str) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in spec.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                out.push(FilterOrderInfo::new(col, sort));
            }
        }
        if out.is_empty() {
            return Self::default_order();
        }
        out
    }

    /// Render as the backend's `orderBy` list: `[{"created_at": "DescNullsLast"}]`
    pub fn to_graphql(infos: &[FilterOrderInfo]) -> Value {
        let entries = infos
            .iter()
            .map(|i| {
                let mut entry = Map::new();
                entry.insert(i.column.clone(), Value::String(i.sort.to_graphql().to_string()));
                Value::Object(entry)
            })
            .collect();
        Value::Array(entries)
    }
}
