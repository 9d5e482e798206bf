use serde_json::{json, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::FilterOrderInfo;

/// A collection read: which table, which rows, in which order, which window.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    table_name: String,
    where_data: Option<FilterWhere>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            where_data: None,
            order_data: FilterOrder::default_order(),
            limit: None,
            offset: None,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn where_data(&self) -> Option<&FilterWhere> {
        self.where_data.as_ref()
    }

    pub fn order_data(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// Add a condition, and-ed with any existing one
    pub fn where_clause(&mut self, condition: FilterWhere) -> &mut Self {
        self.where_data = Some(match self.where_data.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn order(&mut self, order: Vec<FilterOrderInfo>) -> &mut Self {
        self.order_data = if order.is_empty() { FilterOrder::default_order() } else { order };
        self
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    /// Variables for a collection query: `{filter, first, offset, orderBy}`
    pub fn to_variables(&self) -> Value {
        let mut vars = json!({
            "filter": self.where_data.as_ref().map(|w| w.to_graphql()).unwrap_or(Value::Null),
            "orderBy": FilterOrder::to_graphql(&self.order_data),
        });
        if let Some(limit) = self.limit {
            vars["first"] = json!(limit);
        }
        if let Some(offset) = self.offset {
            vars["offset"] = json!(offset);
        }
        vars
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        match chars.next() {
            None => return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string())),
            Some(c) if !(c.is_alphabetic() || c == '_') => {
                return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)))
            }
            _ => {}
        }
        if !chars.all(|c| c.is_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_table_names() {
        assert!(Filter::new("").is_err());
        assert!(Filter::new("1countries").is_err());
        assert!(Filter::new("countries;").is_err());
        assert!(Filter::new("academic_years").is_ok());
    }

    #[test]
    fn where_clauses_are_anded() {
        let mut filter = Filter::new("cities").unwrap();
        filter.where_clause(FilterWhere::eq("country_id", "c1"));
        filter.where_clause(FilterWhere::contains("name", "ist"));
        assert_eq!(
            filter.to_variables()["filter"],
            json!({ "and": [ { "country_id": { "eq": "c1" } }, { "name": { "ilike": "%ist%" } } ] })
        );
    }

    #[test]
    fn negative_limit_or_offset_rejected() {
        let mut filter = Filter::new("countries").unwrap();
        assert!(filter.limit(-1, None).is_err());
        assert!(filter.limit(10, Some(-5)).is_err());
        assert!(filter.limit(10, Some(20)).is_ok());
        let vars = filter.to_variables();
        assert_eq!(vars["first"], json!(10));
        assert_eq!(vars["offset"], json!(20));
    }

    #[test]
    fn unfiltered_variables_have_null_filter_and_default_order() {
        let filter = Filter::new("degrees").unwrap();
        let vars = filter.to_variables();
        assert_eq!(vars["filter"], Value::Null);
        assert_eq!(vars["orderBy"], json!([{ "created_at": "DescNullsLast" }]));
        assert!(vars.get("first").is_none());
    }
}
