use serde::{Deserialize, Serialize};

use super::error::FilterError;
use super::filter::Filter;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;

/// One page of a list screen: which page, how big, what to search, how to sort.
///
/// Pages are zero-based. `to_filter` is the only place an offset is computed,
/// and it refuses negative pages and non-positive page sizes before doing so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    /// `column:op:value` clauses joined by `;`, typed against the entity by the service
    #[serde(default)]
    pub filter: Option<String>,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size, search: None, sort: None, filter: None }
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn with_sort(mut self, spec: impl Into<String>) -> Self {
        self.sort = Some(spec.into());
        self
    }

    pub fn with_filter(mut self, spec: impl Into<String>) -> Self {
        self.filter = Some(spec.into());
        self
    }

    /// Search term with surrounding whitespace removed; blank terms are no search
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        if self.page < 0 {
            return Err(FilterError::InvalidPage(self.page));
        }
        if self.page_size <= 0 {
            return Err(FilterError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }

    /// Page size after applying the configured ceiling
    pub fn effective_page_size(&self, max_page_size: i64) -> i64 {
        if max_page_size > 0 && self.page_size > max_page_size {
            tracing::warn!("Page size {} exceeds max {}, capping to max", self.page_size, max_page_size);
            max_page_size
        } else {
            self.page_size
        }
    }

    /// Build the collection filter for `table`, searching `search_column`
    pub fn to_filter(&self, table: &str, search_column: &str, max_page_size: i64) -> Result<Filter, FilterError> {
        self.validate()?;
        let page_size = self.effective_page_size(max_page_size);
        let offset = self
            .page
            .checked_mul(page_size)
            .ok_or(FilterError::InvalidPage(self.page))?;

        let mut filter = Filter::new(table)?;
        if let Some(term) = self.search_term() {
            filter.where_clause(FilterWhere::contains(search_column, term));
        }
        filter.order(match self.sort.as_deref() {
            Some(spec) => FilterOrder::parse(spec),
            None => FilterOrder::default_order(),
        });
        filter.limit(page_size, Some(offset))?;
        Ok(filter)
    }
}
