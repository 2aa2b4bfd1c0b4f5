//! Search request builder for the list, keyword and detail lookups
//!
//! Results are always sorted by `id` ascending so that cursor pagination
//! (`search_after` on the previous page's last sort values) is stable.

use serde_json::{Value, json};

use crate::backend::SearchPage;
use crate::record_type::RecordType;

/// Page size when none is given
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    /// Every document
    All,
    /// Full-text match on one field
    Keyword { field: String, text: String },
    /// Exact identifier lookup
    Id(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pagination {
    /// 1-based page number
    Offset { page: usize, size: usize },
    /// Continue after the sort values of the previous page's last hit
    After { last_sort: Vec<Value>, size: usize },
}

impl Pagination {
    /// Cursor pagination when `last_sort` is non-empty, offset otherwise.
    pub fn new(page: Option<usize>, size: Option<usize>, last_sort: Vec<Value>) -> Self {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        if last_sort.is_empty() {
            Self::Offset {
                page: page.unwrap_or(1).max(1),
                size,
            }
        } else {
            Self::After { last_sort, size }
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Offset { size, .. } | Self::After { size, .. } => *size,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None, Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: QueryKind,
    pub pagination: Pagination,
}

impl SearchRequest {
    /// All documents, sorted by id
    pub fn list(pagination: Pagination) -> Self {
        Self {
            query: QueryKind::All,
            pagination,
        }
    }

    /// Match `text` against the record type's keyword field
    pub fn keyword(record_type: RecordType, text: &str, pagination: Pagination) -> Self {
        Self {
            query: QueryKind::Keyword {
                field: record_type.config().keyword_field.to_string(),
                text: text.to_string(),
            },
            pagination,
        }
    }

    /// Single document by exact id
    pub fn detail(id: &str) -> Self {
        Self {
            query: QueryKind::Id(id.to_string()),
            pagination: Pagination::Offset { page: 1, size: 1 },
        }
    }

    fn query_json(&self) -> Value {
        match &self.query {
            QueryKind::All => json!({"match_all": {}}),
            QueryKind::Keyword { field, text } => json!({"match": { field.as_str(): text }}),
            QueryKind::Id(id) => json!({"term": {"id": id}}),
        }
    }

    /// Search body for the backend's search API
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "query": self.query_json(),
            "sort": [{"id": "asc"}],
            "track_total_hits": true,
        });
        match &self.pagination {
            Pagination::Offset { page, size } => {
                body["from"] = json!(((*page).max(1) - 1) * *size);
                body["size"] = json!(size);
            }
            Pagination::After { last_sort, size } => {
                body["search_after"] = json!(last_sort);
                body["size"] = json!(size);
            }
        }
        body
    }
}

/// Cursor for the page following `page` (None when it is empty)
pub fn next_cursor(page: &SearchPage) -> Option<Vec<Value>> {
    page.hits.last().map(|hit| hit.sort.clone())
}
