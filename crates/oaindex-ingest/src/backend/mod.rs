//! Search backend contract and its implementations
//!
//! The pipeline only needs three calls: ensure an index exists, bulk-write
//! a chunk of index actions, and run a search. [`ElasticClient`] talks to an
//! Elasticsearch-compatible cluster over HTTP; [`MemoryBackend`] keeps
//! documents in process for tests and dry runs.

use std::fmt;

use oaindex_core::Retryable;
use serde_json::{Map, Value};

use crate::decoder::IndexAction;
use crate::query::SearchRequest;
use crate::schema::IndexSchema;

pub mod elastic;
pub mod memory;

pub use elastic::{ElasticClient, ElasticConfig};
pub use memory::MemoryBackend;

/// Error talking to the search backend
#[derive(Debug)]
pub enum BackendError {
    /// Connection refused, DNS failure, timeout
    Unavailable(String),
    /// Request reached the backend but was refused as a whole
    Http { status: u16, message: String },
    /// Response could not be understood
    InvalidResponse(String),
    /// Request could not be built
    Request(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "backend unavailable: {msg}"),
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::InvalidResponse(msg) => write!(f, "invalid backend response: {msg}"),
            Self::Request(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

impl Retryable for BackendError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            // 429 = bulk queue full, 5xx = node trouble
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::Request(_) => false,
        }
    }
}

impl BackendError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Backend-reported reason for rejecting one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    /// Error type, e.g. `mapper_parsing_exception`
    pub kind: String,
    pub reason: String,
}

/// Result of one action within a bulk request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: String,
    pub status: u16,
    pub error: Option<ItemError>,
}

impl ItemOutcome {
    pub fn ok(id: impl Into<String>, status: u16) -> Self {
        Self {
            id: id.into(),
            status,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, status: u16, kind: &str, reason: &str) -> Self {
        Self {
            id: id.into(),
            status,
            error: Some(ItemError {
                kind: kind.to_string(),
                reason: reason.to_string(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub source: Map<String, Value>,
    /// Sort values; pass the last hit's as the next page cursor
    pub sort: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Total matching documents (not just this page)
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// Operations the pipeline and query layer need from a search backend.
///
/// Shared by reference across worker threads.
pub trait SearchBackend: Send + Sync {
    /// Create `name` with `schema` unless it already exists.
    ///
    /// Returns true when the index was created, false when it was present.
    fn ensure_index(&self, name: &str, schema: &IndexSchema) -> Result<bool, BackendError>;

    /// Write one chunk of actions in a single request.
    ///
    /// Returns one outcome per action, in action order. Rejected items are
    /// outcomes, not errors; `Err` means the request as a whole failed.
    fn bulk(&self, actions: &[IndexAction]) -> Result<Vec<ItemOutcome>, BackendError>;

    fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchPage, BackendError>;

    /// Number of documents stored in `index`
    fn count(&self, index: &str) -> Result<u64, BackendError>;
}
