//! In-process backend: documents kept in ordered maps, overwritten by id

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::{Map, Value};

use super::{BackendError, ItemOutcome, SearchBackend, SearchHit, SearchPage};
use crate::decoder::IndexAction;
use crate::query::{Pagination, QueryKind, SearchRequest};
use crate::schema::IndexSchema;

type Documents = BTreeMap<String, Map<String, Value>>;

#[derive(Debug, Default)]
struct MemoryIndex {
    schema: Option<IndexSchema>,
    docs: Documents,
}

/// Backend holding every index in memory.
///
/// Writes with an existing id replace the stored document. Indexes written
/// to before `ensure_index` are created on the fly without a schema.
#[derive(Debug)]
pub struct MemoryBackend {
    indices: Mutex<BTreeMap<String, MemoryIndex>>,
    rejected_ids: HashSet<String>,
    available: AtomicBool,
    bulk_calls: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            indices: Mutex::new(BTreeMap::new()),
            rejected_ids: HashSet::new(),
            available: AtomicBool::new(true),
            bulk_calls: AtomicUsize::new(0),
        }
    }

    /// Reject writes for these ids the way a mapping conflict would
    pub fn with_rejected_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle simulated connection failures
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Number of bulk requests received
    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::Relaxed)
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indices.lock().unwrap().keys().cloned().collect()
    }

    pub fn has_schema(&self, index: &str) -> bool {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .is_some_and(|i| i.schema.is_some())
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map_or(0, |i| i.docs.len())
    }

    pub fn get(&self, index: &str, id: &str) -> Option<Map<String, Value>> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .and_then(|i| i.docs.get(id).cloned())
    }

    /// Stored ids of an index, ascending
    pub fn ids(&self, index: &str) -> Vec<String> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map(|i| i.docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("memory backend offline".into()))
        }
    }
}

fn query_matches(query: &QueryKind, id: &str, doc: &Map<String, Value>) -> bool {
    match query {
        QueryKind::All => true,
        QueryKind::Id(wanted) => id == wanted,
        QueryKind::Keyword { field, text } => {
            let Some(value) = doc.get(field).and_then(Value::as_str) else {
                return false;
            };
            let value = value.to_lowercase();
            let tokens: Vec<&str> = value.split_whitespace().collect();
            text.to_lowercase()
                .split_whitespace()
                .any(|t| tokens.contains(&t))
        }
    }
}

impl SearchBackend for MemoryBackend {
    fn ensure_index(&self, name: &str, schema: &IndexSchema) -> Result<bool, BackendError> {
        self.check_available()?;
        let mut indices = self.indices.lock().unwrap();
        let index = indices.entry(name.to_string()).or_default();
        if index.schema.is_some() {
            return Ok(false);
        }
        index.schema = Some(schema.clone());
        Ok(true)
    }

    fn bulk(&self, actions: &[IndexAction]) -> Result<Vec<ItemOutcome>, BackendError> {
        self.check_available()?;
        self.bulk_calls.fetch_add(1, Ordering::Relaxed);

        let mut indices = self.indices.lock().unwrap();
        let outcomes = actions
            .iter()
            .map(|action| {
                if self.rejected_ids.contains(&action.id) {
                    return ItemOutcome::failed(
                        &action.id,
                        400,
                        "mapper_parsing_exception",
                        "failed to parse document",
                    );
                }
                let docs = &mut indices.entry(action.index.to_string()).or_default().docs;
                match docs.insert(action.id.clone(), action.source.clone()) {
                    Some(_) => ItemOutcome::ok(&action.id, 200),
                    None => ItemOutcome::ok(&action.id, 201),
                }
            })
            .collect();
        Ok(outcomes)
    }

    fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchPage, BackendError> {
        self.check_available()?;
        let indices = self.indices.lock().unwrap();
        let Some(index) = indices.get(index) else {
            return Err(BackendError::Http {
                status: 404,
                message: format!("index_not_found_exception: {index}"),
            });
        };

        let matching: Vec<(&String, &Map<String, Value>)> = index
            .docs
            .iter()
            .filter(|(id, doc)| query_matches(&request.query, id, doc))
            .collect();
        let total = matching.len() as u64;

        let page: Vec<_> = match &request.pagination {
            Pagination::Offset { page, size } => matching
                .into_iter()
                .skip(((*page).max(1) - 1) * *size)
                .take(*size)
                .collect(),
            Pagination::After { last_sort, size } => {
                let after = last_sort.first().and_then(Value::as_str).unwrap_or("");
                matching
                    .into_iter()
                    .filter(|(id, _)| id.as_str() > after)
                    .take(*size)
                    .collect()
            }
        };

        let hits = page
            .into_iter()
            .map(|(id, doc)| SearchHit {
                id: id.clone(),
                source: doc.clone(),
                sort: vec![Value::String(id.clone())],
            })
            .collect();
        Ok(SearchPage { total, hits })
    }

    fn count(&self, index: &str) -> Result<u64, BackendError> {
        self.check_available()?;
        Ok(self.doc_count(index) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_type::RecordType;
    use serde_json::json;
    use std::sync::Arc;

    fn action(id: &str, name: &str) -> IndexAction {
        let mut source = Map::new();
        source.insert("id".into(), json!(id));
        source.insert("display_name".into(), json!(name));
        IndexAction {
            index: Arc::from("institution"),
            id: id.to_string(),
            source,
        }
    }

    fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .bulk(&[
                action("I3", "Gamma University"),
                action("I1", "Alpha Institute"),
                action("I2", "Beta University"),
            ])
            .unwrap();
        backend
    }

    #[test]
    fn ensure_index_is_idempotent() {
        let backend = MemoryBackend::new();
        let schema = IndexSchema::for_record_type(RecordType::Source);
        assert!(backend.ensure_index("source", &schema).unwrap());
        assert!(!backend.ensure_index("source", &schema).unwrap());
        assert!(backend.has_schema("source"));
    }

    #[test]
    fn same_id_overwrites() {
        let backend = MemoryBackend::new();
        let first = backend.bulk(&[action("I1", "Old")]).unwrap();
        let second = backend.bulk(&[action("I1", "New")]).unwrap();
        assert_eq!(first[0].status, 201);
        assert_eq!(second[0].status, 200);
        assert_eq!(backend.count("institution").unwrap(), 1);
        assert_eq!(
            backend.get("institution", "I1").unwrap()["display_name"],
            json!("New")
        );
    }

    #[test]
    fn rejected_ids_fail_individually() {
        let backend = MemoryBackend::new().with_rejected_ids(["I2"]);
        let out = backend
            .bulk(&[action("I1", "a"), action("I2", "b"), action("I3", "c")])
            .unwrap();
        let ok: Vec<bool> = out.iter().map(ItemOutcome::is_ok).collect();
        assert_eq!(ok, vec![true, false, true]);
        assert_eq!(backend.ids("institution"), vec!["I1", "I3"]);
    }

    #[test]
    fn offline_backend_is_unavailable() {
        let backend = MemoryBackend::new();
        backend.set_available(false);
        let err = backend.bulk(&[action("I1", "a")]).unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(backend.bulk_calls(), 0);
    }

    #[test]
    fn list_sorted_with_offset_pages() {
        let backend = seeded();
        let page = backend
            .search(
                "institution",
                &SearchRequest::list(Pagination::new(Some(1), Some(2), vec![])),
            )
            .unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["I1", "I2"]);

        let page2 = backend
            .search(
                "institution",
                &SearchRequest::list(Pagination::new(Some(2), Some(2), vec![])),
            )
            .unwrap();
        assert_eq!(page2.hits.len(), 1);
        assert_eq!(page2.hits[0].id, "I3");
    }

    #[test]
    fn cursor_continues_after_last_sort() {
        let backend = seeded();
        let page = backend
            .search(
                "institution",
                &SearchRequest::list(Pagination::new(None, Some(2), vec![json!("I1")])),
            )
            .unwrap();
        let ids: Vec<_> = page.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["I2", "I3"]);
    }

    #[test]
    fn keyword_and_detail() {
        let backend = seeded();
        let page = backend
            .search(
                "institution",
                &SearchRequest::keyword(RecordType::Institution, "university", Pagination::default()),
            )
            .unwrap();
        assert_eq!(page.total, 2);

        let detail = backend
            .search("institution", &SearchRequest::detail("I2"))
            .unwrap();
        assert_eq!(detail.hits.len(), 1);
        assert_eq!(detail.hits[0].source["display_name"], json!("Beta University"));
    }

    #[test]
    fn missing_index_is_http_404() {
        let err = MemoryBackend::new()
            .search("work", &SearchRequest::list(Pagination::default()))
            .unwrap_err();
        assert!(matches!(err, BackendError::Http { status: 404, .. }));
    }
}
