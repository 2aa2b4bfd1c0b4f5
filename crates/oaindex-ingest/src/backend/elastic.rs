//! Elasticsearch-compatible HTTP backend.
//!
//! Uses async reqwest on a client-owned tokio runtime but presents a sync
//! interface, so rayon file workers and bulk threads can share one client.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{BackendError, ItemOutcome, SearchBackend, SearchHit, SearchPage};
use crate::decoder::IndexAction;
use crate::query::SearchRequest;
use crate::schema::IndexSchema;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime threads driving HTTP I/O
const RUNTIME_THREADS: usize = 2;

/// Connection settings for [`ElasticClient`]
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub url: String,
    /// Whole-request timeout; None waits indefinitely
    pub timeout: Option<Duration>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Idle pooled connections kept per host
    pub pool_size: usize,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            timeout: None,
            username: None,
            password: None,
            pool_size: 8,
        }
    }
}

/// Handle to one cluster: pooled HTTP client plus the runtime driving it.
///
/// Thread-safe; dropped at the end of a run to close its connections.
pub struct ElasticClient {
    base_url: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    auth: Option<(String, Option<String>)>,
}

impl std::fmt::Debug for ElasticClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BackendError {
    fn from_reqwest(e: &reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_builder() {
            Self::Request(e.to_string())
        } else {
            // connect, timeout, reset mid-body
            Self::Unavailable(e.to_string())
        }
    }
}

impl ElasticClient {
    pub fn connect(config: &ElasticConfig) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(config.pool_size);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .thread_name("oaindex-http")
            .enable_all()
            .build()
            .map_err(|e| BackendError::Request(format!("failed to build runtime: {e}")))?;

        let auth = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            http,
            runtime,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and read the whole body
    fn execute(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, String), BackendError> {
        let request = match &self.auth {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        };
        self.runtime.block_on(async {
            let response = request
                .send()
                .await
                .map_err(|e| BackendError::from_reqwest(&e))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| BackendError::from_reqwest(&e))?;
            Ok::<_, BackendError>((status, body))
        })
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<String, BackendError> {
        let request = self
            .http
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        let (status, text) = self.execute(request)?;
        if !status.is_success() {
            return Err(BackendError::Http {
                status: status.as_u16(),
                message: error_reason(&text),
            });
        }
        Ok(text)
    }
}

/// Render actions as a `_bulk` NDJSON body (meta line + source line each)
pub fn render_bulk_body(actions: &[IndexAction]) -> Result<String, BackendError> {
    let mut body = Vec::with_capacity(actions.len() * 1024);
    for action in actions {
        let meta = serde_json::json!({
            "index": { "_index": &*action.index, "_id": &action.id }
        });
        serde_json::to_writer(&mut body, &meta).map_err(|e| BackendError::Request(e.to_string()))?;
        body.push(b'\n');
        serde_json::to_writer(&mut body, &action.source)
            .map_err(|e| BackendError::Request(e.to_string()))?;
        body.push(b'\n');
    }
    String::from_utf8(body).map_err(|e| BackendError::Request(e.to_string()))
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<BulkItemError>,
}

#[derive(Deserialize)]
struct BulkItemError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse a `_bulk` response into one outcome per action, in action order.
pub fn parse_bulk_response(
    text: &str,
    actions: &[IndexAction],
) -> Result<Vec<ItemOutcome>, BackendError> {
    let response: BulkResponse = serde_json::from_str(text)
        .map_err(|e| BackendError::InvalidResponse(format!("bulk response: {e}")))?;
    if response.items.len() != actions.len() {
        return Err(BackendError::InvalidResponse(format!(
            "bulk response has {} items for {} actions",
            response.items.len(),
            actions.len()
        )));
    }

    response
        .items
        .into_iter()
        .zip(actions)
        .map(|(mut item, action)| {
            let (_, item) = item
                .drain()
                .next()
                .ok_or_else(|| BackendError::InvalidResponse("empty bulk item".into()))?;
            let id = item.id.unwrap_or_else(|| action.id.clone());
            Ok(match item.error {
                Some(err) => ItemOutcome {
                    id,
                    status: item.status,
                    error: Some(super::ItemError {
                        kind: err.kind,
                        reason: err.reason.unwrap_or_default(),
                    }),
                },
                None => ItemOutcome::ok(id, item.status),
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Object { value: u64 },
    Legacy(u64),
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
    #[serde(default)]
    sort: Vec<Value>,
}

pub fn parse_search_response(text: &str) -> Result<SearchPage, BackendError> {
    let response: SearchResponse = serde_json::from_str(text)
        .map_err(|e| BackendError::InvalidResponse(format!("search response: {e}")))?;
    let hits: Vec<SearchHit> = response
        .hits
        .hits
        .into_iter()
        .map(|h| SearchHit {
            id: h.id,
            source: h.source,
            sort: h.sort,
        })
        .collect();
    let total = match response.hits.total {
        Some(TotalHits::Object { value }) | Some(TotalHits::Legacy(value)) => value,
        None => hits.len() as u64,
    };
    Ok(SearchPage { total, hits })
}

pub fn parse_count_response(text: &str) -> Result<u64, BackendError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| BackendError::InvalidResponse(format!("count response: {e}")))?;
    value
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| BackendError::InvalidResponse("count response without `count`".into()))
}

/// Best-effort `error.type: error.reason` from an error body
fn error_reason(text: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(text).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    match error {
        Some(Value::Object(e)) => {
            let kind = e.get("type").and_then(Value::as_str).unwrap_or("error");
            let reason = e.get("reason").and_then(Value::as_str).unwrap_or("");
            format!("{kind}: {reason}")
        }
        Some(Value::String(s)) => s.clone(),
        _ => text.chars().take(200).collect(),
    }
}

impl SearchBackend for ElasticClient {
    fn ensure_index(&self, name: &str, schema: &IndexSchema) -> Result<bool, BackendError> {
        let url = self.url(name);
        let (status, _) = self.execute(self.http.head(&url))?;
        match status {
            StatusCode::OK => return Ok(false),
            StatusCode::NOT_FOUND => {}
            other => {
                return Err(BackendError::Http {
                    status: other.as_u16(),
                    message: format!("HEAD /{name}"),
                });
            }
        }

        let request = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(schema.to_create_body().to_string());
        let (status, text) = self.execute(request)?;
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::BAD_REQUEST
            && text.contains("resource_already_exists_exception")
        {
            // created concurrently by another process
            Ok(false)
        } else {
            Err(BackendError::Http {
                status: status.as_u16(),
                message: error_reason(&text),
            })
        }
    }

    fn bulk(&self, actions: &[IndexAction]) -> Result<Vec<ItemOutcome>, BackendError> {
        if actions.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .http
            .post(self.url("_bulk"))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(render_bulk_body(actions)?);
        let (status, text) = self.execute(request)?;
        if !status.is_success() {
            return Err(BackendError::Http {
                status: status.as_u16(),
                message: error_reason(&text),
            });
        }
        parse_bulk_response(&text, actions)
    }

    fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchPage, BackendError> {
        let text = self.post_json(&format!("{index}/_search"), &request.to_body())?;
        parse_search_response(&text)
    }

    fn count(&self, index: &str) -> Result<u64, BackendError> {
        let text = self.post_json(&format!("{index}/_count"), &serde_json::json!({}))?;
        parse_count_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn action(id: &str) -> IndexAction {
        let mut source = Map::new();
        source.insert("id".into(), json!(id));
        source.insert("title".into(), json!("T"));
        IndexAction {
            index: Arc::from("work"),
            id: id.to_string(),
            source,
        }
    }

    #[test]
    fn bulk_body_is_ndjson_pairs() {
        let body = render_bulk_body(&[action("W1"), action("W2")]).unwrap();
        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], json!({"index": {"_index": "work", "_id": "W1"}}));
        assert_eq!(lines[1], json!({"id": "W1", "title": "T"}));
        assert_eq!(lines[2]["index"]["_id"], json!("W2"));
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn parses_mixed_bulk_response() {
        let text = r#"{
            "took": 3, "errors": true,
            "items": [
                {"index": {"_index": "work", "_id": "W1", "status": 201}},
                {"index": {"_index": "work", "_id": "W2", "status": 400,
                    "error": {"type": "mapper_parsing_exception", "reason": "failed to parse field [publication_date]"}}},
                {"index": {"_index": "work", "_id": "W3", "status": 200}}
            ]
        }"#;
        let out = parse_bulk_response(text, &[action("W1"), action("W2"), action("W3")]).unwrap();
        assert!(out[0].is_ok());
        assert!(!out[1].is_ok());
        assert_eq!(out[1].error.as_ref().unwrap().kind, "mapper_parsing_exception");
        assert!(out[2].is_ok());
    }

    #[test]
    fn bulk_item_count_mismatch_is_invalid() {
        let text = r#"{"errors": false, "items": [{"index": {"_id": "W1", "status": 201}}]}"#;
        let err = parse_bulk_response(text, &[action("W1"), action("W2")]).unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[test]
    fn bulk_item_without_id_uses_action_id() {
        let text = r#"{"items": [{"index": {"status": 201}}]}"#;
        let out = parse_bulk_response(text, &[action("W9")]).unwrap();
        assert_eq!(out[0].id, "W9");
    }

    #[test]
    fn parses_search_hits_with_sort() {
        let text = r#"{
            "hits": {
                "total": {"value": 42, "relation": "eq"},
                "hits": [
                    {"_id": "I1", "_source": {"id": "I1", "display_name": "A"}, "sort": ["I1"]},
                    {"_id": "I2", "_source": {"id": "I2", "display_name": "B"}, "sort": ["I2"]}
                ]
            }
        }"#;
        let page = parse_search_response(text).unwrap();
        assert_eq!(page.total, 42);
        assert_eq!(page.hits[1].sort, vec![json!("I2")]);
        assert_eq!(page.hits[0].source["display_name"], json!("A"));
    }

    #[test]
    fn parses_count() {
        let text = r#"{"count": 1234, "_shards": {"total": 5, "successful": 5}}"#;
        assert_eq!(parse_count_response(text).unwrap(), 1234);
        assert!(parse_count_response("{}").is_err());
    }

    #[test]
    fn error_reason_extracts_type() {
        let text = r#"{"error": {"type": "index_not_found_exception", "reason": "no such index [work]"}, "status": 404}"#;
        assert_eq!(
            error_reason(text),
            "index_not_found_exception: no such index [work]"
        );
        assert_eq!(error_reason("plain failure"), "plain failure");
    }

    #[test]
    fn unreachable_cluster_is_unavailable() {
        // Port 9 (discard) is closed on CI hosts; connect fails fast
        let client = ElasticClient::connect(&ElasticConfig {
            url: "http://127.0.0.1:9".into(),
            timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        })
        .unwrap();
        let err = client.bulk(&[action("W1")]).unwrap_err();
        assert!(err.is_unavailable(), "{err}");
    }
}
