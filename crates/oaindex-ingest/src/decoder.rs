//! Streaming decoder: gzip NDJSON file → projected index actions

use std::fmt;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use oaindex_core::{ByteCounter, GzipReader, open_gzip_file};
use serde_json::{Map, Value};

use crate::abstract_decode::decode_abstract;
use crate::record_type::RecordTypeConfig;

/// One input line, as parsed
pub type RawRecord = Map<String, Value>;

/// Initial capacity for the per-line read buffer
const LINE_BUF_CAPACITY: usize = 16 * 1024;

/// An "index" directive for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexAction {
    /// Target index name
    pub index: Arc<str>,
    /// Document identifier (the record's natural `id`)
    pub id: String,
    /// Projected document body
    pub source: Map<String, Value>,
}

/// Error decoding a snapshot file; fatal for that file only
#[derive(Debug)]
pub enum DecodeError {
    Io(io::Error),
    /// Line `line` (1-based) is not a JSON object
    MalformedLine { line: usize, source: sonic_rs::Error },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::MalformedLine { line, source } => write!(f, "malformed line {line}: {source}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Per-file decode counters. `emitted + dropped == lines_read` always holds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    /// Non-blank lines parsed
    pub lines_read: usize,
    /// Records that became index actions
    pub emitted: usize,
    /// Records missing a required field
    pub dropped: usize,
}

/// Truthiness for required-field checks.
///
/// Null, `false`, zero, empty strings and empty containers count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn document_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reduce a raw record to the configured field set.
///
/// Every whitelisted field is present in the output (null when absent in
/// the input), plus `abstract`, which stays null for types without
/// abstract reconstruction.
/// Returns None when a required field is missing or empty.
pub fn project(mut raw: RawRecord, config: &RecordTypeConfig) -> Option<(String, Map<String, Value>)> {
    if !config
        .required
        .iter()
        .all(|f| raw.get(*f).is_some_and(is_present))
    {
        return None;
    }
    let id = document_id(raw.get("id")?)?;

    let inverted = if config.reconstruct_abstract {
        raw.remove("abstract_inverted_index")
    } else {
        None
    };

    let mut doc = Map::new();
    for field in config.fields {
        doc.insert(
            (*field).to_string(),
            raw.remove(*field).unwrap_or(Value::Null),
        );
    }
    let text = decode_abstract(inverted.as_ref());
    doc.insert(
        "abstract".to_string(),
        text.map(Value::String).unwrap_or(Value::Null),
    );
    Some((id, doc))
}

/// Lazy iterator of index actions over one gzip NDJSON file.
///
/// Lines are read one at a time in file order. The first I/O or parse
/// error is yielded once, after which the iterator is exhausted. Re-open
/// the file to start over.
pub struct RecordDecoder<'a> {
    reader: GzipReader,
    counter: ByteCounter,
    total_bytes: u64,
    config: &'a RecordTypeConfig,
    index: Arc<str>,
    buf: String,
    line_no: usize,
    stats: DecodeStats,
    done: bool,
}

impl<'a> RecordDecoder<'a> {
    pub fn open(path: &Path, config: &'a RecordTypeConfig, index: Arc<str>) -> io::Result<Self> {
        let (reader, counter, total_bytes) = open_gzip_file(path)?;
        Ok(Self {
            reader,
            counter,
            total_bytes,
            config,
            index,
            buf: String::with_capacity(LINE_BUF_CAPACITY),
            line_no: 0,
            stats: DecodeStats::default(),
            done: false,
        })
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Shared counter of compressed bytes consumed so far
    pub fn byte_counter(&self) -> ByteCounter {
        self.counter.clone()
    }

    pub fn bytes_read(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Compressed file size
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn fail(&mut self, err: DecodeError) -> Option<Result<IndexAction, DecodeError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl Iterator for RecordDecoder<'_> {
    type Item = Result<IndexAction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => return self.fail(DecodeError::Io(e)),
            }
            self.line_no += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            self.stats.lines_read += 1;

            let raw: RawRecord = match sonic_rs::from_str(line) {
                Ok(raw) => raw,
                Err(source) => {
                    let line = self.line_no;
                    return self.fail(DecodeError::MalformedLine { line, source });
                }
            };

            match project(raw, self.config) {
                Some((id, source)) => {
                    self.stats.emitted += 1;
                    return Some(Ok(IndexAction {
                        index: self.index.clone(),
                        id,
                        source,
                    }));
                }
                None => self.stats.dropped += 1,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_type::RecordType;
    use serde_json::json;
    use std::fs::File;
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn raw(v: Value) -> RawRecord {
        v.as_object().unwrap().clone()
    }

    fn gz_file(dir: &TempDir, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join("part_000.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
        for line in lines {
            writeln!(enc, "{line}").unwrap();
        }
        enc.finish().unwrap();
        path
    }

    #[test]
    fn work_projection_fills_missing_fields() {
        let cfg = RecordType::Work.config();
        let (id, doc) = project(
            raw(json!({"id": "W1", "title": "Paper A", "doi": "10.1/x", "cited_by_count": 3})),
            cfg,
        )
        .unwrap();

        assert_eq!(id, "W1");
        assert_eq!(doc.len(), cfg.fields.len() + 1);
        assert_eq!(doc["cited_by_count"], json!(3));
        assert_eq!(doc["concepts"], Value::Null);
        assert_eq!(doc["abstract"], Value::Null);
        assert!(!doc.contains_key("doi"));
    }

    #[test]
    fn work_abstract_rebuilt_and_inverted_index_removed() {
        let (_, doc) = project(
            raw(json!({
                "id": "W3",
                "title": "Paper B",
                "abstract_inverted_index": {"alpha": [1], "beta": [0]}
            })),
            RecordType::Work.config(),
        )
        .unwrap();
        assert_eq!(doc["abstract"], json!("beta alpha"));
        assert!(!doc.contains_key("abstract_inverted_index"));
    }

    #[test]
    fn work_without_title_dropped() {
        let cfg = RecordType::Work.config();
        assert!(project(raw(json!({"id": "W1"})), cfg).is_none());
        assert!(project(raw(json!({"id": "W1", "title": ""})), cfg).is_none());
        assert!(project(raw(json!({"id": "W1", "title": null})), cfg).is_none());
    }

    #[test]
    fn falsy_required_values_dropped() {
        let work = RecordType::Work.config();
        assert!(project(raw(json!({"id": "W1", "title": false})), work).is_none());
        assert!(project(raw(json!({"id": "W1", "title": 0})), work).is_none());
        assert!(project(raw(json!({"id": "W1", "title": []})), work).is_none());
        assert!(project(raw(json!({"id": 0})), RecordType::Author.config()).is_none());
        assert!(project(raw(json!({"id": "W1", "title": true})), work).is_some());
        let (id, _) = project(raw(json!({"id": 42})), RecordType::Author.config()).unwrap();
        assert_eq!(id, "42");
    }

    #[test]
    fn missing_or_empty_id_dropped() {
        let cfg = RecordType::Source.config();
        assert!(project(raw(json!({"display_name": "J"})), cfg).is_none());
        assert!(project(raw(json!({"id": ""})), cfg).is_none());
        assert!(project(raw(json!({"id": null})), cfg).is_none());
    }

    #[test]
    fn source_needs_only_id_and_carries_null_abstract() {
        let cfg = RecordType::Source.config();
        let (id, doc) = project(
            raw(json!({"id": "S1", "abstract_inverted_index": {"x": [0]}})),
            cfg,
        )
        .unwrap();
        assert_eq!(id, "S1");
        assert_eq!(doc.len(), cfg.fields.len() + 1);
        assert_eq!(doc["abstract"], Value::Null);
        assert!(!doc.contains_key("abstract_inverted_index"));
    }

    #[test]
    fn projected_field_set_is_stable() {
        let cfg = RecordType::Author.config();
        let (_, a) = project(raw(json!({"id": "A1"})), cfg).unwrap();
        let (_, b) = project(
            raw(json!({"id": "A2", "display_name": "X", "orcid": "o", "extra": 1})),
            cfg,
        )
        .unwrap();
        let ka: Vec<_> = a.keys().collect();
        let kb: Vec<_> = b.keys().collect();
        assert_eq!(ka, kb);
    }

    #[test]
    fn decoder_counts_emitted_and_dropped() {
        let dir = TempDir::new().unwrap();
        let path = gz_file(
            &dir,
            &[
                r#"{"id": "W1", "title": "Paper A"}"#,
                r#"{"title": "no id"}"#,
                "",
                r#"{"id": "W3", "title": "Paper B", "abstract_inverted_index": {"alpha": [1], "beta": [0]}}"#,
            ],
        );

        let mut decoder =
            RecordDecoder::open(&path, RecordType::Work.config(), Arc::from("work")).unwrap();
        let actions: Vec<IndexAction> = decoder.by_ref().map(Result::unwrap).collect();

        let ids: Vec<&str> = actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["W1", "W3"]);
        assert_eq!(actions[1].source["abstract"], json!("beta alpha"));
        assert!(actions.iter().all(|a| &*a.index == "work"));

        let stats = decoder.stats();
        assert_eq!(
            stats,
            DecodeStats {
                lines_read: 3,
                emitted: 2,
                dropped: 1
            }
        );
        assert_eq!(decoder.bytes_read(), decoder.total_bytes());
    }

    #[test]
    fn malformed_line_fails_fast() {
        let dir = TempDir::new().unwrap();
        let path = gz_file(
            &dir,
            &[r#"{"id": "S1"}"#, "{not json", r#"{"id": "S3"}"#],
        );

        let mut decoder =
            RecordDecoder::open(&path, RecordType::Source.config(), Arc::from("source")).unwrap();
        assert_eq!(decoder.next().unwrap().unwrap().id, "S1");
        match decoder.next() {
            Some(Err(DecodeError::MalformedLine { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected malformed line, got {other:?}"),
        }
        assert!(decoder.next().is_none());
    }

    #[test]
    fn reopening_restarts_from_first_line() {
        let dir = TempDir::new().unwrap();
        let path = gz_file(&dir, &[r#"{"id": "S1"}"#, r#"{"id": "S2"}"#]);
        let cfg = RecordType::Source.config();

        let first: Vec<_> = RecordDecoder::open(&path, cfg, Arc::from("source"))
            .unwrap()
            .map(|a| a.unwrap().id)
            .collect();
        let second: Vec<_> = RecordDecoder::open(&path, cfg, Arc::from("source"))
            .unwrap()
            .map(|a| a.unwrap().id)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn non_object_line_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = gz_file(&dir, &["[1, 2, 3]"]);
        let mut decoder =
            RecordDecoder::open(&path, RecordType::Source.config(), Arc::from("source")).unwrap();
        assert!(matches!(
            decoder.next(),
            Some(Err(DecodeError::MalformedLine { line: 1, .. }))
        ));
    }
}
