//! Bulk ingestion of OpenAlex snapshot files into a search index
//!
//! A run ensures the target index exists ([`registrar`]), then walks the
//! record type's snapshot folder ([`walker`]). Every file is streamed
//! through the [`decoder`], grouped into batches and written with the
//! concurrent [`submitter`] against a [`SearchBackend`].
//!
//! # Example
//!
//! ```no_run
//! use oaindex_core::ProgressContext;
//! use oaindex_ingest::{Config, ElasticClient, ElasticConfig, RecordType, run};
//!
//! let client = ElasticClient::connect(&ElasticConfig::default()).unwrap();
//! let config = Config::for_type(RecordType::Source);
//! let summary = run(&config, &client, &ProgressContext::new()).expect("ingest failed");
//! println!("Indexed {} sources", summary.indexed);
//! ```

pub mod abstract_decode;
pub mod backend;
pub mod config;
pub mod decoder;
pub mod query;
pub mod record_type;
pub mod registrar;
pub mod runner;
pub mod schema;
pub mod submitter;
pub mod walker;

pub use backend::{
    BackendError, ElasticClient, ElasticConfig, ItemOutcome, MemoryBackend, SearchBackend,
    SearchHit, SearchPage,
};
pub use config::Config;
pub use decoder::{DecodeError, IndexAction, RecordDecoder};
pub use query::{Pagination, SearchRequest, next_cursor};
pub use record_type::RecordType;
pub use registrar::{IndexTarget, ensure_all, ensure_index};
pub use runner::{RunSummary, run};
pub use schema::{IndexOverrides, IndexSchema};
pub use submitter::{BatchReport, BulkSubmitter, SubmitConfig};
pub use walker::{FileError, FileStats, Strategy, WalkConfig, WalkReport, Walker};
