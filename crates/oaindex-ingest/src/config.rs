//! Runtime configuration for one ingestion run

use std::path::{Path, PathBuf};

use crate::record_type::RecordType;
use crate::schema::IndexOverrides;
use crate::walker::WalkConfig;

/// Snapshot root when none is configured
pub const DEFAULT_SNAPSHOT_ROOT: &str = "/data/openalex-snapshot/data";

/// Ingestion of a single record type
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the per-type folders (`works/`, `sources/`, ...)
    pub snapshot_root: PathBuf,
    pub record_type: RecordType,
    pub index: IndexOverrides,
    pub walk: WalkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_root: PathBuf::from(DEFAULT_SNAPSHOT_ROOT),
            record_type: RecordType::Work,
            index: IndexOverrides::default(),
            walk: WalkConfig::default(),
        }
    }
}

impl Config {
    pub fn for_type(record_type: RecordType) -> Self {
        Self {
            record_type,
            ..Default::default()
        }
    }

    /// Folder walked for this record type
    pub fn type_root(&self) -> PathBuf {
        type_root(&self.snapshot_root, self.record_type)
    }

    pub fn index_name(&self) -> &str {
        self.index
            .name
            .as_deref()
            .unwrap_or(self.record_type.index_name())
    }
}

pub fn type_root(snapshot_root: &Path, record_type: RecordType) -> PathBuf {
    snapshot_root.join(record_type.folder_name())
}
