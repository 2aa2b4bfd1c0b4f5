//! Ensures target indexes exist before ingestion starts

use crate::backend::{BackendError, SearchBackend};
use crate::record_type::RecordType;
use crate::schema::{IndexOverrides, IndexSchema};

/// A record type bound to its index name and effective schema
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTarget {
    pub record_type: RecordType,
    pub index: String,
    pub schema: IndexSchema,
}

impl IndexTarget {
    pub fn new(record_type: RecordType, overrides: &IndexOverrides) -> Self {
        let index = overrides
            .name
            .clone()
            .unwrap_or_else(|| record_type.index_name().to_string());
        let schema = IndexSchema::for_record_type(record_type).with_overrides(overrides);
        Self {
            record_type,
            index,
            schema,
        }
    }
}

/// Create the target index unless present. Safe to call on every start.
///
/// Returns true when the index was created by this call.
pub fn ensure_index<B: SearchBackend + ?Sized>(
    backend: &B,
    target: &IndexTarget,
) -> Result<bool, BackendError> {
    let created = backend.ensure_index(&target.index, &target.schema)?;
    if created {
        log::info!(
            "Created index '{}' for {} ({} shards, {} replicas)",
            target.index,
            target.record_type.folder_name(),
            target.schema.settings.shards,
            target.schema.settings.replicas
        );
    } else {
        log::info!("Index '{}' exists, leaving it as is", target.index);
    }
    Ok(created)
}

/// Ensure every target, stopping at the first failure
pub fn ensure_all<B: SearchBackend + ?Sized>(
    backend: &B,
    targets: &[IndexTarget],
) -> Result<usize, BackendError> {
    let mut created = 0;
    for target in targets {
        if ensure_index(backend, target)? {
            created += 1;
        }
    }
    Ok(created)
}
