use finlens_core::{ParsedChunk, Result};
use finlens_index::{MetadataEntry, VectorIndex};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{ChunkInsert, ChunkStore, IngestStatus, SqliteStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub doc_id: String,
    pub chunks: usize,
    pub status: IngestStatus,
}

/// Writes one parsed document to the store and then to the index.
///
/// The document row starts as `pending`. If the index write fails the
/// document and its chunks are removed again; if that removal also fails the
/// row is left marked `failed`. Callers must not query the document while
/// this runs.
pub fn ingest_chunks(
    store: &mut SqliteStore,
    index: &mut VectorIndex,
    doc_id: &str,
    filename: &str,
    chunks: Vec<ParsedChunk>,
) -> Result<IngestSummary> {
    store.add_document(doc_id, filename)?;

    let inserts: Vec<ChunkInsert> = chunks
        .into_iter()
        .map(|chunk| ChunkInsert {
            id: Uuid::new_v4().to_string(),
            content: chunk.content,
            page: chunk.page,
        })
        .collect();
    if let Err(err) = store.add_chunks(doc_id, &inserts) {
        rollback(store, doc_id);
        return Err(err);
    }
    info!(doc_id, chunks = inserts.len(), "stored chunks");

    let texts: Vec<String> = inserts.iter().map(|c| c.content.clone()).collect();
    let metadata: Vec<MetadataEntry> = inserts
        .iter()
        .map(|c| MetadataEntry::new(doc_id, c.id.clone(), c.content.clone(), Some(c.page)))
        .collect();
    if let Err(err) = index.add(&texts, metadata) {
        warn!(doc_id, error = %err, "index write failed, rolling back store");
        rollback(store, doc_id);
        return Err(err);
    }

    store.set_status(doc_id, IngestStatus::Indexed)?;
    info!(doc_id, vectors = index.len(), "ingestion complete");
    Ok(IngestSummary {
        doc_id: doc_id.to_string(),
        chunks: inserts.len(),
        status: IngestStatus::Indexed,
    })
}

fn rollback(store: &mut SqliteStore, doc_id: &str) {
    if let Err(err) = store.delete_document(doc_id) {
        warn!(doc_id, error = %err, "rollback failed, marking document failed");
        if let Err(err) = store.set_status(doc_id, IngestStatus::Failed) {
            warn!(doc_id, error = %err, "could not mark document failed");
        }
    }
}
