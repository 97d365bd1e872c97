//! Flat exact-L2 vector index with per-slot metadata.
//!
//! Every slot pairs one vector with its [`MetadataEntry`], so the vector
//! sequence and the metadata sequence cannot drift apart in memory. On disk
//! the index is two artifacts sharing a base path (see [`IndexPaths`]) that
//! are always written and read together.
//!
//! The index assumes a single writer. Two processes appending to the same
//! base path will overwrite each other's slots.

mod jsonl;
mod persist;

use std::path::Path;

use finlens_core::{Embedder, FinError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

pub use jsonl::{read_records, JsonlWriter};
pub use persist::IndexPaths;

/// Candidate pool multiplier applied before document filtering.
pub const OVERFETCH_FACTOR: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub doc_id: String,
    pub chunk_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataEntry {
    pub fn new(
        doc_id: impl Into<String>,
        chunk_id: impl Into<String>,
        content: impl Into<String>,
        page: Option<u32>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            chunk_id: chunk_id.into(),
            content: content.into(),
            page,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub metadata: MetadataEntry,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub metadata: MetadataEntry,
    /// Squared Euclidean distance. Lower is closer.
    pub score: f32,
}

impl SearchHit {
    pub fn content(&self) -> &str {
        &self.metadata.content
    }
}

pub struct VectorIndex {
    embedder: Box<dyn Embedder>,
    paths: IndexPaths,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Restores the index stored at `base`, or starts an empty one when
    /// neither artifact exists yet.
    pub fn open<P, E>(base: P, embedder: E) -> Result<Self>
    where
        P: AsRef<Path>,
        E: Embedder + 'static,
    {
        let dimension = embedder.dimensions();
        if dimension == 0 {
            return Err(FinError::Embedding(format!(
                "embedder {} reports zero dimensions",
                embedder.model_name()
            )));
        }
        let paths = IndexPaths::from_base(base);
        let entries = match persist::load(&paths, dimension, embedder.model_name())? {
            Some(entries) => {
                info!(
                    path = %paths.index.display(),
                    vectors = entries.len(),
                    "restored vector index"
                );
                entries
            }
            None => {
                info!(
                    path = %paths.index.display(),
                    dimension,
                    "creating empty vector index"
                );
                Vec::new()
            }
        };
        Ok(Self {
            embedder: Box::new(embedder),
            paths,
            dimension,
            entries,
        })
    }

    /// Embeds `texts` in one batch and appends them with their metadata,
    /// then persists. `metadata[i]` must describe `texts[i]`.
    pub fn add(&mut self, texts: &[String], metadata: Vec<MetadataEntry>) -> Result<usize> {
        if texts.is_empty() {
            return Ok(0);
        }
        if texts.len() != metadata.len() {
            return Err(FinError::consistency(format!(
                "{} texts supplied with {} metadata entries",
                texts.len(),
                metadata.len()
            )));
        }
        let vectors = self.embedder.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(FinError::consistency(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            self.check_dimension(vector)?;
        }

        let previous_len = self.entries.len();
        self.entries.extend(
            vectors
                .into_iter()
                .zip(metadata)
                .map(|(vector, metadata)| IndexEntry { vector, metadata }),
        );
        if let Err(err) = self.persist() {
            self.entries.truncate(previous_len);
            return Err(err);
        }
        info!(added = texts.len(), total = self.entries.len(), "added vectors to index");
        Ok(texts.len())
    }

    /// Returns up to `k` hits for `query`, closest first, optionally limited
    /// to one document. Filtering happens after a `2k` candidate fetch, so
    /// fewer than `k` hits may come back even when more matching slots exist.
    /// An empty document id means no filter.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        filter_doc_id: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query)?;
        self.search_vector(&vector, k, filter_doc_id)
    }

    pub fn search_vector(
        &self,
        vector: &[f32],
        k: usize,
        filter_doc_id: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        self.check_dimension(vector)?;
        let mut hits = Vec::new();
        if k == 0 {
            return Ok(hits);
        }
        let filter_doc_id = filter_doc_id.filter(|doc_id| !doc_id.is_empty());
        let candidates = self.nearest(vector, k.saturating_mul(OVERFETCH_FACTOR));
        debug!(candidates = candidates.len(), k, "filtering candidates");
        for neighbor in candidates {
            let metadata = &self.entries[neighbor.position].metadata;
            if let Some(doc_id) = filter_doc_id {
                if metadata.doc_id != doc_id {
                    continue;
                }
            }
            hits.push(SearchHit {
                metadata: metadata.clone(),
                score: neighbor.distance,
            });
            if hits.len() >= k {
                break;
            }
        }
        Ok(hits)
    }

    /// Exact nearest neighbours by squared Euclidean distance. Equal
    /// distances keep insertion order.
    pub fn nearest(&self, vector: &[f32], n: usize) -> Vec<Neighbor> {
        let mut scored: Vec<Neighbor> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| Neighbor {
                position,
                distance: squared_l2(&entry.vector, vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        scored.truncate(n);
        scored
    }

    pub fn persist(&self) -> Result<()> {
        persist::save(
            &self.paths,
            self.dimension,
            self.embedder.model_name(),
            &self.entries,
        )?;
        debug!(
            index = %self.paths.index.display(),
            metadata = %self.paths.metadata.display(),
            vectors = self.entries.len(),
            "persisted vector index"
        );
        Ok(())
    }

    /// Verifies every slot holds a vector of the index dimension.
    pub fn check_consistency(&self) -> Result<()> {
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.vector.len() != self.dimension {
                return Err(FinError::consistency(format!(
                    "slot {position} holds a {}-dimensional vector, index dimension is {}",
                    entry.vector.len(),
                    self.dimension
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn metadata(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.iter().map(|entry| &entry.metadata)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(FinError::consistency(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use finlens_core::HashEmbedder;
    use tempfile::tempdir;

    fn entry(doc: &str, chunk: &str, text: &str, page: u32) -> MetadataEntry {
        MetadataEntry::new(doc, chunk, text, Some(page))
    }

    #[test]
    fn empty_add_is_a_noop_without_writes() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("vectors");
        let mut index = VectorIndex::open(&base, HashEmbedder::default()).unwrap();
        assert_eq!(index.add(&[], Vec::new()).unwrap(), 0);
        assert_eq!(index.len(), 0);
        assert!(!index.paths().index.exists());
        assert!(!index.paths().metadata.exists());
    }

    #[test]
    fn mismatched_batch_is_rejected_before_embedding() {
        let dir = tempdir().unwrap();
        let mut index = VectorIndex::open(dir.path().join("v"), HashEmbedder::default()).unwrap();
        let err = index
            .add(&["one".to_string(), "two".to_string()], vec![entry("d", "c", "one", 1)])
            .unwrap_err();
        assert!(matches!(err, FinError::Consistency(_)));
        assert!(index.is_empty());
    }

    #[test]
    fn exact_text_is_its_own_nearest_neighbour() {
        let dir = tempdir().unwrap();
        let mut index = VectorIndex::open(dir.path().join("v"), HashEmbedder::default()).unwrap();
        let texts = vec![
            "quarterly revenue rose sharply".to_string(),
            "litigation risk remains elevated".to_string(),
        ];
        index
            .add(
                &texts,
                vec![entry("a", "a1", &texts[0], 1), entry("a", "a2", &texts[1], 2)],
            )
            .unwrap();
        let hits = index.search("litigation risk remains elevated", 1, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.chunk_id, "a2");
        assert_eq!(hits[0].content(), "litigation risk remains elevated");
        assert!(hits[0].score.abs() < 1e-6);
    }

    #[test]
    fn zero_k_returns_nothing() {
        let dir = tempdir().unwrap();
        let mut index = VectorIndex::open(dir.path().join("v"), HashEmbedder::default()).unwrap();
        index
            .add(&["text".to_string()], vec![entry("a", "a1", "text", 1)])
            .unwrap();
        assert!(index.search("text", 0, None).unwrap().is_empty());
    }

    #[test]
    fn extra_metadata_fields_survive_serialization() {
        let meta = entry("a", "a1", "text", 3).with_extra("section", Value::from("mdna"));
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["section"], "mdna");
        assert_eq!(json["page"], 3);
        let back: MetadataEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
