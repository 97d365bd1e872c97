use std::path::Path;

use finlens_core::{
    select_sentences, DocumentParser, MetricStrategy, Metrics, PatternExtractor, Result,
    RISK_KEYWORDS,
};
use finlens_index::{SearchHit, VectorIndex};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::FinlensConfig;
use crate::embedding::EmbeddingClient;
use crate::ingest::{ingest_chunks, IngestSummary};
use crate::store::{ChunkStore, SqliteStore};

pub const SUMMARY_CHARS: usize = 500;
pub const CITATION_CHARS: usize = 200;
pub const ANSWER_TOP_K: usize = 3;
pub const ELLIPSIS: &str = "...";
pub const ADVISORY_ANSWER: &str =
    "Context retrieved (LLM integration required for synthesis). Top matches:";

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub doc_id: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub metrics: Metrics,
    pub summary: String,
    pub risks_and_drivers: Vec<String>,
}

/// Result of a report request. A document without chunks is an expected
/// outcome, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReportOutcome {
    Ready(Report),
    NotFound { doc_id: String, error: String },
}

impl ReportOutcome {
    fn not_found(doc_id: &str) -> Self {
        ReportOutcome::NotFound {
            doc_id: doc_id.to_string(),
            error: format!("Document {doc_id} not found."),
        }
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            ReportOutcome::Ready(report) => Some(report),
            ReportOutcome::NotFound { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ReportOutcome::Ready(_) => None,
            ReportOutcome::NotFound { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub text: String,
    pub page: Option<u32>,
    /// Squared L2 distance of the chunk from the query; lower is closer.
    pub score: f32,
}

impl From<&SearchHit> for Citation {
    fn from(hit: &SearchHit) -> Self {
        Citation {
            text: format!(
                "{ELLIPSIS}{}{ELLIPSIS}",
                truncate_chars(hit.content(), CITATION_CHARS)
            ),
            page: hit.metadata.page,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub answer: String,
    pub citations: Vec<Citation>,
}

pub struct AnalysisEngine<S> {
    store: S,
    index: VectorIndex,
    parser: DocumentParser,
    extractor: Box<dyn MetricStrategy>,
}

impl<S: ChunkStore> AnalysisEngine<S> {
    pub fn new(store: S, index: VectorIndex) -> Self {
        Self {
            store,
            index,
            parser: DocumentParser::new(),
            extractor: Box::new(PatternExtractor::new()),
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn MetricStrategy>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Builds a report from every stored chunk of `doc_id`. `report_type` is
    /// carried through unchanged.
    pub fn generate_report(&self, doc_id: &str, report_type: &str) -> Result<ReportOutcome> {
        let chunks = self.store.get_all_chunks(doc_id)?;
        if chunks.is_empty() {
            debug!(doc_id, "no chunks stored for document");
            return Ok(ReportOutcome::not_found(doc_id));
        }
        let full_text = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let report = Report {
            doc_id: doc_id.to_string(),
            report_type: report_type.to_string(),
            metrics: self.extractor.extract(&full_text),
            summary: heuristic_summary(&full_text),
            risks_and_drivers: select_sentences(&full_text, &RISK_KEYWORDS),
        };
        info!(
            doc_id,
            chunks = chunks.len(),
            sentences = report.risks_and_drivers.len(),
            "generated report"
        );
        Ok(ReportOutcome::Ready(report))
    }

    /// Returns the closest stored chunks as citations. No answer text is
    /// synthesised.
    pub fn ask_question(&self, query: &str, doc_id: Option<&str>) -> Result<Answer> {
        let hits = self.index.search(query, ANSWER_TOP_K, doc_id)?;
        debug!(query, hits = hits.len(), "retrieved context");
        Ok(Answer {
            query: query.to_string(),
            answer: ADVISORY_ANSWER.to_string(),
            citations: hits.iter().map(Citation::from).collect(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

impl AnalysisEngine<SqliteStore> {
    /// Opens the store and index named by `config`, creating the storage
    /// directory if needed. Fails if the embedding model cannot be loaded.
    pub fn open(config: &FinlensConfig) -> Result<Self> {
        config.ensure_storage_dir()?;
        let embedder = EmbeddingClient::from_settings(&config.embedding)?;
        let index = VectorIndex::open(config.index_base(), embedder)?;
        let store = SqliteStore::open(config.db_path())?;
        Ok(Self::new(store, index))
    }

    /// Parses `path` and writes it to both the store and the index. The
    /// document id defaults to the file stem.
    pub fn ingest_file(&mut self, path: &Path, doc_id: Option<&str>) -> Result<IngestSummary> {
        let chunks = self.parser.parse_file(path)?;
        let doc_id = match doc_id {
            Some(id) => id.to_string(),
            None => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("document")
                .to_string(),
        };
        let filename = path.display().to_string();
        ingest_chunks(&mut self.store, &mut self.index, &doc_id, &filename, chunks)
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

/// First [`SUMMARY_CHARS`] characters followed by an ellipsis.
pub fn heuristic_summary(text: &str) -> String {
    format!("{}{ELLIPSIS}", truncate_chars(text, SUMMARY_CHARS))
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_exact_prefix_plus_ellipsis() {
        let text: String = (0..1000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let summary = heuristic_summary(&text);
        assert_eq!(summary.len(), 503);
        assert_eq!(summary.as_bytes()[..500], text.as_bytes()[..500]);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn short_text_is_kept_whole() {
        assert_eq!(heuristic_summary("Brief."), "Brief....");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "€".repeat(300);
        assert_eq!(truncate_chars(&text, 200).chars().count(), 200);
    }
}
