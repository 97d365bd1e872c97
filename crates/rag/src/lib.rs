pub mod config;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod store;

pub use config::{EmbeddingProvider, EmbeddingSettings, FinlensConfig, DEFAULT_CONFIG};
pub use embedding::{EmbeddingBackend, EmbeddingClient, OpenAiEmbeddingClient};
pub use engine::{
    heuristic_summary, AnalysisEngine, Answer, Citation, Report, ReportOutcome, ADVISORY_ANSWER,
};
pub use ingest::{ingest_chunks, IngestSummary};
pub use store::{ChunkInsert, ChunkStore, DocumentRecord, IngestStatus, SqliteStore, StoredChunk};
