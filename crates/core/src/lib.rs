mod embedding;
mod error;
mod metrics;
mod parser;
mod sentences;

pub use embedding::{Embedder, HashEmbedder, HashEmbedderConfig};
pub use error::{FinError, Result};
pub use metrics::{MetricKind, MetricStrategy, MetricValue, Metrics, PatternExtractor, NOT_AVAILABLE};
pub use parser::{DocumentParser, ParsedChunk};
pub use sentences::{
    select_sentences, split_sentences, MAX_SENTENCES, MIN_SENTENCE_CHARS, RISK_KEYWORDS,
};
