use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use finlens_core::{
    Embedder, FinError, HashEmbedder, MetricKind, MetricStrategy, Metrics, ParsedChunk, Result,
};
use finlens_index::{MetadataEntry, VectorIndex};
use finlens_rag::{
    ingest_chunks, AnalysisEngine, ChunkStore, IngestStatus, ReportOutcome, SqliteStore,
    ADVISORY_ANSWER,
};
use tempfile::{tempdir, TempDir};

struct CountingExtractor(Rc<Cell<usize>>);

impl MetricStrategy for CountingExtractor {
    fn extract(&self, _text: &str) -> Metrics {
        self.0.set(self.0.get() + 1);
        Metrics::unavailable()
    }
}

struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn dimensions(&self) -> usize {
        8
    }

    fn model_name(&self) -> &str {
        "broken"
    }

    fn embed_batch(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(FinError::Embedding("model offline".to_string()))
    }
}

fn engine(dir: &TempDir) -> AnalysisEngine<SqliteStore> {
    let store = SqliteStore::open_in_memory().unwrap();
    let index = VectorIndex::open(dir.path().join("vector_index"), HashEmbedder::default()).unwrap();
    AnalysisEngine::new(store, index)
}

fn seed(engine: &AnalysisEngine<SqliteStore>, doc_id: &str, chunks: &[(&str, u32)]) {
    engine.store().add_document(doc_id, &format!("{doc_id}.pdf")).unwrap();
    for (i, (content, page)) in chunks.iter().enumerate() {
        engine
            .store()
            .add_chunk(&format!("{doc_id}-{i}"), doc_id, content, *page)
            .unwrap();
    }
}

#[test]
fn report_for_unknown_document_is_not_found_without_extraction() {
    let dir = tempdir().unwrap();
    let calls = Rc::new(Cell::new(0));
    let engine = engine(&dir).with_extractor(Box::new(CountingExtractor(calls.clone())));

    let outcome = engine.generate_report("missing", "summary").unwrap();
    assert!(outcome.report().is_none());
    assert_eq!(outcome.error(), Some("Document missing not found."));
    assert_eq!(calls.get(), 0);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["error"], "Document missing not found.");
}

#[test]
fn report_combines_metrics_summary_and_risk_sentences() {
    let dir = tempdir().unwrap();
    let engine = engine(&dir);
    seed(
        &engine,
        "acme-2024",
        &[
            ("Acme Corp annual report. Revenue of $12,345.67 for fiscal 2024.", 1),
            ("Net income: 1,200. Earnings per share 2.31 was ahead of plan.", 2),
            ("Currency risk remains a concern for Europe. We expect growth next year. Ok.", 3),
        ],
    );

    let outcome = engine.generate_report("acme-2024", "full").unwrap();
    let report = match outcome {
        ReportOutcome::Ready(report) => report,
        ReportOutcome::NotFound { error, .. } => panic!("unexpected: {error}"),
    };
    assert_eq!(report.doc_id, "acme-2024");
    assert_eq!(report.report_type, "full");
    assert_eq!(report.metrics.get(MetricKind::Revenue).as_str(), "12,345.67");
    assert_eq!(report.metrics.get(MetricKind::NetIncome).as_str(), "1,200");
    assert_eq!(report.metrics.get(MetricKind::Eps).as_str(), "2.31");
    assert_eq!(report.metrics.get(MetricKind::Expenses).as_str(), "N/A");
    assert!(report.summary.starts_with("Acme Corp annual report. Revenue"));
    assert!(report.summary.contains("2024.\nNet income"));
    assert!(report.summary.ends_with("..."));
    assert_eq!(
        report.risks_and_drivers,
        vec![
            "Currency risk remains a concern for Europe.".to_string(),
            "We expect growth next year.".to_string(),
        ]
    );

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["type"], "full");
    assert_eq!(json["metrics"]["expenses"], "N/A");
}

#[test]
fn ingest_then_analyze_and_ask() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("acme_q3.txt");
    fs::write(
        &input,
        "Acme quarterly update.\n\nRevenue of $4,500 rose on strong demand.\n\n\
         Guidance for the next quarter was lowered due to supply risk.",
    )
    .unwrap();
    let mut engine = engine(&dir);

    let summary = engine.ingest_file(&input, None).unwrap();
    assert_eq!(summary.doc_id, "acme_q3");
    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.status, IngestStatus::Indexed);
    assert_eq!(engine.index().len(), 3);
    assert_eq!(engine.store().get_all_chunks("acme_q3").unwrap().len(), 3);
    let doc = engine.store().get_document("acme_q3").unwrap().unwrap();
    assert_eq!(doc.status, IngestStatus::Indexed);

    let report = engine.generate_report("acme_q3", "summary").unwrap();
    let report = report.report().unwrap();
    assert_eq!(report.metrics.get(MetricKind::Revenue).as_str(), "4,500");

    let answer = engine
        .ask_question("Guidance for the next quarter was lowered due to supply risk.", Some("acme_q3"))
        .unwrap();
    assert_eq!(answer.answer, ADVISORY_ANSWER);
    assert_eq!(answer.citations.len(), 3);
    let top = &answer.citations[0];
    assert_eq!(
        top.text,
        "...Guidance for the next quarter was lowered due to supply risk...."
    );
    assert_eq!(top.page, Some(3));
    assert!(top.score.abs() < 1e-6);
    assert!(answer.citations.windows(2).all(|w| w[0].score <= w[1].score));

    let none = engine.ask_question("revenue", Some("other-doc")).unwrap();
    assert!(none.citations.is_empty());
}

#[test]
fn citations_truncate_long_chunks() {
    let dir = tempdir().unwrap();
    let mut engine = engine(&dir);
    let long = "word ".repeat(100);
    let input = dir.path().join("long.md");
    fs::write(&input, &long).unwrap();
    engine.ingest_file(&input, Some("long")).unwrap();

    let answer = engine.ask_question("word", None).unwrap();
    assert_eq!(answer.citations.len(), 1);
    let text = &answer.citations[0].text;
    assert_eq!(text.chars().count(), 206);
    assert!(text.starts_with("...word word"));
    assert!(text.ends_with("..."));
}

#[test]
fn unsupported_input_writes_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("deck.pptx");
    fs::write(&input, "binary").unwrap();
    let mut engine = engine(&dir);

    let err = engine.ingest_file(&input, None).unwrap_err();
    assert!(matches!(err, FinError::UnsupportedInput(_)));
    assert!(engine.store().get_document("deck").unwrap().is_none());
    assert!(engine.index().is_empty());
}

#[test]
fn index_failure_rolls_back_the_store() {
    let dir = tempdir().unwrap();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let mut index = VectorIndex::open(dir.path().join("broken"), BrokenEmbedder).unwrap();

    let chunks = vec![ParsedChunk {
        page: 1,
        content: "Revenue of $10".to_string(),
    }];
    let err = ingest_chunks(&mut store, &mut index, "doc", "doc.txt", chunks).unwrap_err();
    assert!(matches!(err, FinError::Embedding(_)));
    assert!(store.get_document("doc").unwrap().is_none());
    assert!(store.get_all_chunks("doc").unwrap().is_empty());
    assert!(index.is_empty());
}

#[test]
fn duplicate_document_id_leaves_index_untouched() {
    let dir = tempdir().unwrap();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let mut index = VectorIndex::open(dir.path().join("v"), HashEmbedder::default()).unwrap();
    let chunk = || {
        vec![ParsedChunk {
            page: 1,
            content: "text".to_string(),
        }]
    };
    ingest_chunks(&mut store, &mut index, "doc", "a.txt", chunk()).unwrap();
    assert!(ingest_chunks(&mut store, &mut index, "doc", "b.txt", chunk()).is_err());
    assert_eq!(index.len(), 1);
    assert_eq!(store.get_all_chunks("doc").unwrap().len(), 1);
    let meta: Vec<&MetadataEntry> = index.metadata().collect();
    assert_eq!(meta[0].doc_id, "doc");
}
