use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use finlens_rag::{AnalysisEngine, Answer, FinlensConfig, Report, ReportOutcome, DEFAULT_CONFIG};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "finlens", version = VERSION, about = "Financial report analyst CLI")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a PDF, TXT or MD file into the local store and vector index.
    Ingest {
        input: PathBuf,
        /// Unique document id (default: file stem).
        #[arg(long = "doc-id")]
        doc_id: Option<String>,
    },
    /// Generate an analysis report for a stored document.
    Analyze {
        doc_id: String,
        #[arg(short = 't', long = "type", default_value = "summary")]
        report_type: String,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Retrieve the passages closest to a question.
    Ask {
        query: String,
        #[arg(long = "doc-id")]
        doc_id: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Show the ingestion status of a document.
    Status { doc_id: String },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = FinlensConfig::load(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    debug!(
        db = %config.db_path().display(),
        index = %config.index_base().display(),
        "resolved storage paths"
    );
    let mut engine = AnalysisEngine::open(&config).context("failed to open finlens storage")?;

    match cli.command {
        Commands::Ingest { input, doc_id } => {
            println!("[finlens] Ingesting {}", input.display());
            let summary = engine
                .ingest_file(&input, doc_id.as_deref())
                .with_context(|| format!("ingestion failed for {}", input.display()))?;
            println!(
                "[finlens] Ingestion complete for {} ({} chunks, status {})",
                summary.doc_id, summary.chunks, summary.status
            );
        }
        Commands::Analyze {
            doc_id,
            report_type,
            json,
        } => {
            let outcome = engine.generate_report(&doc_id, &report_type)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                match &outcome {
                    ReportOutcome::Ready(report) => print_report(report)?,
                    ReportOutcome::NotFound { error, .. } => eprintln!("[finlens] Error: {error}"),
                }
            }
        }
        Commands::Ask {
            query,
            doc_id,
            json,
        } => {
            let answer = engine.ask_question(&query, doc_id.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Commands::Status { doc_id } => match engine.store().get_document(&doc_id)? {
            Some(doc) => println!(
                "[finlens] {} ({}) ingested {}: {}",
                doc.id, doc.filename, doc.ingest_date, doc.status
            ),
            None => eprintln!("[finlens] Error: Document {doc_id} not found."),
        },
    }
    engine.close()?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_report(report: &Report) -> Result<()> {
    println!(
        "=== {} | Report for {} ===",
        report.report_type.to_uppercase(),
        report.doc_id
    );
    println!("\nKey Metrics:");
    println!("{}", serde_json::to_string_pretty(&report.metrics)?);
    println!("\nExecutive Summary (Heuristic):");
    println!("{}", report.summary);
    println!("\nRisks & Drivers (Extracted):");
    for item in &report.risks_and_drivers {
        println!("- {item}");
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("Question: {}", answer.query);
    println!("{}", answer.answer);
    for (idx, citation) in answer.citations.iter().enumerate() {
        let page = citation
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        println!("\n--- Citation {} ---", idx + 1);
        println!("{}", citation.text);
        println!("Page: {} | Score: {:.4}", page, citation.score);
    }
}
