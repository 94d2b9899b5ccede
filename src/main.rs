mod config;
mod error;
mod explain;
mod heuristics;
mod llm_extract;
mod normalize;
mod processor;
mod record;
mod report;
mod risk;
mod simulation;
mod stats;
mod store;
mod text_extract;

use clap::{Parser, Subcommand};
use config::{Config, DEFAULT_CONFIG_PATH};
use llm_extract::{FieldInference, LlmExtractor};
use processor::InvoiceProcessor;
use record::InvoiceRecord;
use simulation::{IncotermOverride, UNCHANGED};
use stats::{FeedbackSink, MemoryStats, Outcome, StatsSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::StatsStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "export-risk",
    version,
    about = "Pre-shipment customs risk check for commercial export invoices"
)]
struct Cli {
    /// TOML config file; defaults apply when it does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Keep counters and feedback in memory instead of the SQLite store.
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract fields from an invoice PDF and assess it.
    Analyze {
        pdf: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Assess an invoice record JSON file (or a saved `analyze --json` report).
    Assess {
        record: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Re-score a record with a different total and/or trade term.
    Simulate {
        record: PathBuf,
        /// New invoice total; 0 leaves the total unchanged.
        #[arg(long, allow_negative_numbers = true)]
        total: Option<f64>,
        /// New trade term, or UNCHANGED.
        #[arg(long, default_value = UNCHANGED)]
        incoterm: String,
        #[arg(long)]
        json: bool,
    },
    /// Record what happened to a shipment after it left.
    Feedback { invoice_id: String, outcome: Outcome },
    /// Show aggregate counters.
    Stats,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config)?;
    init_tracing(&cfg.logging.level);

    if cli.ephemeral {
        run(cli, &cfg, Arc::new(MemoryStats::default())).await
    } else {
        let store = StatsStore::open(&cfg.db_path)?;
        run(cli, &cfg, Arc::new(store)).await
    }
}

async fn run<S>(cli: Cli, cfg: &Config, store: Arc<S>) -> Result<(), Box<dyn std::error::Error>>
where
    S: StatsSink + FeedbackSink + 'static,
{
    let mut processor = InvoiceProcessor::new(store.clone());
    if let Some(extractor) = LlmExtractor::from_config(&cfg.llm)? {
        info!(model = %extractor.name(), "Field inference enabled");
        processor = processor.with_inference(Box::new(extractor));
    }

    match cli.command {
        Command::Analyze { pdf, json } => {
            let bytes = std::fs::read(&pdf)?;
            info!(path = %pdf.display(), bytes = bytes.len(), "Analyzing invoice");
            let report = processor.process_pdf(&bytes).await;
            if json {
                println!("{}", report::to_json(&report)?);
            } else {
                print!("{}", report::render_processed(&report));
            }
        }
        Command::Assess { record, json } => {
            let invoice = load_record(&record)?;
            let assessment = processor.engine().assess(&invoice);
            if json {
                println!("{}", report::to_json(&assessment)?);
            } else {
                print!("{}", report::render_assessment(&assessment));
                println!("\n{}", explain::explain(&invoice));
            }
        }
        Command::Simulate {
            record,
            total,
            incoterm,
            json,
        } => {
            let base = load_record(&record)?;
            let new_incoterm: IncotermOverride = incoterm.parse()?;
            let simulation =
                simulation::simulate(processor.engine(), &base, total, &new_incoterm);
            if json {
                println!("{}", report::to_json(&simulation)?);
            } else {
                print!("{}", report::render_simulation(&simulation));
            }
        }
        Command::Feedback {
            invoice_id,
            outcome,
        } => {
            store.record_outcome(&invoice_id, outcome)?;
            println!("Outcome recorded for {invoice_id}: {}", outcome.label());
            if let Some(score) = store.last_score(&invoice_id)? {
                println!("Last assessed hold probability: {score}%");
            }
            let history = store.outcomes(&invoice_id)?;
            if history.len() > 1 {
                let labels: Vec<&str> = history.iter().map(Outcome::label).collect();
                println!("History: {}", labels.join(" -> "));
            }
        }
        Command::Stats => {
            print!("{}", report::render_stats(&store.snapshot()?));
        }
    }

    Ok(())
}

/// Read an `InvoiceRecord` from JSON. A full `analyze --json` report is
/// accepted too; its `invoice_data` is used.
fn load_record(path: &Path) -> Result<InvoiceRecord, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_record(&content)?)
}

fn parse_record(content: &str) -> serde_json::Result<InvoiceRecord> {
    let mut value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(data) = value.get_mut("invoice_data") {
        value = data.take();
    }
    serde_json::from_value(value)
}
