//! ontorag CLI
//!
//! - `ingest`: chunk documents, extract typed facts, grow the ontology
//! - `query` / `repl`: answer questions from the graph
//! - `ontology show` / `stats`: inspect on-disk state

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ontorag_core::{Config, DocumentReport, IngestSummary, QueryAnswer};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod repl;
mod workspace;

use workspace::Workspace;

#[derive(Parser)]
#[command(name = "ontorag")]
#[command(
    author,
    version,
    about = "Ontology-guided knowledge graph construction and retrieval"
)]
struct Cli {
    /// JSON config file; `ONTORAG_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents into the graph.
    ///
    /// With no paths, every new document in the configured data directory
    /// is ingested. Documents already in the run log are skipped.
    Ingest {
        /// Files or directories to ingest
        paths: Vec<PathBuf>,
    },

    /// Answer a single question.
    Query {
        question: String,
        /// Override the number of retrieved chunks
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the composed context before the answer
        #[arg(long)]
        show_context: bool,
        /// Emit the answer and its evidence as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask questions interactively.
    Repl,

    /// Inspect the ontology.
    Ontology {
        #[command(subcommand)]
        command: OntologyCommands,
    },

    /// Node and edge counts of the graph.
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum OntologyCommands {
    /// Print the known entity and relation types.
    Show {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ontorag=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Ingest { paths } => {
            let ws = Workspace::open(config)?;
            rt.block_on(cmd_ingest(&ws, &paths))?;
        }
        Commands::Query {
            question,
            top_k,
            show_context,
            json,
        } => {
            if let Some(k) = top_k {
                config.top_k = k;
                config.validate()?;
            }
            let ws = Workspace::open(config)?;
            let engine = ws.query_engine()?;
            let answer = rt.block_on(engine.ask(&question))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer, show_context);
            }
        }
        Commands::Repl => {
            let ws = Workspace::open(config)?;
            let engine = ws.query_engine()?;
            repl::cmd_repl(&rt, &engine)?;
        }
        Commands::Ontology { command } => match command {
            OntologyCommands::Show { json } => {
                let ws = Workspace::open(config)?;
                let ontology = ws.ontology()?.lock().snapshot();
                if json {
                    println!("{}", serde_json::to_string_pretty(&ontology)?);
                } else {
                    println!("{}", "Entity types".bold());
                    for t in &ontology.entity_types {
                        println!("  {t}");
                    }
                    println!("{}", "Relation types".bold());
                    for t in &ontology.relation_types {
                        println!("  {t}");
                    }
                }
            }
        },
        Commands::Stats { json } => {
            let ws = Workspace::open(config)?;
            let stats = ws.store.read(|db| db.stats());
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{} {}", "graph:".bold(), ws.config.graph_path().display());
                println!("  documents  {}", stats.documents);
                println!("  chunks     {}", stats.chunks);
                println!("  entities   {}", stats.entities);
                println!("  facts      {}", stats.edges);
                println!("  mentions   {}", stats.mentions);
                for (label, n) in &stats.labels {
                    println!("    {label:<24} {n}");
                }
                for (rel, n) in &stats.rel_types {
                    println!("    {rel:<24} {n}");
                }
            }
        }
    }
    Ok(())
}

async fn cmd_ingest(ws: &Workspace, paths: &[PathBuf]) -> Result<()> {
    let pipeline = ws.ingestion_pipeline()?;
    let mut runlog = ws.run_log()?;
    let targets = if paths.is_empty() {
        vec![ws.config.data_dir.clone()]
    } else {
        paths.to_vec()
    };

    let mut summary = IngestSummary::default();
    for target in &targets {
        if target.is_dir() {
            summary.merge(pipeline.ingest_dir(target, &mut runlog).await?);
        } else if target.is_file() {
            let result = pipeline.ingest_file(target, &mut runlog).await;
            summary.record(target, result);
        } else {
            return Err(anyhow!("no such file or directory: {}", target.display()));
        }
    }

    for report in &summary.reports {
        print_report(report);
    }
    for name in &summary.skipped {
        println!("{} {name} (already processed)", "skip".yellow().bold());
    }
    for (name, error) in &summary.failed {
        eprintln!("{} {name}: {error}", "error:".red().bold());
    }
    if !summary.failed.is_empty() {
        return Err(anyhow!("{} document(s) failed", summary.failed.len()));
    }
    Ok(())
}

fn print_report(report: &DocumentReport) {
    let status = if report.is_complete() {
        "ok".green().bold()
    } else {
        "partial".yellow().bold()
    };
    println!(
        "{status} {}: {} chunks ({} failed), {} facts written, {} rejected",
        report.doc_id,
        report.chunks,
        report.chunks_failed,
        report.triplets_written,
        report.triplets_rejected
    );
    if !report.new_entity_types.is_empty() {
        let types: Vec<&str> = report.new_entity_types.iter().map(|s| s.as_str()).collect();
        println!("  new entity types: {}", types.join(", "));
    }
    if !report.new_relation_types.is_empty() {
        let types: Vec<&str> = report.new_relation_types.iter().map(|s| s.as_str()).collect();
        println!("  new relation types: {}", types.join(", "));
    }
}

pub(crate) fn print_answer(answer: &QueryAnswer, show_context: bool) {
    if show_context && !answer.context.is_empty() {
        println!("{}", "Context".bold());
        println!("{}\n", answer.context);
    }
    println!("{}", answer.answer);
    if !answer.evidence.chunks.is_empty() {
        let sources: Vec<&str> = answer
            .evidence
            .chunks
            .iter()
            .map(|c| c.chunk_id.as_str())
            .collect();
        println!("{} {}", "sources:".dimmed(), sources.join(", ").dimmed());
    }
}
