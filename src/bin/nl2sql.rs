//! NL2SQL CLI
//!
//! Ask questions about a relational database in natural language.

use anyhow::Context;
use clap::{Parser, Subcommand};
use percolate_nl2sql::database::{ExecutionOutcome, QueryExecutor};
use percolate_nl2sql::index::SchemaIndex;
use percolate_nl2sql::otel::{init_tracing, LogFormat};
use percolate_nl2sql::pipeline::{PipelineOrchestrator, ResponseResult, RunReport};
use percolate_nl2sql::schema::builtin_schema;
use percolate_nl2sql::types::normalize_row;
use percolate_nl2sql::{Config, PipelineError};
use serde_json::Value as JsonValue;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// NL2SQL - natural-language questions over a SQL database
#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Answer natural-language questions with generated, self-repairing SQL", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (YAML or JSON)
    #[arg(long, env = "P8_NL2SQL_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    json_logs: bool,

    /// Print the full run trace as JSON after the answer
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question
    Ask {
        /// Question in natural language
        question: String,
    },

    /// Apply tabular rows as described (insert, delete, update)
    Modify {
        /// What to do with the rows
        question: String,

        /// CSV file with a header row, or "-" for stdin
        #[arg(long)]
        data: PathBuf,
    },

    /// Run raw SQL against the configured database
    Query {
        /// SQL statement
        sql: String,
    },

    /// Schema index management
    #[command(subcommand)]
    Index(IndexCommands),
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Embed the built-in schema descriptions and write the collection file
    Build {
        /// Output path (defaults to index.path from config)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the schema descriptions closest to a query
    Search {
        /// Search query
        query: String,

        /// Number of results
        #[arg(long, default_value = "5")]
        top_n: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    init_tracing(format, "percolate_nl2sql=warn");

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let result = match cli.command {
        Commands::Ask { question } => cmd_ask(&config, &question, cli.trace).await,
        Commands::Modify { question, data } => cmd_modify(&config, &question, &data, cli.trace).await,
        Commands::Query { sql } => cmd_query(&config, &sql).await,
        Commands::Index(cmd) => match cmd {
            IndexCommands::Build { output } => cmd_index_build(&config, output).await,
            IndexCommands::Search { query, top_n } => cmd_index_search(&config, &query, top_n).await,
        },
    };

    if let Err(e) = result {
        // Detailed cause goes to the log, the user gets the plain message
        tracing::error!(error = %e, "Command failed");
        match e.downcast_ref::<PipelineError>() {
            Some(err) => eprintln!("✗ {}", err.user_message()),
            None => eprintln!("✗ {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

fn build_orchestrator(config: &Config) -> anyhow::Result<PipelineOrchestrator> {
    let index = config.schema_index()?;
    let model = config.llm_client()?;
    let executor = config.executor();

    Ok(PipelineOrchestrator::new(
        Arc::new(index),
        Arc::new(model),
        Arc::new(executor),
        config.pipeline.clone(),
    ))
}

async fn cmd_ask(config: &Config, question: &str, trace: bool) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let report = orchestrator.run(question).await?;
    print_report(&report, trace)
}

async fn cmd_modify(config: &Config, question: &str, data: &Path, trace: bool) -> anyhow::Result<()> {
    let payload = if data.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(data).with_context(|| format!("Failed to read {}", data.display()))?
    };

    let orchestrator = build_orchestrator(config)?;
    let report = orchestrator.run_with_data(question, &payload).await?;
    print_report(&report, trace)
}

async fn cmd_query(config: &Config, sql: &str) -> anyhow::Result<()> {
    let executor = config.executor();

    match executor.execute(sql).await {
        ExecutionOutcome::Rows { columns, rows } => {
            let rows = rows.iter().map(|row| normalize_row(row)).collect::<Result<Vec<_>, _>>()?;
            print_rows(&columns, &rows);
        }
        ExecutionOutcome::Mutation { status, rows_affected } => {
            println!("✓ {}", status);
            if let Some(n) = rows_affected {
                println!("  Rows affected: {}", n);
            }
        }
        ExecutionOutcome::Failure(failure) => {
            println!("✗ Query failed ({})", failure.kind);
            println!("  {}", failure.message);
        }
    }

    Ok(())
}

async fn cmd_index_build(config: &Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    let path = output.unwrap_or_else(|| config.index_path());
    let embedder = config.embedder()?;
    let provider = embedder.name();

    println!("Building schema index at: {}", path.display());

    let index = SchemaIndex::build(&path, &config.index.collection, builtin_schema(), embedder).await?;

    println!("✓ Schema index built");
    println!("  Collection: {}", index.collection().name);
    println!("  Chunks: {}", index.len());
    println!("  Provider: {} ({} dims)", provider, index.collection().dimensions);

    Ok(())
}

async fn cmd_index_search(config: &Config, query: &str, top_n: usize) -> anyhow::Result<()> {
    let index = config.schema_index()?;
    let hits = index.search(query, top_n).await?;

    if hits.is_empty() {
        println!("✗ No schema entries found");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!("{}. {} {} (distance {:.4})", rank + 1, hit.kind.label(), hit.name, hit.distance);
    }

    Ok(())
}

fn print_report(report: &RunReport, trace: bool) -> anyhow::Result<()> {
    let response = report.response()?;

    if let Some(sql) = &response.final_sql {
        println!("SQL: {}", sql);
        println!();
    }

    match &response.result {
        ResponseResult::Rows(rows) if rows.len() > 1 => {
            print_rows(&response.columns, rows);
            println!();
        }
        ResponseResult::Status(status) => println!("✓ {}", status),
        _ => {}
    }

    println!("{}", response.insight);

    if trace {
        println!();
        println!("{}", serde_json::to_string_pretty(&report.trace)?);
    }

    Ok(())
}

/// Print rows as an aligned grid.
fn print_rows(columns: &[String], rows: &[Vec<JsonValue>]) {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", line(columns));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in &cells {
        println!("{}", line(row));
    }
    println!("({} rows)", rows.len());
}

fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
