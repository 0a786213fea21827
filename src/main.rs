use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Table};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use paper_scout::config::load_config;
use paper_scout::limiter::LimiterRegistry;
use paper_scout::metrics::{parse_ground_truth, AggregatedMetrics, BenchmarkHarness};
use paper_scout::models::{EnhancedSearchResult, Paper, SearchOptions};
use paper_scout::pipeline::EnhancedSearchPipeline;
use paper_scout::providers::ProviderRegistry;

/// Paper Scout - search academic papers across multiple providers
#[derive(Parser, Debug)]
#[command(name = "paper-scout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search academic papers across multiple research APIs", long_about = None)]
struct Cli {
    /// Enable verbose logging (-v, -vv for more)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search across all enabled providers
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(long, short, default_value_t = 20)]
        limit: usize,

        /// Skip query expansion even when a collaborator is wired in
        #[arg(long)]
        no_expansion: bool,

        /// Skip reranking even when a collaborator is wired in
        #[arg(long)]
        no_rerank: bool,

        /// Query only the baseline provider
        #[arg(long)]
        single_provider: bool,
    },

    /// Compare a plain baseline search against the full pipeline
    Compare {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },

    /// Benchmark baseline vs enhanced retrieval against a ground-truth set
    Benchmark {
        /// TOML file of labeled queries ([[case]] tables)
        file: PathBuf,

        /// Results evaluated per query
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("paper_scout={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    let registry = Arc::new(ProviderRegistry::from_config(&config));
    let limiters = Arc::new(LimiterRegistry::new());
    let pipeline = EnhancedSearchPipeline::new(registry, limiters);

    match cli.command {
        Commands::Search {
            query,
            limit,
            no_expansion,
            no_rerank,
            single_provider,
        } => {
            let options = SearchOptions {
                limit,
                use_expansion: !no_expansion,
                use_reranking: !no_rerank,
                parallel_queries: config.pipeline.parallel_queries,
                deduplicate_by_doi: true,
                multi_provider: !single_provider,
            };
            let result = pipeline.search(&query, options).await?;
            print_search_result(&result, cli.output)?;
        }
        Commands::Compare { query, limit } => {
            let report = pipeline.compare_search(&query, limit).await?;
            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => {
                    println!(
                        "basic: {} papers, enhanced: {} papers",
                        report.basic.len(),
                        report.enhanced.papers.len()
                    );
                    println!(
                        "overlap: {} DOIs ({:.1}%), unique to enhanced: {}, rank changes: {}",
                        report.comparison.overlap_count,
                        report.comparison.overlap_pct,
                        report.comparison.unique_to_enhanced,
                        report.comparison.rank_changes
                    );
                    print_search_result(&report.enhanced, cli.output)?;
                }
            }
        }
        Commands::Benchmark { file, limit } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let cases = parse_ground_truth(&text).context("invalid ground-truth file")?;
            anyhow::ensure!(!cases.is_empty(), "ground-truth file contains no cases");

            let harness = BenchmarkHarness::new(&pipeline, limit);
            let report = harness.run(&cases).await?;

            match cli.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => {
                    println!("{}", metrics_table(&report.basic, &report.enhanced));
                }
            }
        }
    }

    Ok(())
}

fn print_search_result(result: &EnhancedSearchResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Table => {
            println!("{}", papers_table(&result.papers));
            println!(
                "{} results ({} found, {} duplicates removed, reranked: {}, {} ms)",
                result.papers.len(),
                result.metadata.total_found,
                result.metadata.deduplicated,
                result.metadata.reranked,
                result.metadata.latency_ms
            );
        }
    }
    Ok(())
}

fn papers_table(papers: &[Paper]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["#", "Title", "Year", "DOI", "Source", "Citations"]);

    for (i, paper) in papers.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(truncate(&paper.title, 60)),
            Cell::new(paper.year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(paper.doi.as_deref().unwrap_or("-")),
            Cell::new(&paper.source),
            Cell::new(
                paper
                    .citation_count
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }

    table
}

fn metrics_table(basic: &AggregatedMetrics, enhanced: &AggregatedMetrics) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Metric", "Basic", "Enhanced"]);

    let rows: [(&str, f64, f64); 6] = [
        ("precision", basic.precision, enhanced.precision),
        ("recall", basic.recall, enhanced.recall),
        ("f1", basic.f1, enhanced.f1),
        ("mrr", basic.mrr, enhanced.mrr),
        ("hit rate", basic.hit_rate, enhanced.hit_rate),
        ("avg latency (ms)", basic.avg_latency_ms, enhanced.avg_latency_ms),
    ];
    for (label, b, e) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(format!("{b:.3}")),
            Cell::new(format!("{e:.3}")),
        ]);
    }
    table.add_row(vec![
        Cell::new("queries"),
        Cell::new(basic.count),
        Cell::new(enhanced.count),
    ]);

    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
