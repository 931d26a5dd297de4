//! herald-replay
//!
//! Rebuilds the ranking state from a JSON-lines export of the article store
//! and prints the top-ranked articles for a time window:
//! 1. Loads configuration (file, environment)
//! 2. Replays every record through the ingestion processor
//! 3. Recomputes scores on the blocking pool
//! 4. Runs one ranking query and renders the result

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use herald_common::config::{BlendWeights, RankingConfig};
use herald_common::telemetry;
use herald_common::VERSION;
use herald_ingestion::record::parse_timestamp;
use herald_ingestion::{replay_file, IngestionProcessor, IngestionReport};
use herald_ranking::{RankFilters, RankQuery, RankedArticle, RankingEngine, RecomputeOutcome, TimeWindow};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Rank scientific articles by citation influence, recency and author influence
///
/// Examples:
///   herald-replay -i articles.jsonl                       # Top 10 over all time
///   herald-replay -i articles.jsonl --from 2024-01-01 -n 25
///   herald-replay -i articles.jsonl --topic cs.lg --weights base:0.7,decay:0.2,author:0.1
#[derive(Parser, Debug)]
#[command(name = "herald-replay")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// JSON-lines file with one article record per line
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Window start (RFC 3339 or YYYY-MM-DD); unbounded when omitted
    #[arg(long, value_parser = parse_time)]
    from: Option<DateTime<Utc>>,

    /// Window end (RFC 3339 or YYYY-MM-DD); unbounded when omitted
    #[arg(long, value_parser = parse_time)]
    to: Option<DateTime<Utc>>,

    /// Number of results (defaults to query.default_top_k)
    #[arg(short = 'n', long)]
    top: Option<usize>,

    /// Restrict to a source; repeatable
    #[arg(long)]
    source: Vec<String>,

    /// Restrict to a topic; repeatable
    #[arg(long)]
    topic: Vec<String>,

    /// Include withdrawn articles
    #[arg(long)]
    include_withdrawn: bool,

    /// Blend weights, e.g. base:0.5,decay:0.3,author:0.2
    #[arg(short, long)]
    weights: Option<String>,

    /// Decay reference time (defaults to the window end, or now when unbounded)
    #[arg(long, value_parser = parse_time)]
    as_of: Option<DateTime<Utc>>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
    Simple,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    ingestion: &'a IngestionReport,
    snapshot_version: u64,
    snapshot_computed_at: DateTime<Utc>,
    results: &'a [RankedArticle],
}

fn parse_time(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_timestamp(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RankingConfig::from_file(&path.to_string_lossy()),
        None => RankingConfig::load(),
    }
    .context("failed to load configuration")?;

    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }

    telemetry::init_tracing(&config.observability);
    telemetry::init_metrics(&config.observability)?;

    info!(
        service = %config.observability.service_name,
        "Starting herald-replay v{}",
        VERSION
    );

    let weights = cli
        .weights
        .as_deref()
        .map(BlendWeights::parse)
        .transpose()
        .context("invalid --weights")?;

    let engine = Arc::new(RankingEngine::new(config)?);

    let mut processor = IngestionProcessor::new(Arc::clone(&engine)).with_auto_recompute(false);
    let report = replay_file(&mut processor, &cli.input)
        .with_context(|| format!("failed to replay {}", cli.input.display()))?;

    for rejection in &report.rejections {
        warn!(
            position = ?rejection.position,
            record_id = ?rejection.record_id,
            code = rejection.error.code.as_label(),
            "{}",
            rejection.error.message
        );
    }

    match engine.spawn_recompute().await?? {
        RecomputeOutcome::Published { warning: Some(w), .. } => warn!("{}", w),
        outcome => info!(?outcome, "Scores ready"),
    }
    let snapshot = engine.wait_for_version(engine.graph_version()).await?;

    let window = TimeWindow::new(
        cli.from.unwrap_or(DateTime::<Utc>::MIN_UTC),
        cli.to.unwrap_or(DateTime::<Utc>::MAX_UTC),
    )?;
    let filters = RankFilters {
        sources: cli.source.iter().cloned().collect(),
        topics: cli.topic.iter().map(|t| t.trim().to_lowercase()).collect(),
        include_withdrawn: cli.include_withdrawn,
    };

    let mut query = RankQuery::new(window).filters(filters);
    if let Some(top) = cli.top {
        query = query.top_k(top);
    }
    if let Some(weights) = weights {
        query = query.weights(weights);
    }
    query = query.as_of(cli.as_of.or(cli.to).unwrap_or_else(Utc::now));

    let results = engine.rank(&query)?;

    match cli.output {
        OutputFormat::Json => {
            let output = JsonOutput {
                ingestion: &report,
                snapshot_version: snapshot.version(),
                snapshot_computed_at: snapshot.computed_at(),
                results: &results,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => print_table(&results, &report),
        OutputFormat::Simple => {
            for r in &results {
                println!("{}\t{:.6}", r.article_id, r.composite_score);
            }
        }
    }

    Ok(())
}

fn print_table(results: &[RankedArticle], report: &IngestionReport) {
    println!(
        "{} articles, {} citations ingested ({} rejected, {} pending)",
        report.articles_added,
        report.citations_added,
        report.rejections.len(),
        report.pending
    );
    println!();
    println!(
        "{:>4}  {:>8}  {:>8}  {:>8}  {:>8}  {:<10}  {}",
        "RANK", "SCORE", "BASE", "DECAY", "AUTHOR", "PUBLISHED", "ID"
    );
    for r in results {
        println!(
            "{:>4}  {:>8.4}  {:>8.4}  {:>8.4}  {:>8.4}  {:<10}  {}",
            r.rank_position,
            r.composite_score,
            r.score.base_influence,
            r.score.decay_weight,
            r.score.author_influence,
            r.published_at.format("%Y-%m-%d"),
            r.article_id
        );
    }
}
