//! # assessment-rag CLI
//!
//! Runs each stage of the pipeline:
//!
//!   - `links`: Enumerate the catalog listing into the links file
//!   - `crawl`: Extract every product detail page into the product file
//!   - `index`: Embed the product file into the vector index
//!   - `search`: Query the index, or run a full recommendation
//!   - `serve`: Start the HTTP recommendation API
//!   - `evaluate`: Score a running API against ground truth with Recall@k

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use assessment_rag::crawler::{self, CrawlPaths, CrawlerConfig, ItemOutcome};
use assessment_rag::evaluate::{self, EvalConfig};
use assessment_rag::index::{DEFAULT_INDEX_PATH, Database};
use assessment_rag::indexer::{self, IndexerConfig};
use assessment_rag::model::{
    GEMINI_API_KEY_ENV, GeminiClient, GeminiCompletionModel, GeminiEmbeddingModel,
};
use assessment_rag::recommend::{Recommender, RecommenderOptions};
use assessment_rag::search::{self, SearchOptions};
use assessment_rag::server::{self, AppState};
use assessment_rag::telemetry::{self, TelemetryOptions};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{instrument, warn};

#[derive(Parser)]
#[command(author, version, about = "Crawl, index and recommend assessments from the SHL product catalog", long_about = None)]
struct Cli {
    /// Also write logs to a daily file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enumerate catalog listing pages into the links file
    Links(LinksArgs),

    /// Crawl every product detail page from the links file
    Crawl(CrawlArgs),

    /// Embed crawled products into the vector index
    Index(IndexArgs),

    /// Search the index or recommend assessments for a query
    Search(SearchArgs),

    /// Serve the recommendation API
    Serve(ServeArgs),

    /// Measure Recall@k of a running API
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
struct LinksArgs {
    /// Links file to write
    #[arg(short, long, default_value = "shl_links_with_adaptive.json")]
    output: PathBuf,

    /// Products per listing page
    #[arg(long, default_value = "12")]
    page_size: usize,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Links file to read
    #[arg(short, long, default_value = "shl_links_with_adaptive.json")]
    links: PathBuf,

    /// Product file to write
    #[arg(short, long, default_value = "shl_products_final.json")]
    output: PathBuf,

    /// Checkpoint file
    #[arg(short, long, default_value = "shl_products_final_checkpoint.json")]
    checkpoint: PathBuf,

    /// Maximum fetch attempts per product
    #[arg(short = 'a', long, default_value = "10")]
    max_attempts: u32,

    /// Items between checkpoints
    #[arg(long, default_value = "50")]
    checkpoint_interval: usize,
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// Product file produced by `crawl`
    #[arg(short, long, default_value = "shl_products_final.json")]
    input: PathBuf,

    /// Database path
    #[arg(long, default_value = DEFAULT_INDEX_PATH)]
    database: PathBuf,

    /// Documents per embedding request
    #[arg(short, long, default_value = "32")]
    batch_size: usize,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Job description or query
    #[arg(required = true)]
    query: String,

    /// Limit results
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Database path
    #[arg(short, long, default_value = DEFAULT_INDEX_PATH)]
    database: PathBuf,

    /// Use vector search only (no LLM)
    #[arg(short = 'v', long, default_value = "false")]
    vector_search_only: bool,

    /// LLM model to use for recommendations
    #[arg(short = 'm', long)]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "ASSESSMENT_RAG_BIND", default_value = "127.0.0.1:8000")]
    bind: String,

    /// Database path
    #[arg(short, long, default_value = DEFAULT_INDEX_PATH)]
    database: PathBuf,

    /// LLM model to use for recommendations
    #[arg(short = 'm', long)]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Ground-truth file: JSON {query, relevant_urls} rows, or a query,url CSV
    #[arg(required = true)]
    ground_truth: PathBuf,

    /// Recommendation endpoint
    #[arg(long, default_value = evaluate::DEFAULT_API_URL)]
    api_url: String,

    /// Cutoff for Recall@k
    #[arg(short, long, default_value = "10")]
    k: usize,

    /// Pause between queries in milliseconds
    #[arg(long, default_value = "1000")]
    delay_ms: u64,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber(&TelemetryOptions::from_env(cli.log_dir))?;

    match cli.command {
        Some(Commands::Links(args)) => links_command(args).await?,
        Some(Commands::Crawl(args)) => crawl_command(args).await?,
        Some(Commands::Index(args)) => index_command(args).await?,
        Some(Commands::Search(args)) => search_command(args).await?,
        Some(Commands::Serve(args)) => serve_command(args).await?,
        Some(Commands::Evaluate(args)) => evaluate_command(args).await?,
        None => {
            // If no command is provided, show help
            let _ = Cli::parse_from(["assessment-rag", "--help"]);
        }
    }

    Ok(())
}

fn progress_bar(len: u64) -> anyhow::Result<ProgressBar> {
    let progress_bar = ProgressBar::new(len);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")?
            .progress_chars("##-"),
    );
    Ok(progress_bar)
}

fn path_str(path: &std::path::Path) -> anyhow::Result<&str> {
    path.to_str()
        .with_context(|| format!("path {} is not valid UTF-8", path.display()))
}

#[instrument]
async fn links_command(args: LinksArgs) -> anyhow::Result<()> {
    let config = CrawlerConfig::builder().page_size(args.page_size).build();

    println!("Enumerating catalog from {}...", config.catalog_url);
    let items = crawler::run_link_enumeration(&config, &args.output).await?;

    println!("Found {} products", items.len());
    println!("Saved links to {}", args.output.display());
    Ok(())
}

#[instrument]
async fn crawl_command(args: CrawlArgs) -> anyhow::Result<()> {
    let config = CrawlerConfig::builder()
        .max_attempts(args.max_attempts)
        .checkpoint_interval(args.checkpoint_interval)
        .build();
    let paths = CrawlPaths {
        links: args.links,
        checkpoint: args.checkpoint,
        output: args.output,
    };

    println!("Crawling products from {}...", paths.links.display());

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner} {pos} products {msg}")?,
    );
    let report = crawler::run_product_crawl(&config, &paths, |index, item, outcome| {
        bar.set_position(index as u64 + 1);
        match outcome {
            ItemOutcome::Succeeded { .. } => bar.set_message(item.url.clone()),
            ItemOutcome::Failed { attempts } => {
                bar.println(format!("Failed {} after {} attempts", item.url, attempts))
            }
        }
    })
    .await?;
    bar.finish_with_message("Crawl completed");

    let summary = report.summary;
    println!(
        "Crawled {} products: {} extracted, {} failed",
        summary.total, summary.succeeded, summary.failed
    );
    println!("Saved products to {}", paths.output.display());
    Ok(())
}

#[instrument]
async fn index_command(args: IndexArgs) -> anyhow::Result<()> {
    let client = GeminiClient::new_gemini_from_env(None)?;
    let config = IndexerConfig::builder().batch_size(args.batch_size).build();

    let entries = crawler::storage::load_entries(&args.input)
        .await
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    println!("Loaded {} products from {}", entries.len(), args.input.display());

    let db = Database::new_from_path(path_str(&args.database)?, config.embedding_dimensions).await?;

    let bar = progress_bar(entries.len() as u64)?;
    bar.set_message("Embedding products...");
    let summary = indexer::index_products(&client, &db, entries, &config, |done, total| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    })
    .await?;
    bar.finish_with_message("Indexing completed");

    println!(
        "Indexed {} products ({} without details, {} duplicates skipped) into {}",
        summary.indexed,
        summary.placeholders,
        summary.duplicates,
        args.database.display()
    );
    Ok(())
}

#[instrument]
async fn search_command(args: SearchArgs) -> anyhow::Result<()> {
    let db = Database::open_existing(path_str(&args.database)?)
        .await
        .with_context(|| format!("no index at {}, run `index` first", args.database.display()))?;
    let client = GeminiClient::new_gemini_from_env(args.model.as_deref())?;

    println!("Searching for: {}", args.query);

    // If vector search only, output results directly
    if args.vector_search_only {
        let hits = search::search_products(&db, &client, &args.query, &SearchOptions::with_limit(args.limit))
            .await?;

        match args.format.as_str() {
            "json" => {
                let json = serde_json::json!({
                    "query": args.query,
                    "results": hits.iter().map(|hit| {
                        serde_json::json!({
                            "rank": hit.rank,
                            "distance": hit.distance,
                            "product": hit.product.record,
                        })
                    }).collect::<Vec<_>>()
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            _ => {
                println!("Found {} results", hits.len());
                for hit in &hits {
                    let record = &hit.product.record;
                    println!("{}. {} ({:.4})", hit.rank, record.name, hit.distance);
                    println!("   URL: {}", record.url);
                    println!("   Test types: {}", record.test_type.join(", "));
                    println!();
                }
            }
        }
        return Ok(());
    }

    println!("Generating recommendations...");
    let options = RecommenderOptions {
        top_k: args.limit,
        ..RecommenderOptions::default()
    };
    let recommender = Recommender::new(db, client, options);
    let response = recommender.recommend(&args.query).await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&response)?),
        _ => {
            for (i, r) in response.recommended_assessments.iter().enumerate() {
                let duration = r
                    .duration
                    .map(|minutes| format!("{} min", minutes))
                    .unwrap_or_else(|| "unknown".to_string());
                println!("{}. {}", i + 1, r.name);
                println!("   URL: {}", r.url);
                println!(
                    "   Duration: {} | Remote: {} | Adaptive: {}",
                    duration,
                    crawler::yes_no_str(r.remote_support),
                    crawler::yes_no_str(r.adaptive_support)
                );
                println!("   Test types: {}", r.test_type.join(", "));
                println!();
            }
        }
    }

    Ok(())
}

#[instrument]
async fn serve_command(args: ServeArgs) -> anyhow::Result<()> {
    let addr: SocketAddr = args
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", args.bind))?;

    let state = match load_recommender(&args).await {
        Ok(recommender) => AppState::new(recommender),
        Err(e) => {
            warn!("Could not load recommender: {:#}", e);
            AppState::without_index()
        }
    };

    server::serve(addr, state).await?;
    Ok(())
}

async fn load_recommender(
    args: &ServeArgs,
) -> anyhow::Result<Recommender<GeminiCompletionModel, GeminiEmbeddingModel>> {
    let db = Database::open_existing(path_str(&args.database)?)
        .await
        .with_context(|| format!("no index at {}", args.database.display()))?;
    let client = GeminiClient::new_gemini_from_env(args.model.as_deref())
        .with_context(|| format!("{} is required for recommendations", GEMINI_API_KEY_ENV))?;
    Ok(Recommender::new(db, client, RecommenderOptions::default()))
}

#[instrument]
async fn evaluate_command(args: EvaluateArgs) -> anyhow::Result<()> {
    let ground_truth = evaluate::load_ground_truth(&args.ground_truth).await?;
    println!("Found {} test queries", ground_truth.len());

    let config = EvalConfig {
        api_url: args.api_url,
        k: args.k,
        delay: std::time::Duration::from_millis(args.delay_ms),
        ..EvalConfig::default()
    };
    let report = evaluate::evaluate_api(&ground_truth, &config).await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            for (i, score) in report.queries.iter().enumerate() {
                println!("{}/{} Query: {}", i + 1, report.queries.len(), score.query);
                match &score.error {
                    Some(error) => println!("   {}", error),
                    None => println!(
                        "   {} predictions, Recall@{}: {:.2}",
                        score.predicted.len(),
                        report.k,
                        score.recall
                    ),
                }
            }
            println!("MEAN RECALL@{}: {:.4}", report.k, report.mean_recall);
        }
    }

    Ok(())
}
