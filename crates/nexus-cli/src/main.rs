use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use nexus_core::knowledge::ontology::schema;
use nexus_core::{Config, KnowledgeGraph, KnowledgeStore};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "nexus")]
#[command(about = "Code knowledge graph: structure, clusters, execution flows and hybrid search", long_about = None)]
struct Cli {
    /// Repository root holding the `.nexus` data directory
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a repository into the knowledge graph
    Analyze {
        /// Repository to index (defaults to --repo)
        path: Option<PathBuf>,

        /// Skip embedding generation; search falls back to keywords only
        #[arg(long)]
        skip_embeddings: bool,
    },
    /// Hybrid keyword and semantic search
    Search {
        #[arg(required = true)]
        query: Vec<String>,

        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show a functional cluster and its members
    Cluster {
        /// Cluster label or id
        name: String,
    },
    /// Show an execution flow step by step
    Process {
        /// Process label or id
        name: String,
    },
    /// Largest clusters and longest processes
    Overview {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Print node and relation types
    Schema,
    /// Run a raw SurrealQL statement
    Query {
        #[arg(required = true)]
        statement: Vec<String>,
    },
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_env("NEXUS_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

fn print_yaml<T: serde::Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

async fn open_graph(repo: &Path, config: Config) -> Result<KnowledgeGraph> {
    let db_path = config.storage.db_path(repo);
    KnowledgeGraph::open(&db_path, config)
        .await
        .wrap_err_with(|| format!("cannot open graph at {}", db_path.display()))
}

/// Open without loading the embedding model.
async fn open_for_reading(repo: &Path, mut config: Config) -> Result<KnowledgeGraph> {
    config.ingest.skip_embeddings = true;
    open_graph(repo, config).await
}

async fn analyze(repo: &Path, path: Option<PathBuf>, skip_embeddings: bool, mut config: Config) -> Result<()> {
    let root = path.unwrap_or_else(|| repo.to_path_buf());
    config.ingest.skip_embeddings |= skip_embeddings;

    let progress = spinner("Loading knowledge graph...");
    let graph = open_graph(&root, config).await?;

    progress.set_message(format!("Analyzing {}...", root.display()));
    let result = graph.ingest_directory(&root).await;
    progress.finish_and_clear();
    let summary = result?;

    println!("Indexed {} files", summary.file_count);
    println!("  Nodes:       {}", summary.node_count);
    println!("  Edges:       {}", summary.edge_count);
    println!("  Clusters:    {}", summary.community_count);
    println!("  Processes:   {}", summary.process_count);
    println!("  Embedded:    {}", summary.embedded_symbols);
    let r = summary.resolution;
    println!(
        "  Dropped:     {} imports, {} calls, {} heritage references",
        r.unresolved_imports, r.unresolved_calls, r.unresolved_heritage
    );
    if !summary.skipped_files.is_empty() {
        println!("  Skipped {} files:", summary.skipped_files.len());
        for skipped in &summary.skipped_files {
            println!("    {} ({})", skipped.path, skipped.reason);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    setup_logging();

    let cli = Cli::parse();
    let config = Config::load().wrap_err("invalid configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Analyze { path, skip_embeddings } => {
            analyze(&cli.repo, path, skip_embeddings, config).await?;
        }
        Commands::Search { query, limit } => {
            let limit = limit.unwrap_or(config.search.default_limit);
            let graph = open_graph(&cli.repo, config).await?;
            let hits = graph.search(&query.join(" "), limit).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for hit in hits {
                println!("{:>3}. {:<60} {:.4}", hit.rank, hit.file_path, hit.score);
            }
        }
        Commands::Cluster { name } => {
            let graph = open_for_reading(&cli.repo, config).await?;
            print_yaml(&graph.cluster_detail(&name).await?)?;
        }
        Commands::Process { name } => {
            let graph = open_for_reading(&cli.repo, config).await?;
            print_yaml(&graph.process_detail(&name).await?)?;
        }
        Commands::Overview { limit } => {
            let graph = open_for_reading(&cli.repo, config).await?;
            let stats = graph.stats().await?;
            if stats.files == 0 {
                return Err(eyre!("Knowledge graph is empty. Run 'nexus analyze' first."));
            }
            println!(
                "{} files, {} symbols, {} relations",
                stats.files, stats.symbols, stats.relations
            );

            println!("\nClusters ({}):", stats.communities);
            for c in graph.list_clusters(limit).await? {
                println!("  {:<14} {:<30} {:>4} symbols  cohesion {:.2}", c.id, c.label, c.symbol_count, c.cohesion);
            }
            println!("\nProcesses ({}):", stats.processes);
            for p in graph.list_processes(limit).await? {
                println!("  {:<14} {:<40} {:>3} steps  [{}]", p.id, p.label, p.step_count, p.process_type.as_str());
            }
        }
        Commands::Schema => {
            print_yaml(&schema::describe())?;
        }
        Commands::Query { statement } => {
            let graph = open_for_reading(&cli.repo, config).await?;
            let rows = graph.query(&statement.join(" ")).await?;
            print_yaml(&rows)?;
        }
    }

    Ok(())
}
