use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use policy_harvest::api::{self, AppState};
use policy_harvest::config::{Config, parse_keywords};
use policy_harvest::db::{Database, MongoSimilarityStore};
use policy_harvest::embedder::{Embedder, HashingEmbedder, OllamaEmbedder};
use policy_harvest::llm::OllamaClient;
use policy_harvest::output::OutputFormat;
use policy_harvest::pipeline::{PolicyScraper, is_url_file, read_url_file};
use policy_harvest::query_router::{OllamaAnswerGenerator, QueryRouter, RouteOutcome, RouterSettings};
use policy_harvest::url_filter::FilterMode;
use policy_harvest::vector_store::SimilarityStore;

#[derive(Parser)]
#[command(name = "policy-harvest", version, about = "Find, scrape and query company policy pages")]
struct Cli {
    /// Debug level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterKind {
    Llm,
    Keyword,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape a website, or every URL listed in a .txt file
    Scrape {
        target: String,
        #[arg(long, value_enum, default_value = "all")]
        format: OutputFormat,
        #[arg(long, value_enum, default_value = "llm")]
        filter: FilterKind,
        /// Comma separated, replaces the configured keyword list
        #[arg(long)]
        keywords: Option<String>,
        /// Relevance criterion for the llm filter
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        max_sitemap_size: Option<usize>,
        /// Store pages with embeddings in MongoDB
        #[arg(long)]
        save_db: bool,
    },
    /// Similarity search over stored pages
    Search {
        query: String,
        #[arg(long, default_value_t = 0.5)]
        threshold: f32,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Answer a question from stored pages, or say it needs an external search
    Ask {
        question: String,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        routing_threshold: Option<f32>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List stored scrape sessions
    Sessions,
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // also receives records from the `log` macros used by the library
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(true)
        .init();

    let config = Config::from_env();

    match cli.command {
        Command::Scrape {
            target,
            format,
            filter,
            keywords,
            prompt,
            max_sitemap_size,
            save_db,
        } => {
            let mut config = config;
            if let Some(keywords) = keywords {
                config.keywords = parse_keywords(&keywords);
            }
            if let Some(prompt) = prompt {
                config.search_prompt = prompt;
            }
            if let Some(max) = max_sitemap_size {
                config.max_sitemap_size = max;
            }
            scrape(&config, &target, format, filter, save_db).await
        }
        Command::Search {
            query,
            threshold,
            limit,
        } => search(&config, &query, threshold, limit).await,
        Command::Ask {
            question,
            threshold,
            routing_threshold,
            limit,
        } => {
            let mut settings = RouterSettings::from(&config);
            if let Some(t) = threshold {
                settings.retrieval_threshold = t;
            }
            if let Some(t) = routing_threshold {
                settings.routing_threshold = t;
            }
            if let Some(l) = limit {
                settings.limit = l.max(1);
            }
            ask(&config, &question, settings).await
        }
        Command::Sessions => sessions(&config).await,
        Command::Serve { addr } => serve(&config, addr).await,
    }
}

fn embedder(config: &Config) -> Arc<dyn Embedder> {
    if config.embedding_model == "hashing" {
        return Arc::new(HashingEmbedder::default());
    }
    Arc::new(OllamaEmbedder::new(
        OllamaClient::new(&config.ollama_base_url, config.classifier_timeout),
        config.embedding_model.clone(),
    ))
}

async fn open_store(config: &Config) -> Result<Arc<MongoSimilarityStore>> {
    let db = Database::from_config(config).await?;
    Ok(Arc::new(MongoSimilarityStore::new(&db, embedder(config))))
}

fn query_router(config: &Config, store: Arc<dyn SimilarityStore>, settings: RouterSettings) -> QueryRouter {
    let generator = OllamaAnswerGenerator::new(
        OllamaClient::new(&config.ollama_base_url, config.classifier_timeout),
        config.ollama_model.clone(),
    );
    QueryRouter::new(store, Arc::new(generator), settings)
}

async fn scrape(
    config: &Config,
    target: &str,
    format: OutputFormat,
    filter: FilterKind,
    save_db: bool,
) -> Result<()> {
    let mode = match filter {
        FilterKind::Llm => FilterMode::llm(config.search_prompt.clone()),
        FilterKind::Keyword => FilterMode::keywords(&config.keywords),
    };

    let mut scraper = PolicyScraper::from_config(config, mode, format);
    if save_db {
        scraper = scraper.with_store(open_store(config).await?);
    }

    let started = std::time::Instant::now();
    let reports = if is_url_file(target) {
        let urls = read_url_file(Path::new(target))
            .with_context(|| format!("Failed to read url file {target}"))?;
        scraper.scrape_many(&urls).await
    } else {
        vec![scraper.scrape(target).await?]
    };

    for report in &reports {
        let s = &report.session;
        println!("\n{}", "=".repeat(80));
        println!("{} ({}, run {})", s.website_url, report.source, s.run_id);
        println!("{}", "=".repeat(80));
        match s.urls_discovered {
            Some(n) => println!("URLs Discovered: {n}"),
            None => println!("URLs Discovered: N/A"),
        }
        println!("Relevant URLs: {}", s.relevant_urls);
        if report.fallback_batches > 0 {
            println!("Keyword fallback batches: {}", report.fallback_batches);
        }
        println!("Pages Scraped: {}", s.pages_scraped);
        println!("Total Words: {}", policy_harvest::output::thousands(s.total_words));
        for (page_type, count) in &s.page_types {
            println!("  - {page_type}: {count}");
        }
        for path in report.files.values() {
            println!("  wrote {}", path.display());
        }
        if let Some(stored) = report.stored {
            println!("Stored {stored} pages in the database");
        }
        println!("Time: {:.2} seconds", s.total_time_seconds);
    }
    println!("\nTotal time: {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(())
}

async fn search(config: &Config, query: &str, threshold: f32, limit: usize) -> Result<()> {
    let store = open_store(config).await?;
    let results = store.search(query, threshold, limit).await?;

    if results.is_empty() {
        println!("No results found above similarity threshold {threshold}");
        return Ok(());
    }
    println!("Found {} results for '{query}':\n", results.len());
    for (i, r) in results.iter().enumerate() {
        println!("{}. {} [{}]", i + 1, r.title, r.page_type);
        println!("   {}", r.url);
        println!("   similarity: {:.2}%", r.similarity * 100.0);
    }
    Ok(())
}

async fn ask(config: &Config, question: &str, settings: RouterSettings) -> Result<()> {
    let store = open_store(config).await?;
    let router = query_router(config, store, settings);

    match router.route(question).await? {
        RouteOutcome::EmptyCorpus => {
            println!("No documents in the knowledge base. Scrape some sites first.");
        }
        RouteOutcome::DeferToSearch {
            highest,
            routing_threshold,
            candidates,
        } => {
            println!(
                "Best match {:.2}% is below the routing threshold {:.2}%.",
                highest * 100.0,
                routing_threshold * 100.0
            );
            println!("This question needs an external search. Closest documents:");
            for c in candidates.iter().take(3) {
                println!("  - {} ({:.2}%)", c.url, c.similarity * 100.0);
            }
        }
        RouteOutcome::ThresholdMismatch {
            highest,
            routing_threshold,
            retrieval_threshold,
            ..
        } => {
            bail!(
                "best match {highest:.4} passed routing threshold {routing_threshold} but no document reached retrieval threshold {retrieval_threshold}; lower --threshold"
            );
        }
        RouteOutcome::Answered {
            highest,
            answer,
            sources,
        } => {
            println!("{answer}\n");
            println!("Sources (best match {:.2}%):", highest * 100.0);
            for (i, s) in sources.iter().enumerate() {
                println!("  {}. {} - {} ({:.2}%)", i + 1, s.title, s.url, s.similarity * 100.0);
            }
        }
    }
    Ok(())
}

async fn sessions(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let sessions = store.sessions().list_recent().await?;
    if sessions.is_empty() {
        println!("No scrape sessions stored");
        return Ok(());
    }
    for s in sessions {
        println!(
            "{}  {}  {} pages, {} words  ({})",
            s.run_id,
            s.website_url,
            s.pages_scraped,
            s.total_words,
            s.scraped_at
        );
    }
    Ok(())
}

async fn serve(config: &Config, addr: SocketAddr) -> Result<()> {
    let store = open_store(config).await?;
    let router = query_router(config, store.clone(), RouterSettings::from(config));
    let state = Arc::new(AppState {
        store,
        router: Arc::new(router),
        search_threshold: config.retrieval_threshold,
        search_limit: 10,
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log::info!("listening on {}", addr);
    axum::serve(listener, api::create_router(state))
        .await
        .context("Server error")?;
    Ok(())
}
