mod error;
mod math;
mod notion;
mod parser;
mod question;
mod server;
mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use math::LatexRenderer;
use notion::NotionClient;
use parser::sections::Classifier;
use settings::Settings;

#[derive(Parser)]
#[command(name = "soal", about = "Build multiple-choice questions from Notion pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the question database and print every matching question as JSON
    Query {
        /// Database id (default: SOAL_DATABASE_ID)
        #[arg(short, long)]
        database: Option<String>,
        /// JSON file holding a Notion filter object
        #[arg(short, long)]
        filter: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Build the question for a single page (id or URL)
    Page {
        id: String,
        #[arg(long)]
        pretty: bool,
    },
    /// Classify a saved block-children response without touching the network
    Render {
        file: PathBuf,
        /// Id to stamp on the question
        #[arg(long, default_value = "local")]
        id: String,
        #[arg(long)]
        pretty: bool,
    },
    /// Serve POST /api/query over HTTP
    Serve {
        /// Bind address (default: SOAL_BIND_ADDR or 0.0.0.0:3000)
        #[arg(short, long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON output; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load settings")?;
    let renderer = LatexRenderer;

    let result = match cli.command {
        Commands::Query {
            database,
            filter,
            pretty,
        } => {
            let database_id = database
                .or_else(|| settings.database_id.clone())
                .context("No database id: pass --database or set SOAL_DATABASE_ID")?;
            let database_id = notion::normalize_id(&database_id)?;
            let filter = filter.as_deref().map(read_filter).transpose()?;

            let client = NotionClient::from_settings(&settings)?;
            let pages = client.query_database(&database_id, filter.as_ref()).await?;
            eprintln!("Processing {} pages...", pages.len());

            let pb = progress_bar(pages.len() as u64)?;
            let classifier = Classifier::new(&renderer, settings.unlabeled_answer);
            let batch = parser::process_pages(
                &client,
                &pages,
                &classifier,
                settings.on_page_error,
                &pb,
            )
            .await;
            pb.finish_and_clear();

            let batch = batch?;
            if !batch.failures.is_empty() {
                eprintln!("{} pages failed.", batch.failures.len());
            }
            print_json(&batch.into_output(settings.on_page_error), pretty)
        }
        Commands::Page { id, pretty } => {
            let page_id = notion::normalize_id(&id)?;
            let client = NotionClient::from_settings(&settings)?;
            let classifier = Classifier::new(&renderer, settings.unlabeled_answer);
            let question = parser::process_page(&client, &page_id, &classifier)
                .await
                .with_context(|| format!("Failed to process page {page_id}"))?;
            print_json(&question, pretty)
        }
        Commands::Render { file, id, pretty } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let blocks = parser::blocks::parse_block_list(&json)
                .with_context(|| format!("{} is not a block listing", file.display()))?;
            let classifier = Classifier::new(&renderer, settings.unlabeled_answer);
            print_json(&classifier.classify(&id, &blocks), pretty)
        }
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.bind_addr.clone());
            let state = server::AppState {
                client: NotionClient::from_settings(&settings)?,
                settings,
                renderer,
            };
            server::start_server(&addr, Arc::new(state)).await?;
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("Done in {}", format_duration(elapsed));
    }

    result
}

fn read_filter(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read filter {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid filter JSON in {}", path.display()))
}

fn progress_bar(len: u64) -> anyhow::Result<indicatif::ProgressBar> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
