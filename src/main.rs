use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use wikicard::{CardService, ServiceConfig, TaskOutcome};

#[derive(Debug, Parser)]
#[command(
    name = "wikicard",
    version,
    about = "Social-card image renderer for wiki articles"
)]
struct Cli {
    /// Base URL of the wiki exposing api.php
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Directory holding the rendered bitmaps
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// URL template of the presentation document (%pageid%, %title%)
    #[arg(long, global = true)]
    view_template: Option<String>,
    /// Number of render workers
    #[arg(long, global = true)]
    workers: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render one card inline, write it through the cache
    Render {
        page_id: u64,
        title: String,
        /// Re-render even when a cached card exists
        #[arg(long)]
        force: bool,
        /// Also write the bitmap to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Queue one render and wait for its outcome
    Submit {
        page_id: u64,
        title: String,
        /// Re-render even when a cached card exists
        #[arg(long)]
        force: bool,
    },
    /// Queue a forced render for every member of a category
    Batch {
        /// Category to list; defaults to the finalized-articles category
        category: Option<String>,
        /// Only items touched today
        #[arg(long)]
        today: bool,
    },
    /// Print the resolved document data as JSON
    Document { title: String },
}

#[cfg(feature = "cdp")]
fn backend_factory(config: &ServiceConfig) -> Result<wikicard::BackendFactory> {
    Ok(wikicard::cdp::backend_factory(config))
}

#[cfg(not(feature = "cdp"))]
fn backend_factory(_config: &ServiceConfig) -> Result<wikicard::BackendFactory> {
    anyhow::bail!("wikicard was built without a renderer backend (enable the `cdp` feature)")
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = ServiceConfig::default();
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if let Some(cache_dir) = cli.cache_dir {
        config.cache_dir = cache_dir;
    }
    if let Some(view_template) = cli.view_template {
        config.view_template = view_template;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    let factory = backend_factory(&config)?;
    let service = CardService::new(config, factory)?;

    match cli.command {
        Commands::Render {
            page_id,
            title,
            force,
            out,
        } => {
            let card = service.get_rendered_image(page_id, &title, force).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &card.bytes)?;
                    println!(
                        "Wrote {} bytes ({}) to {}",
                        card.bytes.len(),
                        card.content_type,
                        path.display()
                    );
                }
                None => println!(
                    "{} bytes ({}) cached at {}",
                    card.bytes.len(),
                    card.content_type,
                    service.cache().entry_path(page_id).display()
                ),
            }
        }
        Commands::Submit {
            page_id,
            title,
            force,
        } => {
            let handle = service.submit_render(page_id, &title, force);
            println!("Queued render for page {}-{}", page_id, title);
            match handle.outcome().await? {
                TaskOutcome::Rendered => println!("Rendered"),
                TaskOutcome::Skipped => println!("Already cached, skipped"),
                TaskOutcome::Failed(message) => anyhow::bail!("Render failed: {}", message),
            }
        }
        Commands::Batch { category, today } => {
            let filter = today.then(|| time::OffsetDateTime::now_utc().date());
            let handles = service
                .submit_category_batch(category.as_deref(), filter)
                .await?;
            println!("Submitted {} render requests", handles.len());

            let mut failed = 0usize;
            for handle in handles {
                let page_id = handle.page_id;
                match handle.outcome().await {
                    Ok(TaskOutcome::Failed(message)) => {
                        eprintln!("page {}: {}", page_id, message);
                        failed += 1;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        eprintln!("page {}: {}", page_id, err);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} renders failed", failed);
            }
        }
        Commands::Document { title } => {
            let document = service.get_render_document(&title).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }

    Ok(())
}
