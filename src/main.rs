use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

mod cli;
mod config;
mod crawl;
mod db;
mod error;
mod models;
mod sources;
mod text;

use cli::{Cli, Command};
use config::Config;
use db::{MergeEngine, ShardStore};
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Crawl => run_crawl(config).await?,
        Command::Merge { delete } => run_merge(&config, delete).await?,
        Command::Stats => print_stats(&config).await?,
    }

    Ok(())
}

async fn print_stats(config: &Config) -> Result<()> {
    let store = ShardStore::open(Path::new(&config.data_dir), &config.db_name, None).await?;
    println!("Articles: {}", store.article_count().await?);
    println!("Companies: {}", store.company_count().await?);
    store.close().await?;
    Ok(())
}

async fn run_merge(config: &Config, delete: bool) -> Result<()> {
    let engine = MergeEngine::new(Path::new(&config.data_dir), &config.db_name);
    let canonical = engine.merge(None, delete).await?;
    println!("Articles: {}", canonical.article_count().await?);
    println!("Companies: {}", canonical.company_count().await?);
    canonical.close().await?;
    Ok(())
}

async fn run_crawl(config: Config) -> Result<()> {
    print_stats(&config).await?;

    let jobs = crawl::jobs_for(&config);
    info!(jobs = jobs.len(), workers = config.max_workers, "starting crawl");

    let config = Arc::new(config);
    let report = crawl::run_pool(Arc::clone(&config), jobs, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    for summary in &report.completed {
        if !summary.skipped {
            info!(
                symbol = %summary.symbol,
                source = %summary.source,
                found = summary.found,
                batches = summary.committed_batches,
                "crawl finished"
            );
        }
    }

    if report.cancelled {
        println!("Interrupted!");
        return Ok(());
    }

    println!("Merging...");
    run_merge(config.as_ref(), false).await?;
    Ok(())
}
