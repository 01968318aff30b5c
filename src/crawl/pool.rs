//! Bounded pool of crawl workers.
//!
//! The controller owns the shutdown future (ctrl-c in production); workers
//! never see the signal directly. They poll a watch flag between candidates,
//! and on shutdown the pool stops dispatching, flips the flag, and
//! force-aborts whatever is still in flight. Committed batches stay durable;
//! in-memory batches are lost by design.

use std::future::Future;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::crawl::CrawlDriver;
use crate::models::CrawlSummary;
use crate::sources;

#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub symbol: String,
    pub source: String,
}

#[derive(Debug, Default)]
pub struct PoolReport {
    pub completed: Vec<CrawlSummary>,
    pub failed: usize,
    pub cancelled: bool,
}

enum WorkerOutcome {
    Done(CrawlSummary),
    Failed,
    Skipped,
}

/// The symbol x source cross product from the configuration.
pub fn jobs_for(config: &Config) -> Vec<CrawlJob> {
    let mut jobs = Vec::with_capacity(config.symbols.len() * config.sources.len());
    for source in &config.sources {
        for symbol in &config.symbols {
            jobs.push(CrawlJob {
                symbol: symbol.clone(),
                source: source.clone(),
            });
        }
    }
    jobs
}

/// Run every job to completion or until `shutdown` resolves. Job order is
/// randomized so no single remote source takes correlated load.
pub async fn run_pool(
    config: Arc<Config>,
    mut jobs: Vec<CrawlJob>,
    shutdown: impl Future<Output = ()>,
) -> PoolReport {
    jobs.shuffle(&mut rand::rng());

    let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut workers = JoinSet::new();

    for job in jobs {
        let config = Arc::clone(&config);
        let semaphore = Arc::clone(&semaphore);
        let stop = stop_rx.clone();
        workers.spawn(async move {
            // a closed semaphore means shutdown arrived before dispatch
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return WorkerOutcome::Skipped,
            };
            if *stop.borrow() {
                return WorkerOutcome::Skipped;
            }

            let adapter = match sources::build_adapter(&job.source, &config) {
                Some(adapter) => adapter,
                None => {
                    warn!(source = %job.source, "unknown source, skipping job");
                    return WorkerOutcome::Skipped;
                }
            };

            match CrawlDriver::new(&job.symbol, adapter, &config).run(stop).await {
                Ok(summary) => WorkerOutcome::Done(summary),
                Err(e) => {
                    warn!(symbol = %job.symbol, source = %job.source, error = %e, "crawl worker failed");
                    WorkerOutcome::Failed
                }
            }
        });
    }

    let mut report = PoolReport::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                None => break,
                Some(Ok(WorkerOutcome::Done(summary))) => report.completed.push(summary),
                Some(Ok(WorkerOutcome::Failed)) => report.failed += 1,
                Some(Ok(WorkerOutcome::Skipped)) => {}
                Some(Err(e)) => {
                    if !e.is_cancelled() {
                        warn!(error = %e, "crawl worker panicked");
                        report.failed += 1;
                    }
                }
            },
            _ = &mut shutdown, if !report.cancelled => {
                warn!("interrupt received, halting workers");
                report.cancelled = true;
                semaphore.close();
                let _ = stop_tx.send(true);
                workers.abort_all();
            }
        }
    }

    info!(
        completed = report.completed.len(),
        failed = report.failed,
        cancelled = report.cancelled,
        "crawl pool finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(symbol: &str, source: &str) -> CrawlJob {
        CrawlJob {
            symbol: symbol.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn jobs_cover_the_symbol_source_cross_product() {
        let config = Config {
            symbols: vec!["AAPL".to_string(), "AMD".to_string()],
            sources: vec!["marketwatch".to_string(), "reuters".to_string()],
            ..Config::default()
        };
        let jobs = jobs_for(&config);
        assert_eq!(jobs.len(), 4);
        assert!(jobs
            .iter()
            .any(|j| j.symbol == "AMD" && j.source == "reuters"));
    }

    #[tokio::test]
    async fn unknown_sources_are_skipped_not_failed() {
        let config = Arc::new(Config::default());
        let jobs = vec![job("AAPL", "nosuch"), job("AMD", "nosuch")];
        let report = run_pool(config, jobs, std::future::pending()).await;
        assert!(report.completed.is_empty());
        assert_eq!(report.failed, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn immediate_shutdown_halts_without_hanging() {
        let config = Arc::new(Config::default());
        let jobs = vec![job("AAPL", "nosuch"); 8];
        let report = run_pool(config, jobs, std::future::ready(())).await;
        assert!(report.cancelled);
        assert!(report.completed.is_empty());
    }
}
