//! Drives one symbol x source crawl end to end: fetch metadata, page the
//! source backward through time, dedup against the shard, and batch-commit.
//!
//! Failure semantics: a failed metadata fetch skips the whole symbol; a
//! failed article fetch skips just that candidate; reaching the empty-page
//! ceiling is a clean end of history, not an error.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{Config, ThrottleConfig};
use crate::db::ShardStore;
use crate::error::Result;
use crate::models::{Article, CrawlSummary};
use crate::sources::{Cursor, Listing, SourceAdapter};

pub struct CrawlDriver {
    symbol: String,
    adapter: Box<dyn SourceAdapter>,
    data_dir: PathBuf,
    db_name: String,
    discovery_limit: usize,
    batch_size: usize,
    empty_page_ceiling: u32,
    throttle: ThrottleConfig,
}

impl CrawlDriver {
    pub fn new(symbol: &str, adapter: Box<dyn SourceAdapter>, config: &Config) -> Self {
        Self {
            symbol: symbol.to_string(),
            adapter,
            data_dir: PathBuf::from(&config.data_dir),
            db_name: config.db_name.clone(),
            discovery_limit: config.discovery_limit,
            batch_size: config.batch_size,
            empty_page_ceiling: config.empty_page_ceiling,
            throttle: config.throttle.clone(),
        }
    }

    /// Run the crawl to completion, discovery limit, end of history, or
    /// cancellation. The worker owns the shard connection exclusively for
    /// the duration.
    pub async fn run(mut self, stop: watch::Receiver<bool>) -> Result<CrawlSummary> {
        let source = self.adapter.id().to_string();
        let mut summary = CrawlSummary {
            symbol: self.symbol.clone(),
            source: source.clone(),
            ..Default::default()
        };

        let store = ShardStore::open(&self.data_dir, &self.db_name, Some(&self.symbol)).await?;

        let company = match self.adapter.fetch_meta(&self.symbol).await {
            Ok(Some(company)) => company,
            Ok(None) => {
                info!(symbol = %self.symbol, "no data for symbol, skipping");
                summary.skipped = true;
                store.close().await?;
                return Ok(summary);
            }
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "metadata fetch failed, skipping symbol");
                summary.skipped = true;
                store.close().await?;
                return Ok(summary);
            }
        };
        store.insert_company(company).await?;
        info!(symbol = %self.symbol, source = %source, "scraping");

        match self.adapter.warm_up(&self.symbol).await {
            Ok(true) => {}
            Ok(false) => {
                info!(symbol = %self.symbol, source = %source, "source has no history for symbol");
                store.close().await?;
                return Ok(summary);
            }
            Err(e) => {
                warn!(symbol = %self.symbol, source = %source, error = %e, "warm-up failed");
                store.close().await?;
                return Ok(summary);
            }
        }

        let policy = self.adapter.paging();
        let mut cursor = Cursor::new(Utc::now());
        let mut batch: Vec<Article> = Vec::new();
        // guards against the same url reappearing on overlapping pages
        // before its batch is committed
        let mut seen: HashSet<String> = HashSet::new();
        let mut found = 0usize;
        let mut cancelled = false;

        'crawl: while !cursor.exhausted(self.empty_page_ceiling) {
            if *stop.borrow() {
                cancelled = true;
                break;
            }

            let listing = match self.adapter.list_page(&self.symbol, cursor.date).await {
                Ok(listing) => listing,
                Err(e) => {
                    debug!(symbol = %self.symbol, source = %source, error = %e, "listing fetch failed");
                    Listing::Empty
                }
            };

            if matches!(listing, Listing::End) {
                break;
            }
            if matches!(listing, Listing::Denied) {
                debug!(symbol = %self.symbol, source = %source, "listing denied, backing off");
                tokio::time::sleep(Duration::from_secs(self.throttle.sleep_secs)).await;
            }

            let items = match &listing {
                Listing::Items(items) => items.clone(),
                _ => Vec::new(),
            };
            cursor.observe(&listing, &policy, self.throttle.denied_counts_toward_ceiling);

            for candidate in items {
                if *stop.borrow() {
                    cancelled = true;
                    break 'crawl;
                }

                let duplicate = seen.contains(&candidate.url)
                    || store.article_exists(&self.symbol, &candidate.url).await?;
                if !duplicate {
                    match self.adapter.fetch_article(&candidate.url).await {
                        Ok(Some(story)) => {
                            debug!(symbol = %self.symbol, url = %candidate.url, "found article");
                            batch.push(Article {
                                symbol: self.symbol.clone(),
                                headline: story.headline,
                                date: candidate.date,
                                content: story.body,
                                url: candidate.url.clone(),
                                source: source.clone(),
                            });
                            seen.insert(candidate.url);
                            found += 1;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            debug!(url = %candidate.url, error = %e, "article fetch failed, skipping");
                        }
                    }
                }

                if batch.len() >= self.batch_size || found > self.discovery_limit {
                    store.insert_articles(std::mem::take(&mut batch)).await?;
                    summary.committed_batches += 1;
                    if found > self.discovery_limit {
                        info!(symbol = %self.symbol, source = %source, found, "discovery limit reached");
                        break 'crawl;
                    }
                }
            }
        }

        // a clean end flushes the tail batch; cancellation drops it (small
        // and re-crawlable on the next run)
        if !cancelled && !batch.is_empty() {
            store.insert_articles(std::mem::take(&mut batch)).await?;
            summary.committed_batches += 1;
        }

        summary.found = found;
        store.close().await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, Company, Story};
    use crate::sources::PagingPolicy;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};
    use std::collections::VecDeque;

    struct MockSource {
        pages: VecDeque<Listing>,
        meta: Option<Company>,
    }

    fn meta() -> Company {
        Company {
            symbol: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            industry: "Computers".to_string(),
            sector: "Technology".to_string(),
            description: "Makes phones.".to_string(),
        }
    }

    fn candidates(urls: &[&str]) -> Listing {
        Listing::Items(
            urls.iter()
                .map(|u| Candidate {
                    date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
                    url: u.to_string(),
                })
                .collect(),
        )
    }

    #[async_trait]
    impl SourceAdapter for MockSource {
        fn id(&self) -> &'static str {
            "mock"
        }

        fn paging(&self) -> PagingPolicy {
            PagingPolicy {
                step_days: 1,
                advance_on_empty: true,
            }
        }

        async fn list_page(
            &mut self,
            _symbol: &str,
            _page_date: DateTime<Utc>,
        ) -> Result<Listing> {
            Ok(self.pages.pop_front().unwrap_or(Listing::Empty))
        }

        async fn fetch_article(&mut self, url: &str) -> Result<Option<Story>> {
            Ok(Some(Story {
                headline: format!("About {}", url),
                body: "Plenty of perfectly substantive article body text.".to_string(),
            }))
        }

        async fn fetch_meta(&self, _symbol: &str) -> Result<Option<Company>> {
            Ok(self.meta.clone())
        }
    }

    fn test_config(dir: &std::path::Path, limit: usize, batch_size: usize) -> Config {
        Config {
            data_dir: dir.to_string_lossy().to_string(),
            discovery_limit: limit,
            batch_size,
            // keep the end-of-history spin short in tests
            empty_page_ceiling: 3,
            ..Config::default()
        }
    }

    fn stop_flag(stopped: bool) -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(stopped)
    }

    #[tokio::test]
    async fn absent_metadata_skips_symbol_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Box::new(MockSource {
            pages: VecDeque::from([candidates(&["http://x/1"])]),
            meta: None,
        });
        let config = test_config(dir.path(), 100, 50);
        let (_tx, stop) = stop_flag(false);

        let summary = CrawlDriver::new("ZZZZ", adapter, &config)
            .run(stop)
            .await
            .unwrap();
        assert!(summary.skipped);
        assert_eq!(summary.found, 0);

        let store = ShardStore::open(dir.path(), "db.sqlite", Some("ZZZZ"))
            .await
            .unwrap();
        assert_eq!(store.article_count().await.unwrap(), 0);
        assert_eq!(store.company_count().await.unwrap(), 0);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn discovery_limit_bounds_batches_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let urls: Vec<String> = (0..20).map(|i| format!("http://x/{}", i)).collect();
        let url_refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();
        let adapter = Box::new(MockSource {
            pages: VecDeque::from([candidates(&url_refs)]),
            meta: Some(meta()),
        });
        // limit 5, batch 3: stops after the 6th find, in exactly 2 batches
        let config = test_config(dir.path(), 5, 3);
        let (_tx, stop) = stop_flag(false);

        let summary = CrawlDriver::new("AAPL", adapter, &config)
            .run(stop)
            .await
            .unwrap();
        assert_eq!(summary.found, 6);
        assert_eq!(summary.committed_batches, 2);

        let store = ShardStore::open(dir.path(), "db.sqlite", Some("AAPL"))
            .await
            .unwrap();
        assert_eq!(store.article_count().await.unwrap(), 6);
        assert_eq!(store.company_count().await.unwrap(), 1);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicates_in_shard_and_in_run_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), 100, 50);

        // u1 is already persisted from an earlier run
        let store = ShardStore::open(dir.path(), "db.sqlite", Some("AAPL"))
            .await
            .unwrap();
        store
            .insert_articles(vec![Article {
                symbol: "AAPL".to_string(),
                headline: "Old".to_string(),
                date: NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
                content: "Old body.".to_string(),
                url: "http://x/u1".to_string(),
                source: "mock".to_string(),
            }])
            .await
            .unwrap();
        store.close().await.unwrap();

        // u2 reappears on an overlapping page before commit
        let adapter = Box::new(MockSource {
            pages: VecDeque::from([
                candidates(&["http://x/u1", "http://x/u2"]),
                candidates(&["http://x/u2", "http://x/u3"]),
            ]),
            meta: Some(meta()),
        });
        let (_tx, stop) = stop_flag(false);

        let summary = CrawlDriver::new("AAPL", adapter, &config)
            .run(stop)
            .await
            .unwrap();
        assert_eq!(summary.found, 2);

        let store = ShardStore::open(dir.path(), "db.sqlite", Some("AAPL"))
            .await
            .unwrap();
        assert_eq!(store.article_count().await.unwrap(), 3);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn pre_set_stop_flag_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Box::new(MockSource {
            pages: VecDeque::from([candidates(&["http://x/1"])]),
            meta: Some(meta()),
        });
        let config = test_config(dir.path(), 100, 50);
        let (_tx, stop) = stop_flag(true);

        let summary = CrawlDriver::new("AAPL", adapter, &config)
            .run(stop)
            .await
            .unwrap();
        assert_eq!(summary.found, 0);
        assert_eq!(summary.committed_batches, 0);
    }
}
