use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A fully extracted news article, ready to be persisted.
///
/// `(symbol, url)` is unique within a shard and within the canonical store;
/// duplicate inserts are silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub symbol: String,
    pub headline: String,
    /// Calendar day the article was published, normalized to UTC.
    pub date: NaiveDate,
    /// Plain text, paragraphs joined by a blank-line separator.
    pub content: String,
    pub url: String,
    /// Short source code, e.g. "marketwatch".
    pub source: String,
}

/// Company metadata scraped from a profile page. First write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub symbol: String,
    pub name: String,
    pub industry: String,
    pub sector: String,
    pub description: String,
}

/// A `(date, url)` pair discovered on a listing page, not yet fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub date: NaiveDate,
    pub url: String,
}

/// Extracted headline and body of a single article page.
#[derive(Debug, Clone)]
pub struct Story {
    pub headline: String,
    pub body: String,
}

/// Outcome of one symbol x source crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub symbol: String,
    pub source: String,
    /// New (non-duplicate) articles discovered this run.
    pub found: usize,
    /// Batches committed to the shard.
    pub committed_batches: usize,
    /// True when the symbol was skipped because metadata could not be fetched.
    pub skipped: bool,
}
