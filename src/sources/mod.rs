//! Source adapters: per-site pagination and article extraction.
//!
//! Every source follows the same shape: page backward through time over a
//! listing endpoint emitting `(date, url)` candidates, fetch and clean
//! individual articles, and scrape company metadata. The exact markup rules
//! live in one module per source; the shared pagination state machine and
//! the metadata scrape live here.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Candidate, Company, Story};

pub mod benzinga;
pub mod marketwatch;
pub mod reuters;
pub mod seekingalpha;

/// Separator between surviving paragraphs of an article body.
pub const PARAGRAPH_SEP: &str = "\n\n\n";

/// Browser user-agent for sources that reject the default reqwest one.
pub const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.132 Safari/537.36";

/// One listing page's worth of results.
#[derive(Debug, Clone)]
pub enum Listing {
    /// At least one candidate was found on the page.
    Items(Vec<Candidate>),
    /// The page was valid but empty (weekend, gap, or out of history).
    Empty,
    /// The source refused the request (rate limiting).
    Denied,
    /// The source has no listing at all for this symbol; stop immediately.
    End,
}

/// How a source steps its pagination cursor.
#[derive(Debug, Clone, Copy)]
pub struct PagingPolicy {
    /// Days covered by one listing page.
    pub step_days: i64,
    /// Whether an empty page still moves the cursor backward. Sources whose
    /// listing endpoint is keyed by an exact timestamp retry the same
    /// position instead.
    pub advance_on_empty: bool,
}

/// Backward-paging cursor: current position plus the consecutive-empty-page
/// counter that bounds total work against sparse or delisted symbols.
#[derive(Debug, Clone)]
pub struct Cursor {
    pub date: DateTime<Utc>,
    pub empty_streak: u32,
}

impl Cursor {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            date: start,
            empty_streak: 0,
        }
    }

    /// True once the empty-page ceiling is reached; the sequence then
    /// terminates normally (clean end of available history, not an error).
    pub fn exhausted(&self, ceiling: u32) -> bool {
        self.empty_streak >= ceiling
    }

    /// Fold one page outcome into the cursor. A non-empty page resets the
    /// streak; an empty page increments it; a denied page holds the date and
    /// counts toward the ceiling only if `denied_counts` says so.
    pub fn observe(&mut self, listing: &Listing, policy: &PagingPolicy, denied_counts: bool) {
        match listing {
            Listing::Items(_) => {
                self.empty_streak = 0;
                self.date -= Duration::days(policy.step_days);
            }
            Listing::Empty => {
                self.empty_streak += 1;
                if policy.advance_on_empty {
                    self.date -= Duration::days(policy.step_days);
                }
            }
            Listing::Denied => {
                if denied_counts {
                    self.empty_streak += 1;
                }
            }
            Listing::End => {}
        }
    }
}

/// Behavior every news source implements. One instance serves one
/// symbol x source job, so implementations may keep per-symbol state set up
/// in `warm_up` (sessions, topic ids) behind `&mut self`.
#[async_trait]
pub trait SourceAdapter: Send {
    /// Short source code persisted with each article.
    fn id(&self) -> &'static str;

    fn paging(&self) -> PagingPolicy;

    /// Per-symbol setup. Returns `false` when the source has nothing at all
    /// for this symbol and paging should not even start.
    async fn warm_up(&mut self, _symbol: &str) -> Result<bool> {
        Ok(true)
    }

    /// Fetch the listing page covering `page_date` for `symbol`.
    async fn list_page(&mut self, symbol: &str, page_date: DateTime<Utc>) -> Result<Listing>;

    /// Fetch and extract one article. `None` means the candidate is dropped:
    /// no headline, no body region, or too little surviving text.
    async fn fetch_article(&mut self, url: &str) -> Result<Option<Story>>;

    /// Company metadata; `None` signals an invalid or delisted symbol and
    /// aborts the whole crawl for it.
    async fn fetch_meta(&self, symbol: &str) -> Result<Option<Company>>;
}

/// Select an adapter implementation by source code.
pub fn build_adapter(source: &str, config: &Config) -> Option<Box<dyn SourceAdapter>> {
    match source {
        marketwatch::SOURCE => Some(Box::new(marketwatch::MarketWatch::new(config))),
        reuters::SOURCE => Some(Box::new(reuters::Reuters::new(config))),
        seekingalpha::SOURCE => Some(Box::new(seekingalpha::SeekingAlpha::new(config))),
        benzinga::SOURCE => Some(Box::new(benzinga::Benzinga::new(config))),
        _ => None,
    }
}

static META_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<p class="companyname">([^<]+?)</p>"#).unwrap());
static META_DESC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<div class="full">\s+<p>([^<]+?)</p>"#).unwrap());
static META_INDUSTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<p class="column">Industry</p>\s+<p class="data lastcolumn">([^<]+?)</p>"#)
        .unwrap()
});
static META_SECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<p class="column">Sector</p>\s+<p class="data lastcolumn">([^<]+?)</p>"#)
        .unwrap()
});

/// Scrape company metadata from the MarketWatch profile page. All sources
/// share this: it is the one profile page the pipeline trusts. Any missing
/// field means the symbol is treated as invalid.
pub(crate) async fn fetch_company_meta(client: &Client, symbol: &str) -> Result<Option<Company>> {
    let url = format!(
        "https://www.marketwatch.com/investing/stock/{}/profile",
        symbol
    );
    let html = client.get(&url).send().await?.text().await?;

    let field = |re: &Regex| {
        re.captures(&html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    let (name, description, industry, sector) = match (
        field(&META_NAME),
        field(&META_DESC),
        field(&META_INDUSTRY),
        field(&META_SECTOR),
    ) {
        (Some(n), Some(d), Some(i), Some(s)) => (n, d, i, s),
        _ => return Ok(None),
    };

    Ok(Some(Company {
        symbol: symbol.to_uppercase(),
        name,
        industry,
        sector,
        description,
    }))
}

/// Slice the article-body region between two source-specific markers. The
/// end marker is optional; the region runs to the end of the page without it.
pub(crate) fn slice_between<'a>(html: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let start_idx = html.find(start)?;
    let rest = &html[start_idx..];
    match rest.find(end) {
        Some(end_idx) => Some(&rest[..end_idx]),
        None => Some(rest),
    }
}

/// Default HTTP client for sources that accept the stock user agent.
pub(crate) fn default_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy(step_days: i64, advance_on_empty: bool) -> PagingPolicy {
        PagingPolicy {
            step_days,
            advance_on_empty,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 10, 12, 0, 0).unwrap()
    }

    fn item() -> Listing {
        Listing::Items(vec![Candidate {
            date: start().date_naive(),
            url: "http://x/1".to_string(),
        }])
    }

    #[test]
    fn empty_streak_resets_on_nonempty_page() {
        let mut cursor = Cursor::new(start());
        let p = policy(1, true);
        for _ in 0..364 {
            cursor.observe(&Listing::Empty, &p, true);
        }
        assert_eq!(cursor.empty_streak, 364);
        assert!(!cursor.exhausted(365));

        cursor.observe(&item(), &p, true);
        assert_eq!(cursor.empty_streak, 0);
    }

    #[test]
    fn ceiling_terminates_sequence() {
        let mut cursor = Cursor::new(start());
        let p = policy(1, true);
        for _ in 0..365 {
            assert!(!cursor.exhausted(365));
            cursor.observe(&Listing::Empty, &p, true);
        }
        assert!(cursor.exhausted(365));
    }

    #[test]
    fn empty_pages_advance_only_when_policy_says_so() {
        let p = policy(2, false);
        let mut cursor = Cursor::new(start());
        cursor.observe(&Listing::Empty, &p, true);
        assert_eq!(cursor.date, start());

        cursor.observe(&item(), &p, true);
        assert_eq!(cursor.date, start() - Duration::days(2));
    }

    #[test]
    fn denied_pages_hold_the_date() {
        let p = policy(3, true);
        let mut cursor = Cursor::new(start());

        cursor.observe(&Listing::Denied, &p, true);
        assert_eq!(cursor.date, start());
        assert_eq!(cursor.empty_streak, 1);

        cursor.observe(&Listing::Denied, &p, false);
        assert_eq!(cursor.empty_streak, 1);
    }

    #[test]
    fn slice_between_handles_missing_end_marker() {
        let html = "aaa START middle END zzz";
        assert_eq!(slice_between(html, "START", "END"), Some("START middle "));
        assert_eq!(slice_between(html, "START", "NOPE"), Some("START middle END zzz"));
        assert_eq!(slice_between(html, "NOPE", "END"), None);
    }
}
