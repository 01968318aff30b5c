//! Reuters adapter.
//!
//! The wire API pages by a nanosecond `until` cursor, roughly two days per
//! page, and only moves backward once a page actually yields items. Item
//! dates come from the nanosecond wire item ids.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Candidate, Company, Story};
use crate::text::{clean_html_text, BoilerplateFilter};

use super::{
    default_client, fetch_company_meta, slice_between, Listing, PagingPolicy, SourceAdapter,
    PARAGRAPH_SEP,
};

pub const SOURCE: &str = "reuters";

static HEADLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ArticleHeader_headline">([^<]+)</h1>"#).unwrap());
static PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>([^<]+)</p>").unwrap());

pub struct Reuters {
    client: Client,
    filter: BoilerplateFilter,
}

impl Reuters {
    pub fn new(config: &Config) -> Self {
        Self {
            client: default_client(),
            filter: BoilerplateFilter::new(config.filters.min_len, &config.filters.denylist),
        }
    }
}

#[async_trait]
impl SourceAdapter for Reuters {
    fn id(&self) -> &'static str {
        SOURCE
    }

    fn paging(&self) -> PagingPolicy {
        PagingPolicy {
            step_days: 2,
            advance_on_empty: false,
        }
    }

    async fn list_page(&mut self, symbol: &str, page_date: DateTime<Utc>) -> Result<Listing> {
        let until = page_date.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let url = format!(
            "https://wireapi.reuters.com/v8/feed/rcom/us/marketnews/ric:{}.OQ?until={}",
            symbol, until
        );
        let feed: serde_json::Value = self.client.get(&url).send().await?.json().await?;

        let items = match feed.get("wireitems").and_then(|v| v.as_array()) {
            Some(items) if !items.is_empty() => items,
            _ => return Ok(Listing::Empty),
        };

        let mut candidates = Vec::new();
        for item in items {
            let action_url = item
                .get("templates")
                .and_then(|v| v.as_array())
                .and_then(|templates| {
                    templates.iter().find_map(|t| {
                        t.get("template_action")
                            .and_then(|a| a.get("url"))
                            .and_then(|u| u.as_str())
                    })
                });
            let url = match action_url {
                Some(url) => url.to_string(),
                None => continue,
            };

            let nanos = item
                .get("wireitem_id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(0);
            let date = DateTime::<Utc>::from_timestamp(nanos / 1_000_000_000, 0)
                .unwrap_or(page_date)
                .date_naive();

            candidates.push(Candidate { date, url });
        }

        // a page that yielded wire items counts as non-empty even when none
        // of them carry a usable article action
        Ok(Listing::Items(candidates))
    }

    async fn fetch_article(&mut self, url: &str) -> Result<Option<Story>> {
        let html = self.client.get(url).send().await?.text().await?;

        let headline = match HEADLINE.captures(&html).and_then(|c| c.get(1)) {
            Some(m) => clean_html_text(m.as_str()),
            None => return Ok(None),
        };

        let region = match slice_between(&html, "StandardArticleBody_body", "Attribution_container")
        {
            Some(region) => region,
            None => return Ok(None),
        };

        let paragraphs: Vec<String> = PARAGRAPH
            .captures_iter(region)
            .map(|c| clean_html_text(&c[1]))
            .filter(|p| !self.filter.is_boilerplate(p))
            .collect();

        if paragraphs.is_empty() {
            return Ok(None);
        }

        Ok(Some(Story {
            headline,
            body: paragraphs.join(PARAGRAPH_SEP),
        }))
    }

    async fn fetch_meta(&self, symbol: &str) -> Result<Option<Company>> {
        fetch_company_meta(&self.client, symbol).await
    }
}
