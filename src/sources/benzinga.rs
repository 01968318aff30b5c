//! Benzinga adapter.
//!
//! Listing goes through the content API, keyed by a topic id (`tids`)
//! resolved once per symbol from the stock page; a symbol without a topic id
//! has no history at all. Articles have no stable body markers, so
//! extraction is generic HTML-to-text with line-level boilerplate filtering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Candidate, Company, Story};
use crate::text::{clean_html_text, BoilerplateFilter};

use super::{default_client, fetch_company_meta, Listing, PagingPolicy, SourceAdapter};

pub const SOURCE: &str = "benzinga";

/// Generic extraction keeps nothing shorter than this.
const MIN_BODY_LEN: usize = 30;

static TOPIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#""tids":"(\d+)""#).unwrap());
static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<title>([^<]+)</title>").unwrap());

pub struct Benzinga {
    client: Client,
    filter: BoilerplateFilter,
    topic_id: Option<String>,
}

impl Benzinga {
    pub fn new(config: &Config) -> Self {
        Self {
            client: default_client(),
            filter: BoilerplateFilter::new(config.filters.min_len, &config.filters.denylist),
            topic_id: None,
        }
    }
}

#[async_trait]
impl SourceAdapter for Benzinga {
    fn id(&self) -> &'static str {
        SOURCE
    }

    fn paging(&self) -> PagingPolicy {
        PagingPolicy {
            step_days: 3,
            advance_on_empty: true,
        }
    }

    async fn warm_up(&mut self, symbol: &str) -> Result<bool> {
        let url = format!("https://www.benzinga.com/stock/{}/", symbol.to_lowercase());
        let html = self.client.get(&url).send().await?.text().await?;
        self.topic_id = TOPIC_ID
            .captures(&html)
            .map(|c| c[1].to_string());
        Ok(self.topic_id.is_some())
    }

    async fn list_page(&mut self, _symbol: &str, page_date: DateTime<Utc>) -> Result<Listing> {
        let tid = match &self.topic_id {
            Some(tid) => tid,
            None => return Ok(Listing::End),
        };

        let url = format!(
            "https://www.benzinga.com/services/webapps/content?lastnid={}&parameters[tids]={}\
             &parameters[type]=story,scoutfin_realtimebriefs,press_releases",
            page_date.timestamp() / 100,
            tid
        );
        let items: Vec<serde_json::Value> = self.client.get(&url).send().await?.json().await?;

        let candidates: Vec<Candidate> = items
            .iter()
            .filter_map(|item| {
                let url = item.get("url").and_then(|v| v.as_str())?.to_string();
                let created = item.get("created").and_then(|v| v.as_str())?;
                let date = DateTime::parse_from_rfc2822(created).ok()?.date_naive();
                Some(Candidate { date, url })
            })
            .collect();

        if candidates.is_empty() {
            Ok(Listing::Empty)
        } else {
            Ok(Listing::Items(candidates))
        }
    }

    async fn fetch_article(&mut self, url: &str) -> Result<Option<Story>> {
        let html = self.client.get(url).send().await?.text().await?;

        let headline = match TITLE.captures(&html).and_then(|c| c.get(1)) {
            Some(m) => clean_html_text(m.as_str()),
            None => return Ok(None),
        };

        let text = match html2text::from_read(html.as_bytes(), 80) {
            Ok(text) => text,
            Err(_) => return Ok(None),
        };

        let body: String = text
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !self.filter.is_boilerplate(line))
            .collect::<Vec<_>>()
            .join("\n");

        if body.len() <= MIN_BODY_LEN {
            return Ok(None);
        }

        Ok(Some(Story { headline, body }))
    }

    async fn fetch_meta(&self, symbol: &str) -> Result<Option<Company>> {
        fetch_company_meta(&self.client, symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_id_regex_matches_stock_page_payload() {
        let html = r#"{"settings":{"tids":"20156","other":1}}"#;
        assert_eq!(&TOPIC_ID.captures(html).unwrap()[1], "20156");
    }
}
