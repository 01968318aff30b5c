//! Seeking Alpha adapter.
//!
//! Requires a warmed-up browser-like session (user agent + cookies) and
//! rate-limits aggressively: an access-denied page is reported as
//! `Listing::Denied` so the driver can sleep and count it toward the
//! termination ceiling per the throttle policy. Headlines matching the
//! earnings-notification denylist reject the whole article; bodies are
//! bullet paragraphs, of which at least two must survive filtering.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Candidate, Company, Story};
use crate::text::{clean_html_text, BoilerplateFilter};

use super::{fetch_company_meta, Listing, PagingPolicy, SourceAdapter, BROWSER_UA, PARAGRAPH_SEP};

pub const SOURCE: &str = "seekingalpha";

const ACCESS_DENIED: &str = "Access to this page has been denied";

static HEADLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"itemprop="headline">([^<]+)<"#).unwrap());
static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<p class="bullets_li">(.+?)</p>"#).unwrap());
// listing markup arrives escaped inside a JSON payload
static LISTING_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<div class=\\"symbol_article\\" time=\\"(\d+)\\"><a href=\\"([^"]+?)\\" sasource=\\"\w+?\\">([^<]+?)</a></div>"#,
    )
    .unwrap()
});

pub struct SeekingAlpha {
    client: Client,
    headline_filter: BoilerplateFilter,
    body_filter: BoilerplateFilter,
    denied_sleep: Duration,
}

impl SeekingAlpha {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(BROWSER_UA)
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            headline_filter: BoilerplateFilter::headline(
                &config.filters.salpha_headline_denylist,
            ),
            body_filter: BoilerplateFilter::new(
                config.filters.salpha_min_len,
                &config.filters.salpha_body_denylist,
            ),
            denied_sleep: Duration::from_secs(config.throttle.sleep_secs),
        }
    }
}

#[async_trait]
impl SourceAdapter for SeekingAlpha {
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
        // prime the session cookies; a failure here is not fatal, the
        // listing requests will surface it as denied pages
        let url = format!("https://seekingalpha.com/symbol/{}", symbol);
        if let Err(e) = self.client.get(&url).send().await {
            tracing::debug!(symbol, error = %e, "seekingalpha warm-up failed");
        }
        Ok(true)
    }

    async fn list_page(&mut self, symbol: &str, page_date: DateTime<Utc>) -> Result<Listing> {
        let url = format!(
            "https://seekingalpha.com/symbol/{}/news/more_latest_news?page={}&new_layout=true",
            symbol,
            page_date.timestamp()
        );
        let body = self.client.get(&url).send().await?.text().await?;

        if body.contains(ACCESS_DENIED) {
            return Ok(Listing::Denied);
        }

        let candidates: Vec<Candidate> = LISTING_ITEM
            .captures_iter(&body)
            .filter_map(|c| {
                let ts: i64 = c[1].parse().ok()?;
                let date = DateTime::<Utc>::from_timestamp(ts, 0)?.date_naive();
                Some(Candidate {
                    date,
                    url: format!("https://seekingalpha.com{}", &c[2]),
                })
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

        if html.contains(ACCESS_DENIED) {
            tokio::time::sleep(self.denied_sleep).await;
            return Ok(None);
        }

        let headline = match HEADLINE.captures(&html).and_then(|c| c.get(1)) {
            Some(m) => clean_html_text(m.as_str()),
            None => return Ok(None),
        };

        if self.headline_filter.is_boilerplate(&headline) {
            return Ok(None);
        }

        let bullets: Vec<String> = BULLET
            .captures_iter(&html)
            .map(|c| clean_html_text(&c[1]))
            .filter(|b| !self.body_filter.is_boilerplate(b))
            .collect();

        if bullets.len() < 2 {
            return Ok(None);
        }

        Ok(Some(Story {
            headline,
            body: bullets.join(PARAGRAPH_SEP),
        }))
    }

    async fn fetch_meta(&self, symbol: &str) -> Result<Option<Company>> {
        fetch_company_meta(&self.client, symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_regex_matches_escaped_markup() {
        let body = r#"{"html":"<div class=\"symbol_article\" time=\"1583366400\"><a href=\"/news/123-apple\" sasource=\"qp_latest\">Apple expands</a></div>"}"#;
        let caps = LISTING_ITEM.captures(body).unwrap();
        assert_eq!(&caps[1], "1583366400");
        assert_eq!(&caps[2], "/news/123-apple");
        assert_eq!(&caps[3], "Apple expands");
    }
}
